//! 按角色预置回复的确定性调用器，用于离线运行与测试

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::WorkflowError;
use crate::llm::RoleInvoker;
use crate::types::{RoleInstructions, RoleKind};

#[derive(Debug, Clone)]
enum ScriptedReply {
    Text(String),
    Failure(String),
}

/// 一次被记录下来的角色调用
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub role: RoleKind,
    pub system_prompt: String,
    pub context: String,
}

/// 按角色依次返回预置回复；队列中最后一条回复会被重复使用
#[derive(Debug, Default)]
pub struct ScriptedInvoker {
    replies: Mutex<HashMap<RoleKind, VecDeque<ScriptedReply>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一条文本回复
    pub fn reply(self, role: RoleKind, text: impl Into<String>) -> Self {
        self.push(role, ScriptedReply::Text(text.into()))
    }

    /// 追加一条 JSON 回复
    pub fn reply_json(self, role: RoleKind, value: Value) -> Self {
        self.push(role, ScriptedReply::Text(value.to_string()))
    }

    /// 追加一次后端失败
    pub fn fail(self, role: RoleKind, reason: impl Into<String>) -> Self {
        self.push(role, ScriptedReply::Failure(reason.into()))
    }

    /// 已发生的全部调用，按时间顺序
    pub fn calls(&self) -> Vec<RecordedCall> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self, role: RoleKind) -> usize {
        lock(&self.calls).iter().filter(|c| c.role == role).count()
    }

    fn push(self, role: RoleKind, reply: ScriptedReply) -> Self {
        lock(&self.replies).entry(role).or_default().push_back(reply);
        self
    }

    fn next_reply(&self, role: RoleKind) -> Option<ScriptedReply> {
        let mut replies = lock(&self.replies);
        let queue = replies.get_mut(&role)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl RoleInvoker for ScriptedInvoker {
    async fn invoke(
        &self,
        instructions: &RoleInstructions,
        context: &str,
    ) -> Result<String, WorkflowError> {
        lock(&self.calls).push(RecordedCall {
            role: instructions.role,
            system_prompt: instructions.system_prompt.clone(),
            context: context.to_string(),
        });

        match self.next_reply(instructions.role) {
            Some(ScriptedReply::Text(text)) => Ok(text),
            Some(ScriptedReply::Failure(reason)) => {
                Err(WorkflowError::backend(instructions.role, reason))
            }
            None => Err(WorkflowError::backend(
                instructions.role,
                "no scripted reply configured",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn instructions(role: RoleKind) -> RoleInstructions {
        RoleInstructions {
            role,
            system_prompt: format!("you are the {} role", role),
        }
    }

    #[tokio::test]
    async fn test_replies_are_consumed_in_order_and_last_one_sticks() {
        let invoker = ScriptedInvoker::new()
            .reply(RoleKind::Evaluation, "first")
            .reply_json(RoleKind::Evaluation, json!({"needs_more_data": false}));

        let eval = instructions(RoleKind::Evaluation);
        assert_eq!(invoker.invoke(&eval, "ctx").await.unwrap(), "first");
        let second = invoker.invoke(&eval, "ctx").await.unwrap();
        let third = invoker.invoke(&eval, "ctx").await.unwrap();
        assert_eq!(second, third);
        assert_eq!(invoker.call_count(RoleKind::Evaluation), 3);
        assert_eq!(invoker.call_count(RoleKind::Extraction), 0);
    }

    #[tokio::test]
    async fn test_failures_and_missing_scripts_are_backend_errors() {
        let invoker = ScriptedInvoker::new().fail(RoleKind::Recommendation, "rate limited");

        let err = invoker
            .invoke(&instructions(RoleKind::Recommendation), "ctx")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::ReasoningBackend { role: RoleKind::Recommendation, .. }
        ));

        let err = invoker
            .invoke(&instructions(RoleKind::Extraction), "ctx")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no scripted reply configured"));
        assert_eq!(invoker.calls().len(), 2);
        assert_eq!(invoker.calls()[1].context, "ctx");
    }
}
