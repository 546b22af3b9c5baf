//! 推理后端：角色调用接口及其实现

use async_trait::async_trait;

use crate::error::WorkflowError;
use crate::types::RoleInstructions;

pub mod client;
pub mod scripted;

pub use client::LLMClient;
pub use scripted::ScriptedInvoker;

/// 角色调用接口。给定角色指令与上下文，返回推理后端的原始文本决策。
///
/// 输出不可信，由各角色自行解析与校验；实现需支持多个运行并发调用。
#[async_trait]
pub trait RoleInvoker: Send + Sync {
    async fn invoke(
        &self,
        instructions: &RoleInstructions,
        context: &str,
    ) -> Result<String, WorkflowError>;
}
