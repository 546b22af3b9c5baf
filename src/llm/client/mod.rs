//! LLM客户端 - 提供统一的LLM服务接口

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

use crate::{
    config::LLMConfig,
    error::WorkflowError,
    llm::RoleInvoker,
    llm::client::utils::{evaluate_befitting_model, preview},
    types::RoleInstructions,
};

mod providers;
pub mod utils;

use providers::ProviderClient;

/// LLM客户端 - 提供统一的LLM服务接口
#[derive(Clone)]
pub struct LLMClient {
    config: LLMConfig,
    client: ProviderClient,
}

impl LLMClient {
    /// 创建新的LLM客户端
    pub fn new(config: &LLMConfig) -> Result<Self> {
        let client = ProviderClient::new(config)?;
        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// 检查模型连接和功能是否正常
    pub async fn check_connection(&self) -> Result<()> {
        println!("🔄 正在检查模型连接...");
        match self
            .prompt("System: You are a helpful assistant.", "Hello")
            .await
        {
            Ok(_) => {
                println!("✅ 模型连接正常");
                Ok(())
            }
            Err(e) => {
                eprintln!("❌ 模型连接失败: {}", e);
                Err(e)
            }
        }
    }

    /// 通用重试逻辑，用于处理异步操作的重试机制
    async fn retry_with_backoff<T, F, Fut>(&self, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, anyhow::Error>>,
    {
        let max_retries = self.config.retry_attempts.max(1);
        let retry_delay_ms = self.config.retry_delay_ms;
        let mut retries = 0;

        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(err) => {
                    retries += 1;
                    tracing::warn!(
                        "❌ 调用模型服务出错，重试中 (第 {} / {}次尝试): {}",
                        retries,
                        max_retries,
                        err
                    );
                    if retries >= max_retries {
                        return Err(err);
                    }
                    tokio::time::sleep(Duration::from_millis(retry_delay_ms)).await;
                }
            }
        }
    }

    /// 单轮对话，按提示词大小选择模型，失败后切换到备选模型
    pub async fn prompt(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        let (befitting_model, fallover_model) =
            evaluate_befitting_model(&self.config, system_prompt, user_prompt);

        match self
            .prompt_with_model(system_prompt, user_prompt, &befitting_model)
            .await
        {
            Ok(text) => Ok(text),
            Err(e) => match fallover_model {
                Some(model) => {
                    tracing::warn!(
                        "❌ 调用模型服务出错，尝试 {} 次均失败，尝试使用备选模型{}...{}",
                        self.config.retry_attempts,
                        model,
                        e
                    );
                    let user_prompt_with_fixer = format!(
                        "{}\n\n**注意事项**此前我调用大模型过程时存在错误，错误信息为“{}”，你注意你这一次要规避这个错误",
                        user_prompt, e
                    );
                    self.prompt_with_model(system_prompt, &user_prompt_with_fixer, &model)
                        .await
                }
                None => Err(e),
            },
        }
    }

    async fn prompt_with_model(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        model: &str,
    ) -> Result<String> {
        let agent = self
            .client
            .create_agent(model, system_prompt, &self.config);
        let timeout = Duration::from_secs(self.config.timeout_seconds.max(1));

        self.retry_with_backoff(|| async {
            match tokio::time::timeout(timeout, agent.prompt(user_prompt)).await {
                Ok(result) => result,
                Err(_) => Err(anyhow!(
                    "模型 {} 在 {} 秒内未返回",
                    model,
                    timeout.as_secs()
                )),
            }
        })
        .await
    }
}

#[async_trait]
impl RoleInvoker for LLMClient {
    async fn invoke(
        &self,
        instructions: &RoleInstructions,
        context: &str,
    ) -> Result<String, WorkflowError> {
        tracing::debug!(
            "🤖 调用角色 [{}]，上下文预览: {}",
            instructions.role,
            preview(context, 200)
        );

        self.prompt(&instructions.system_prompt, context)
            .await
            .map_err(|e| WorkflowError::backend(instructions.role, e.to_string()))
    }
}
