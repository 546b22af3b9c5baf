use async_trait::async_trait;

use crate::{
    error::WorkflowError,
    llm::client::utils::preview,
    types::{AnalysisState, RoleInstructions, RoleKind},
    workflow::{context::WorkflowContext, formatter::DataFormatter},
};

/// Prompt模板配置
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    /// 系统提示词
    pub system_prompt: String,
    /// 输出格式约束
    pub output_instruction: String,
    /// 开头的说明性指令
    pub opening_instruction: String,
    /// 结尾的强调性指令
    pub closing_instruction: String,
}

/// 工作流角色。
///
/// 角色只读取状态，调用推理后端后把输出解释为一个更新，由控制器写回状态。
/// 解释阶段不会失败：不合法的输出被丢弃并记录为问题。
#[async_trait]
pub trait RoleAgent: Send + Sync {
    /// 角色返回的状态更新
    type Update: Send;

    fn role(&self) -> RoleKind;

    /// Prompt模板配置
    fn prompt_template(&self) -> PromptTemplate;

    /// 是否按目标语言撰写自由文本
    fn localized(&self) -> bool {
        false
    }

    /// 构建本角色的上下文材料
    fn build_context(&self, state: &AnalysisState, formatter: &DataFormatter) -> String;

    /// 解释推理后端的原始输出
    async fn interpret(
        &self,
        raw: &str,
        state: &AnalysisState,
        context: &WorkflowContext,
    ) -> Self::Update;

    /// 默认实现的execute方法：组装指令、调用后端、解释输出
    async fn execute(
        &self,
        state: &AnalysisState,
        context: &WorkflowContext,
    ) -> Result<Self::Update, WorkflowError> {
        let template = self.prompt_template();

        let mut system_prompt = format!(
            "{}\n\n{}",
            template.system_prompt, template.output_instruction
        );
        if self.localized() {
            let language_instruction = context.config.target_language.prompt_instruction();
            system_prompt = format!("{}\n\n{}", system_prompt, language_instruction);
        }
        let instructions = RoleInstructions {
            role: self.role(),
            system_prompt,
        };

        let formatter = DataFormatter::new(context.config.workflow.data_preview_rows);
        let user_prompt = format!(
            "{}\n\n{}{}",
            template.opening_instruction,
            self.build_context(state, &formatter),
            template.closing_instruction
        );

        tracing::info!("🤖 角色 [{}] 开始执行", self.role());
        let raw = context.invoker.invoke(&instructions, &user_prompt).await?;
        tracing::debug!("📝 角色 [{}] 原始输出: {}", self.role(), preview(&raw, 500));

        let update = self.interpret(&raw, state, context).await;
        tracing::info!("✅ 角色 [{}] 执行完成", self.role());
        Ok(update)
    }
}
