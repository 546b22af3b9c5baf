//! 多角色分析工作流：提取 → 评估 →（数据不足时回到提取）→ 建议

use std::time::Duration;

use anyhow::{Result, anyhow};
use uuid::Uuid;

use crate::config::Config;
use crate::error::WorkflowError;
use crate::insights::quick_insights;
use crate::llm::LLMClient;
use crate::types::{AnalysisEnvelope, AnalysisState, RunIssue};
use crate::warehouse::build_provider;

pub mod agents;
pub mod chart_policy;
pub mod context;
pub mod formatter;
pub mod output_parser;
pub mod report;
pub mod role;

pub use context::WorkflowContext;

use agents::{Analyst, Consultant, DataExtractor};
use role::RoleAgent;

/// 工作流阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Extract,
    Evaluate,
    Recommend,
    Done,
}

/// 阶段转移。评估后只有在数据不足且未达到轮次上限时才回到提取。
pub fn transition(
    phase: Phase,
    needs_more_data: bool,
    iteration_count: usize,
    max_iterations: usize,
) -> Phase {
    match phase {
        Phase::Extract => Phase::Evaluate,
        Phase::Evaluate if needs_more_data && iteration_count < max_iterations => Phase::Extract,
        Phase::Evaluate => Phase::Recommend,
        Phase::Recommend | Phase::Done => Phase::Done,
    }
}

/// 工作流控制器，独占分析状态
pub struct Workflow {
    context: WorkflowContext,
    extractor: DataExtractor,
    analyst: Analyst,
    consultant: Consultant,
}

impl Workflow {
    pub fn new(context: WorkflowContext) -> Self {
        Self {
            context,
            extractor: DataExtractor,
            analyst: Analyst,
            consultant: Consultant,
        }
    }

    /// 执行状态机直到结束，推理后端失败时返回错误
    pub async fn execute(&self, query: &str) -> Result<AnalysisState, WorkflowError> {
        let mut state = AnalysisState::new(query)?;
        let max_iterations = self.context.config.workflow.effective_max_iterations();
        let mut phase = Phase::Extract;

        tracing::info!("🚀 开始分析: {}", state.query());

        while phase != Phase::Done {
            match phase {
                Phase::Extract => {
                    tracing::info!("📥 第 {} 轮：数据提取", state.current_cycle());
                    state.begin_extraction();
                    let update = self.extractor.execute(&state, &self.context).await?;
                    state.apply_extraction(update);
                }
                Phase::Evaluate => {
                    tracing::info!("🔍 第 {} 轮：数据评估", state.current_cycle());
                    let update = self.analyst.execute(&state, &self.context).await?;
                    state.apply_evaluation(update);

                    if state.needs_more_data() && state.iteration_count() >= max_iterations {
                        tracing::info!(
                            "⏹️ 已达到 {} 轮上限，仍有 {} 个数据请求未处理，进入建议阶段",
                            max_iterations,
                            state.data_requests().len()
                        );
                        let issue =
                            RunIssue::cap_reached(state.iteration_count(), state.data_requests());
                        state.record_issue(issue);
                    }
                }
                Phase::Recommend => {
                    tracing::info!("💡 生成建议与图表");
                    let update = self.consultant.execute(&state, &self.context).await?;
                    state.apply_recommendation(update);
                }
                Phase::Done => {}
            }

            phase = transition(
                phase,
                state.needs_more_data(),
                state.iteration_count(),
                max_iterations,
            );
        }

        tracing::info!(
            "✅ 分析完成，共 {} 轮，{} 个数据集，{} 个图表",
            state.iteration_count(),
            state.data().len(),
            state.charts().len()
        );
        Ok(state)
    }

    /// 在运行超时内执行一次分析，总是返回结果：完成或失败（不含部分数据）
    pub async fn run(&self, query: &str) -> AnalysisEnvelope {
        let run_id = Uuid::new_v4();
        let seconds = self.context.config.workflow.effective_run_timeout_seconds();

        let outcome =
            match tokio::time::timeout(Duration::from_secs(seconds), self.execute(query)).await {
                Ok(result) => result,
                Err(_) => Err(WorkflowError::Timeout { seconds }),
            };

        match outcome {
            Ok(state) => AnalysisEnvelope::completed(run_id, state),
            Err(err) => {
                tracing::error!("❌ 分析失败 [{}]: {}", run_id, err);
                AnalysisEnvelope::failed(run_id, query.trim(), err.to_string())
            }
        }
    }
}

/// 命令行的运行方式
#[derive(Debug, Clone, PartialEq)]
pub enum LaunchMode {
    /// 对一个问题执行完整工作流
    Analyze { query: String, json: bool },
    /// 只输出快速洞察
    QuickInsights { json: bool },
}

/// 启动分析
pub async fn launch(config: &Config, mode: LaunchMode) -> Result<()> {
    match mode {
        LaunchMode::QuickInsights { json } => {
            let provider = build_provider(&config.warehouse)?;
            let insights = quick_insights(provider.as_ref()).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&insights)?);
            } else {
                println!("{}", report::render_insights(&insights));
            }
            Ok(())
        }
        LaunchMode::Analyze { query, json } => {
            let llm_client = LLMClient::new(&config.llm)?;

            // 启动时检查模型连接
            llm_client.check_connection().await?;

            let provider = build_provider(&config.warehouse)?;
            let context = WorkflowContext::with_collaborators(
                config.clone(),
                std::sync::Arc::new(llm_client),
                provider,
            );

            println!(
                "🚀 正在分析: {} (输出语言: {})",
                query.trim(),
                config.target_language.display_name()
            );
            let envelope = Workflow::new(context).run(&query).await;

            if json {
                println!("{}", serde_json::to_string_pretty(&envelope)?);
            } else {
                println!("{}", report::render_envelope(&envelope));
            }

            if envelope.is_completed() {
                Ok(())
            } else {
                Err(anyhow!(
                    "分析失败: {}",
                    envelope.reason.unwrap_or_default()
                ))
            }
        }
    }
}

// Include tests
#[cfg(test)]
mod tests;
