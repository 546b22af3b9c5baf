use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::chart::ChartSpec;
use crate::types::state::{AnalysisState, DatasetMap, IterationTrace, RunIssue};

/// 运行状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    Failed,
}

/// 工作流对外返回的结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisEnvelope {
    pub run_id: Uuid,
    pub query: String,
    pub status: RunStatus,
    /// 失败原因，仅在 failed 时出现
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub data: DatasetMap,
    pub analysis: String,
    pub recommendations: String,
    pub charts: Vec<ChartSpec>,
    pub iteration_count: usize,
    pub trace: Vec<IterationTrace>,
    pub issues: Vec<RunIssue>,
}

impl AnalysisEnvelope {
    pub fn completed(run_id: Uuid, state: AnalysisState) -> Self {
        let parts = state.into_parts();
        Self {
            run_id,
            query: parts.query,
            status: RunStatus::Completed,
            reason: None,
            data: parts.data,
            analysis: parts.analysis,
            recommendations: parts.recommendations,
            charts: parts.charts,
            iteration_count: parts.iteration_count,
            trace: parts.trace,
            issues: parts.issues,
        }
    }

    /// 失败结果不携带任何部分数据
    pub fn failed(run_id: Uuid, query: &str, reason: impl Into<String>) -> Self {
        Self {
            run_id,
            query: query.to_string(),
            status: RunStatus::Failed,
            reason: Some(reason.into()),
            data: DatasetMap::new(),
            analysis: String::new(),
            recommendations: String::new(),
            charts: Vec::new(),
            iteration_count: 0,
            trace: Vec::new(),
            issues: Vec::new(),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == RunStatus::Completed
    }
}
