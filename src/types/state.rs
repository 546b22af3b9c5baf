use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::WorkflowError;
use crate::types::chart::ChartSpec;
use crate::types::role::RoleKind;

/// 数据集键到结构化结果的映射
pub type DatasetMap = BTreeMap<String, Value>;

/// 运行中被吸收的问题类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    DataUnavailable,
    MalformedRoleOutput,
    IterationCapReached,
}

/// 一次运行中记录下来的非致命问题
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunIssue {
    /// 发生时所处的提取/评估轮次（从 1 开始）
    pub iteration: usize,
    pub role: Option<RoleKind>,
    pub kind: IssueKind,
    /// 相关的数据集键
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub detail: String,
}

impl RunIssue {
    pub fn data_unavailable(key: &str, detail: impl Into<String>) -> Self {
        Self {
            iteration: 0,
            role: Some(RoleKind::Extraction),
            kind: IssueKind::DataUnavailable,
            key: Some(key.to_string()),
            detail: detail.into(),
        }
    }

    pub fn malformed(role: RoleKind, detail: impl Into<String>) -> Self {
        Self {
            iteration: 0,
            role: Some(role),
            kind: IssueKind::MalformedRoleOutput,
            key: None,
            detail: detail.into(),
        }
    }

    pub fn cap_reached(iterations: usize, pending_requests: &[String]) -> Self {
        Self {
            iteration: iterations,
            role: None,
            kind: IssueKind::IterationCapReached,
            key: None,
            detail: format!(
                "iteration cap of {} reached with {} outstanding data request(s)",
                iterations,
                pending_requests.len()
            ),
        }
    }

    pub fn with_key(mut self, key: &str) -> Self {
        self.key = Some(key.to_string());
        self
    }

    fn stamped(mut self, iteration: usize) -> Self {
        if self.iteration == 0 {
            self.iteration = iteration;
        }
        self
    }
}

/// 单轮提取/评估的摘要
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationTrace {
    pub iteration: usize,
    /// 本轮成功合并的数据集键
    pub fetched_keys: Vec<String>,
    /// 本轮结束时 data 中的键总数
    pub total_keys: usize,
    pub needs_more_data: bool,
    pub data_requests: Vec<String>,
}

/// 提取角色返回的状态更新
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractionUpdate {
    pub fetched: Vec<(String, Value)>,
    pub issues: Vec<RunIssue>,
}

/// 评估角色返回的状态更新
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvaluationUpdate {
    pub analysis: String,
    pub needs_more_data: bool,
    pub data_requests: Vec<String>,
    pub issues: Vec<RunIssue>,
}

/// 建议角色返回的状态更新
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecommendationUpdate {
    pub recommendations: String,
    pub charts: Vec<ChartSpec>,
    pub issues: Vec<RunIssue>,
}

/// 贯穿整个工作流的分析状态。
///
/// 只有工作流控制器持有可变引用；各角色只读取状态并返回更新，
/// 由控制器通过 `apply_*` 方法写回。data 只提供合并接口，不提供删除接口。
#[derive(Debug, Clone)]
pub struct AnalysisState {
    query: String,
    data: DatasetMap,
    analysis: String,
    recommendations: String,
    charts: Vec<ChartSpec>,
    needs_more_data: bool,
    data_requests: Vec<String>,
    iteration_count: usize,
    trace: Vec<IterationTrace>,
    issues: Vec<RunIssue>,
    fetched_this_cycle: Vec<String>,
}

impl AnalysisState {
    /// 为一次查询创建初始状态
    pub fn new(query: &str) -> Result<Self, WorkflowError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(WorkflowError::InvalidQuery(
                "query must not be empty".to_string(),
            ));
        }

        Ok(Self {
            query: query.to_string(),
            data: DatasetMap::new(),
            analysis: String::new(),
            recommendations: String::new(),
            charts: Vec::new(),
            needs_more_data: false,
            data_requests: Vec::new(),
            iteration_count: 0,
            trace: Vec::new(),
            issues: Vec::new(),
            fetched_this_cycle: Vec::new(),
        })
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn data(&self) -> &DatasetMap {
        &self.data
    }

    pub fn analysis(&self) -> &str {
        &self.analysis
    }

    pub fn recommendations(&self) -> &str {
        &self.recommendations
    }

    pub fn charts(&self) -> &[ChartSpec] {
        &self.charts
    }

    pub fn needs_more_data(&self) -> bool {
        self.needs_more_data
    }

    pub fn data_requests(&self) -> &[String] {
        &self.data_requests
    }

    pub fn iteration_count(&self) -> usize {
        self.iteration_count
    }

    pub fn trace(&self) -> &[IterationTrace] {
        &self.trace
    }

    pub fn issues(&self) -> &[RunIssue] {
        &self.issues
    }

    /// 当前所处的轮次（从 1 开始）
    pub fn current_cycle(&self) -> usize {
        self.iteration_count + 1
    }

    /// 合并一个数据集，已存在的键会被覆盖
    pub fn merge_dataset(&mut self, key: impl Into<String>, value: Value) {
        self.data.insert(key.into(), value);
    }

    pub fn record_issue(&mut self, issue: RunIssue) {
        let cycle = self.current_cycle();
        self.issues.push(issue.stamped(cycle));
    }

    /// 进入提取阶段前复位充分性标记
    pub fn begin_extraction(&mut self) {
        self.needs_more_data = false;
        self.fetched_this_cycle.clear();
    }

    /// 写回提取结果，并清空已被消费的数据请求
    pub fn apply_extraction(&mut self, update: ExtractionUpdate) {
        for (key, value) in update.fetched {
            if !self.fetched_this_cycle.contains(&key) {
                self.fetched_this_cycle.push(key.clone());
            }
            self.merge_dataset(key, value);
        }
        for issue in update.issues {
            self.record_issue(issue);
        }
        self.data_requests.clear();
    }

    /// 写回评估结果，并完成本轮计数
    pub fn apply_evaluation(&mut self, update: EvaluationUpdate) {
        for issue in update.issues {
            self.record_issue(issue);
        }

        self.analysis = update.analysis;
        self.needs_more_data = update.needs_more_data;
        self.data_requests = if update.needs_more_data {
            update.data_requests
        } else {
            Vec::new()
        };
        self.iteration_count += 1;

        self.trace.push(IterationTrace {
            iteration: self.iteration_count,
            fetched_keys: std::mem::take(&mut self.fetched_this_cycle),
            total_keys: self.data.len(),
            needs_more_data: self.needs_more_data,
            data_requests: self.data_requests.clone(),
        });
    }

    /// 写回最终建议与图表
    pub fn apply_recommendation(&mut self, update: RecommendationUpdate) {
        for issue in update.issues {
            let issue = issue.stamped(self.iteration_count.max(1));
            self.issues.push(issue);
        }
        self.recommendations = update.recommendations;
        self.charts = update.charts;
    }

    /// 拆出终态字段，用于组装结果
    pub(crate) fn into_parts(self) -> StateParts {
        StateParts {
            query: self.query,
            data: self.data,
            analysis: self.analysis,
            recommendations: self.recommendations,
            charts: self.charts,
            iteration_count: self.iteration_count,
            trace: self.trace,
            issues: self.issues,
        }
    }
}

pub(crate) struct StateParts {
    pub query: String,
    pub data: DatasetMap,
    pub analysis: String,
    pub recommendations: String,
    pub charts: Vec<ChartSpec>,
    pub iteration_count: usize,
    pub trace: Vec<IterationTrace>,
    pub issues: Vec<RunIssue>,
}
