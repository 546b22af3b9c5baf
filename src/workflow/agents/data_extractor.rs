use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::WorkflowError;
use crate::types::{AnalysisState, ExtractionUpdate, RoleKind, RunIssue};
use crate::warehouse::{DatasetCall, DatasetFunction, ParamKind};
use crate::workflow::context::WorkflowContext;
use crate::workflow::formatter::DataFormatter;
use crate::workflow::output_parser::{extract_json, schema_instruction};
use crate::workflow::role::{PromptTemplate, RoleAgent};

static DAYS_HINT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d{1,3})[\s-]*days?\b").expect("valid days regex"));
static MONTHS_HINT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d{1,2})[\s-]*months?\b").expect("valid months regex"));
static LIMIT_HINT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)top[\s-]*(\d{1,3})\b|(\d{1,3})\s+(?:products|customers)\b")
        .expect("valid limit regex")
});

/// 自由文本决策中用于识别数据集的关键词
const KEYWORDS: [(DatasetFunction, &[&str]); 7] = [
    (DatasetFunction::SalesMetrics, &["metrics", "kpi", "overview", "total revenue"]),
    (DatasetFunction::SalesTrend, &["trend", "daily", "time series", "over time", "line chart"]),
    (DatasetFunction::TopProducts, &["top product", "best-selling", "best selling", "products"]),
    (DatasetFunction::CustomerSegments, &["segment"]),
    (DatasetFunction::RevenueByCategory, &["category", "categories", "breakdown"]),
    (DatasetFunction::MonthlyComparison, &["monthly", "month over month", "month-over-month"]),
    (DatasetFunction::CustomerLifetimeValue, &["lifetime", "ltv", "top customer"]),
];

/// 提取角色的决策结构
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExtractionDecision {
    /// 需要执行的数据集函数调用，可以为空
    pub calls: Vec<FunctionCallDecision>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FunctionCallDecision {
    /// 目录中的函数名，例如 get_sales_trend
    pub function: String,
    /// 参数对象，例如 {"days": 30}；无参数函数省略
    #[serde(default)]
    pub params: Option<Value>,
}

/// 数据提取角色：决定调用哪些数据集函数，并把结果合并到 data
#[derive(Default)]
pub struct DataExtractor;

impl DataExtractor {
    /// 把角色输出与待处理的数据请求整理为调用计划。
    ///
    /// 数据请求中点名的数据集是字面目标，优先于角色自己的决策：请求带有数字提示
    /// （如 "last 12 months"）时角色给出的同名调用被忽略，否则角色只能改写参数。
    /// 角色决策内部同一个键只保留最后一次调用。
    pub fn plan(&self, raw: &str, state: &AnalysisState) -> (Vec<DatasetCall>, Vec<RunIssue>) {
        let mut calls = Vec::new();
        let mut issues = Vec::new();
        let mut pinned = Vec::new();

        for request in state.data_requests() {
            for function in DatasetFunction::resolve_mentions(request) {
                let hint = numeric_hint(function, request);
                if hint.is_some() && !pinned.contains(&function) {
                    pinned.push(function);
                }
                push_call(&mut calls, with_hint(function, hint));
            }
        }

        match extract_json(raw) {
            Some(value) => {
                let items = decision_items(&value);
                if items.is_none() {
                    issues.push(RunIssue::malformed(
                        RoleKind::Extraction,
                        "decision JSON contains no `calls` array",
                    ));
                }
                for item in items.unwrap_or_default() {
                    match parse_item(item) {
                        Ok(call) => push_decided(&mut calls, &pinned, call),
                        Err(reason) => {
                            tracing::warn!("⚠️ 忽略无效的数据集调用: {}", reason);
                            issues.push(RunIssue::malformed(RoleKind::Extraction, reason));
                        }
                    }
                }
            }
            None => {
                let fallback = keyword_calls(raw);
                if fallback.is_empty() && !raw.trim().is_empty() {
                    issues.push(RunIssue::malformed(
                        RoleKind::Extraction,
                        "no data function calls could be parsed from the decision",
                    ));
                }
                for call in fallback {
                    push_decided(&mut calls, &pinned, call);
                }
            }
        }

        (calls, issues)
    }
}

#[async_trait]
impl RoleAgent for DataExtractor {
    type Update = ExtractionUpdate;

    fn role(&self) -> RoleKind {
        RoleKind::Extraction
    }

    fn prompt_template(&self) -> PromptTemplate {
        PromptTemplate {
            system_prompt: r#"You are the data extraction specialist of an e-commerce analytics team.
Your only job is to choose which warehouse data functions to call so that the question can be answered.
Rules:
- Only use functions from the catalog; never invent function names or parameters.
- Choose the smallest set of calls that answers the request, with specific parameters.
- When visualizations are requested, fetch the data source suited to that chart (daily trend for line charts, category breakdown for pie or bar charts, monthly comparison for bar charts).
- When additional data is requested, treat each request as a concrete fetch target.
- Datasets that are already present only need to be fetched again when different parameters are required."#
                .to_string(),
            output_instruction: schema_instruction::<ExtractionDecision>(),
            opening_instruction: "Decide which data functions to call for the request below."
                .to_string(),
            closing_instruction:
                "Return the calls now. Return an empty `calls` array if nothing needs to be fetched."
                    .to_string(),
        }
    }

    fn build_context(&self, state: &AnalysisState, formatter: &DataFormatter) -> String {
        let mut content = format!("## Query\n{}\n\n", state.query());
        content.push_str(&formatter.format_requests(state.data_requests()));
        content.push_str(&formatter.format_catalog());
        content.push_str(&formatter.format_data_keys(state.data()));
        content
    }

    async fn interpret(
        &self,
        raw: &str,
        state: &AnalysisState,
        context: &WorkflowContext,
    ) -> ExtractionUpdate {
        let (calls, mut issues) = self.plan(raw, state);
        if calls.is_empty() {
            tracing::info!("📭 本轮没有需要获取的数据集");
        }

        let mut fetched = Vec::new();
        for call in calls {
            match context.provider.call(&call).await {
                Ok(value) => match call.function.validate_result(&value) {
                    Ok(()) => {
                        tracing::info!("📥 已获取数据集 {}", call);
                        fetched.push((call.key().to_string(), value));
                    }
                    Err(reason) => {
                        tracing::warn!("⚠️ 数据集 {} 结构不合法: {}", call, reason);
                        issues.push(RunIssue::data_unavailable(
                            call.key(),
                            format!("{} returned an unexpected shape: {}", call, reason),
                        ));
                    }
                },
                Err(err) => {
                    tracing::warn!("⚠️ 数据集 {} 获取失败: {}", call, err);
                    let reason = match err {
                        WorkflowError::DataUnavailable { reason, .. } => reason,
                        other => other.to_string(),
                    };
                    issues.push(RunIssue::data_unavailable(call.key(), reason));
                }
            }
        }

        ExtractionUpdate { fetched, issues }
    }
}

fn push_call(calls: &mut Vec<DatasetCall>, call: DatasetCall) {
    match calls.iter_mut().find(|c| c.function == call.function) {
        Some(existing) => *existing = call,
        None => calls.push(call),
    }
}

/// 角色决策中的调用；数据请求已指定参数的数据集不被覆盖
fn push_decided(calls: &mut Vec<DatasetCall>, pinned: &[DatasetFunction], call: DatasetCall) {
    if pinned.contains(&call.function) {
        tracing::debug!("数据请求已指定 {} 的参数，忽略角色决策 {}", call.key(), call);
    } else {
        push_call(calls, call);
    }
}

/// 接受 `{"calls": [...]}`、`{"functions": [...]}`、单个调用对象或调用数组
fn decision_items(value: &Value) -> Option<Vec<&Value>> {
    match value {
        Value::Array(items) => Some(items.iter().collect()),
        Value::Object(object) => {
            if let Some(items) = ["calls", "functions", "function_calls"]
                .iter()
                .find_map(|field| object.get(*field).and_then(Value::as_array))
            {
                return Some(items.iter().collect());
            }
            object.contains_key("function").then(|| vec![value])
        }
        _ => None,
    }
}

fn parse_item(item: &Value) -> Result<DatasetCall, String> {
    match item {
        Value::String(name) => DatasetCall::from_decision(name, None),
        Value::Object(object) => {
            let name = ["function", "name"]
                .iter()
                .find_map(|field| object.get(*field).and_then(Value::as_str))
                .ok_or_else(|| format!("call without a function name: {}", item))?;
            let params = ["params", "parameters", "args"]
                .iter()
                .find_map(|field| object.get(*field));
            DatasetCall::from_decision(name, params)
        }
        other => Err(format!("unsupported call entry: {}", other)),
    }
}

/// 按文本中的数字提示设置参数，例如 "last 90 days"、"top 5"
fn call_with_hint(function: DatasetFunction, text: &str) -> DatasetCall {
    with_hint(function, numeric_hint(function, text))
}

fn with_hint(function: DatasetFunction, hint: Option<u32>) -> DatasetCall {
    let call = DatasetCall::new(function);
    match hint {
        Some(value) => call.with_argument(value),
        None => call,
    }
}

fn numeric_hint(function: DatasetFunction, text: &str) -> Option<u32> {
    match function.parameter() {
        Some(ParamKind::Days) => first_number(&DAYS_HINT, text),
        Some(ParamKind::Months) => first_number(&MONTHS_HINT, text),
        Some(ParamKind::Limit) => first_number(&LIMIT_HINT, text),
        None => None,
    }
}

fn first_number(regex: &Regex, text: &str) -> Option<u32> {
    regex
        .captures(text)?
        .iter()
        .skip(1)
        .flatten()
        .find_map(|m| m.as_str().parse().ok())
}

/// 决策不是 JSON 时，按关键词识别数据集
fn keyword_calls(text: &str) -> Vec<DatasetCall> {
    let lowered = text.to_lowercase();
    KEYWORDS
        .iter()
        .filter(|(function, words)| {
            lowered.contains(function.key())
                || words.iter().any(|word| lowered.contains(word))
        })
        .map(|(function, _)| call_with_hint(*function, &lowered))
        .collect()
}
