use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{AnalysisState, ChartSpec, RecommendationUpdate, RoleKind, RunIssue};
use crate::workflow::chart_policy::{normalize_chart_value, suggest_charts, validate_chart};
use crate::workflow::context::WorkflowContext;
use crate::workflow::formatter::DataFormatter;
use crate::workflow::output_parser::{extract_json, schema_instruction, string_list};
use crate::workflow::role::{PromptTemplate, RoleAgent};

/// 无法得到建议时使用的文本
pub const FALLBACK_RECOMMENDATIONS: &str =
    "Unable to generate recommendations. Please review the analysis.";

/// 建议角色的输出结构
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RecommendationDecision {
    /// 3-5 条可执行的业务建议
    pub recommendations: Vec<String>,
    /// 图表配置，data_key 必须是已提供的数据集键
    #[serde(default)]
    pub charts: Vec<ChartSpec>,
}

/// 建议角色：输出业务建议与图表配置
#[derive(Default)]
pub struct Consultant;

impl Consultant {
    /// 解析建议与图表，只保留引用了已有数据的图表
    pub fn recommend(&self, raw: &str, state: &AnalysisState) -> RecommendationUpdate {
        let mut issues = Vec::new();

        let (recommendations, chart_items) = match extract_json(raw) {
            Some(Value::Object(object))
                if object.contains_key("recommendations") || object.contains_key("charts") =>
            {
                (
                    object
                        .get("recommendations")
                        .map(recommendation_text)
                        .unwrap_or_default(),
                    object.get("charts").and_then(Value::as_array).cloned(),
                )
            }
            _ => split_charts_section(raw),
        };

        let recommendations = if recommendations.trim().is_empty() {
            issues.push(RunIssue::malformed(
                RoleKind::Recommendation,
                "no recommendations in output",
            ));
            FALLBACK_RECOMMENDATIONS.to_string()
        } else {
            recommendations.trim().to_string()
        };

        let charts = match chart_items {
            Some(items) => self.validate_charts(&items, state, &mut issues),
            None => {
                tracing::debug!("输出中没有图表配置，使用默认图表策略");
                suggest_charts(state.data())
            }
        };

        RecommendationUpdate {
            recommendations,
            charts,
            issues,
        }
    }

    fn validate_charts(
        &self,
        items: &[Value],
        state: &AnalysisState,
        issues: &mut Vec<RunIssue>,
    ) -> Vec<ChartSpec> {
        let mut charts = Vec::new();
        for (idx, item) in items.iter().enumerate() {
            let chart = match serde_json::from_value::<ChartSpec>(normalize_chart_value(item)) {
                Ok(chart) => chart,
                Err(e) => {
                    issues.push(RunIssue::malformed(
                        RoleKind::Recommendation,
                        format!("chart #{} dropped: {}", idx + 1, e),
                    ));
                    continue;
                }
            };
            let data_key = chart.data_key().to_string();
            match validate_chart(chart, state.data()) {
                Ok(chart) => charts.push(chart),
                Err(reason) => {
                    tracing::warn!("⚠️ 丢弃图表 #{}: {}", idx + 1, reason);
                    issues.push(
                        RunIssue::malformed(
                            RoleKind::Recommendation,
                            format!("chart #{} dropped: {}", idx + 1, reason),
                        )
                        .with_key(&data_key),
                    );
                }
            }
        }
        charts
    }
}

#[async_trait]
impl RoleAgent for Consultant {
    type Update = RecommendationUpdate;

    fn role(&self) -> RoleKind {
        RoleKind::Recommendation
    }

    fn localized(&self) -> bool {
        true
    }

    fn prompt_template(&self) -> PromptTemplate {
        PromptTemplate {
            system_prompt: r#"You are an e-commerce business consultant.
Turn the analysis into 3-5 practical, action-oriented recommendations. Each recommendation names a specific action, its expected business impact and the metric it should move (revenue growth, customer retention or operational efficiency).
Also propose charts that support the recommendations:
- `data_key` must be exactly one of the dataset keys listed under "Current data".
- Use a `line` chart for time-ordered numeric series (daily dates).
- Use a `bar` chart for a small number of categories or for month-by-month comparisons.
- Use a `horizontal_bar` chart for long category labels or many categories, such as product names.
- Use a `pie` chart for part-of-whole breakdowns, such as revenue by category.
- Use only field names that appear in the dataset rows. An empty `charts` array is acceptable."#
                .to_string(),
            output_instruction: schema_instruction::<RecommendationDecision>(),
            opening_instruction: "Produce recommendations and charts for the analysis below."
                .to_string(),
            closing_instruction: "Return your recommendations now.".to_string(),
        }
    }

    fn build_context(&self, state: &AnalysisState, formatter: &DataFormatter) -> String {
        let mut content = format!("## Original query\n{}\n\n", state.query());
        content.push_str(&format!("## Analysis\n{}\n\n", state.analysis()));
        content.push_str(&formatter.format_data_keys(state.data()));
        content.push_str(&formatter.format_datasets(state.data()));
        content
    }

    async fn interpret(
        &self,
        raw: &str,
        state: &AnalysisState,
        _context: &WorkflowContext,
    ) -> RecommendationUpdate {
        let update = self.recommend(raw, state);
        tracing::info!("📊 生成图表 {} 个", update.charts.len());
        update
    }
}

/// 建议可以是一段文本，也可以是字符串数组
fn recommendation_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => string_list(other)
            .iter()
            .enumerate()
            .map(|(idx, item)| format!("{}. {}", idx + 1, item.trim()))
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

/// 自由文本输出：`CHARTS:` 之前为建议，之后为图表数组
fn split_charts_section(raw: &str) -> (String, Option<Vec<Value>>) {
    match raw.find("CHARTS:") {
        Some(idx) => {
            let charts = extract_json(&raw[idx + "CHARTS:".len()..])
                .and_then(|value| value.as_array().cloned());
            (raw[..idx].to_string(), charts)
        }
        None => (raw.to_string(), None),
    }
}
