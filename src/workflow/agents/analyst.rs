use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{AnalysisState, EvaluationUpdate, RoleKind, RunIssue};
use crate::warehouse::DatasetFunction;
use crate::workflow::context::WorkflowContext;
use crate::workflow::formatter::DataFormatter;
use crate::workflow::output_parser::{extract_json, parse_flag, schema_instruction, string_list};
use crate::workflow::role::{PromptTemplate, RoleAgent};

static SECTION_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^[\s*#]*(SUFFICIENT|NEEDED|ANALYSIS|CHARTS)\s*\**\s*:")
        .expect("valid section marker regex")
});

/// 判定一个 JSON 对象是评估结论所需的字段，缺少时按分段文本解析
const EVALUATION_FIELDS: [&str; 4] = ["analysis", "needs_more_data", "sufficient", "data_requests"];

/// 评估角色的输出结构
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct EvaluationDecision {
    /// 基于现有数据的分析，只引用已提供的数据集
    pub analysis: String,
    /// 现有数据是否不足以回答问题
    pub needs_more_data: bool,
    /// 缺失数据的具体描述，仅在 needs_more_data 为 true 时填写
    #[serde(default)]
    pub data_requests: Vec<String>,
}

/// 评估角色的原始结论，尚未按约束规整
#[derive(Debug, Default)]
struct RawEvaluation {
    analysis: String,
    needs_more_data: Option<bool>,
    data_requests: Vec<String>,
}

/// 评估角色：撰写分析，判断数据是否充分并提出数据请求
#[derive(Default)]
pub struct Analyst;

impl Analyst {
    /// 解析并规整评估结论
    pub fn evaluate(&self, raw: &str, state: &AnalysisState) -> EvaluationUpdate {
        let mut issues = Vec::new();
        let parsed = match extract_json(raw) {
            Some(Value::Object(object))
                if EVALUATION_FIELDS.iter().any(|field| object.contains_key(*field)) =>
            {
                from_json(&object)
            }
            _ => from_sections(raw),
        };

        let mut needs_more_data = parsed.needs_more_data.unwrap_or_else(|| {
            issues.push(RunIssue::malformed(
                RoleKind::Evaluation,
                "missing or invalid sufficiency flag, treating data as sufficient",
            ));
            false
        });

        let data = state.data();
        let mut data_requests: Vec<String> = Vec::new();
        for request in parsed.data_requests {
            let request = request.trim().to_string();
            if request.is_empty() || data_requests.contains(&request) {
                continue;
            }
            let repeats_present_key = request
                .parse::<DatasetFunction>()
                .is_ok_and(|function| data.contains_key(function.key()));
            if repeats_present_key {
                tracing::debug!("忽略重复请求已有数据集: {}", request);
                continue;
            }
            data_requests.push(request);
        }

        if data.is_empty() {
            needs_more_data = true;
            if data_requests.is_empty() {
                data_requests.push(format!("Datasets that answer: {}", state.query()));
            }
        } else if needs_more_data && data_requests.is_empty() {
            needs_more_data = false;
        }
        if !needs_more_data {
            data_requests.clear();
        }

        let mut analysis = parsed.analysis.trim().to_string();
        if analysis.is_empty() {
            analysis = if data.is_empty() {
                String::from("No data was available to analyze.")
            } else {
                let keys: Vec<&str> = data.keys().map(String::as_str).collect();
                format!("Analysis based on available data: {}", keys.join(", "))
            };
        }

        EvaluationUpdate {
            analysis,
            needs_more_data,
            data_requests,
            issues,
        }
    }
}

#[async_trait]
impl RoleAgent for Analyst {
    type Update = EvaluationUpdate;

    fn role(&self) -> RoleKind {
        RoleKind::Evaluation
    }

    fn localized(&self) -> bool {
        true
    }

    fn prompt_template(&self) -> PromptTemplate {
        PromptTemplate {
            system_prompt: r#"You are a senior e-commerce data analyst.
Analyze the datasets provided and answer the business question.
Rules:
- Summarize patterns, trends, outliers and notable numbers across all datasets provided.
- Reference only the datasets shown to you. Never describe data you were not given.
- Decide whether the data is sufficient to answer the question thoroughly.
- If it is not, set `needs_more_data` to true and list specific, actionable descriptions of the missing data in `data_requests` (for example "top products by revenue" or "monthly comparison for the last 12 months").
- Do not request datasets that are already present unless different parameters are needed."#
                .to_string(),
            output_instruction: schema_instruction::<EvaluationDecision>(),
            opening_instruction: "Evaluate the following data for the business question."
                .to_string(),
            closing_instruction: "Return your evaluation now.".to_string(),
        }
    }

    fn build_context(&self, state: &AnalysisState, formatter: &DataFormatter) -> String {
        let mut content = format!("## Business question\n{}\n\n", state.query());
        content.push_str(&formatter.format_data_keys(state.data()));
        content.push_str(&formatter.format_datasets(state.data()));
        content
    }

    async fn interpret(
        &self,
        raw: &str,
        state: &AnalysisState,
        _context: &WorkflowContext,
    ) -> EvaluationUpdate {
        let update = self.evaluate(raw, state);
        if update.needs_more_data {
            tracing::info!("🔁 数据不足，请求补充: {:?}", update.data_requests);
        }
        update
    }
}

fn from_json(object: &serde_json::Map<String, Value>) -> RawEvaluation {
    let needs_more_data = object
        .get("needs_more_data")
        .and_then(parse_flag)
        .or_else(|| object.get("sufficient").and_then(parse_flag).map(|s| !s));

    RawEvaluation {
        analysis: object
            .get("analysis")
            .map(|value| match value {
                Value::String(text) => text.clone(),
                Value::Null => String::new(),
                other => string_list(other).join("\n"),
            })
            .unwrap_or_default(),
        needs_more_data,
        data_requests: object
            .get("data_requests")
            .map(string_list)
            .unwrap_or_default(),
    }
}

/// 解析 `SUFFICIENT: / NEEDED: / ANALYSIS:` 分段文本
fn from_sections(raw: &str) -> RawEvaluation {
    let markers: Vec<(String, usize, usize)> = SECTION_MARKER
        .captures_iter(raw)
        .filter_map(|captures| {
            let whole = captures.get(0)?;
            let name = captures.get(1)?.as_str().to_uppercase();
            Some((name, whole.start(), whole.end()))
        })
        .collect();

    if markers.is_empty() {
        return RawEvaluation {
            analysis: raw.to_string(),
            ..Default::default()
        };
    }

    let needs_more_data = section(raw, &markers, "SUFFICIENT").and_then(|value| {
        let word = value.split_whitespace().next()?;
        parse_flag(&Value::String(word.trim_matches(|c: char| !c.is_alphabetic()).to_string()))
            .map(|sufficient| !sufficient)
    });

    let data_requests = section(raw, &markers, "NEEDED")
        .map(|text| {
            text.lines()
                .map(|line| {
                    line.trim()
                        .trim_start_matches(|c: char| {
                            c == '-' || c == '*' || c == '•' || c.is_ascii_digit() || c == '.'
                        })
                        .trim()
                        .trim_matches(|c: char| c == '[' || c == ']')
                        .to_string()
                })
                .filter(|line| !line.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let analysis = section(raw, &markers, "ANALYSIS")
        .map(str::to_string)
        .unwrap_or_else(|| raw[..markers[0].1].trim().to_string());

    RawEvaluation {
        analysis,
        needs_more_data,
        data_requests,
    }
}

fn section<'a>(raw: &'a str, markers: &[(String, usize, usize)], name: &str) -> Option<&'a str> {
    let idx = markers.iter().position(|(marker, _, _)| marker == name)?;
    let start = markers[idx].2;
    let end = markers.get(idx + 1).map_or(raw.len(), |(_, next, _)| *next);
    Some(raw[start..end].trim())
}
