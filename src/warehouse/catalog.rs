//! 数据集函数目录

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// 数据集函数的参数类型，每个函数至多一个参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Days,
    Limit,
    Months,
}

impl ParamKind {
    pub fn name(&self) -> &'static str {
        match self {
            ParamKind::Days => "days",
            ParamKind::Limit => "limit",
            ParamKind::Months => "months",
        }
    }

    pub fn default_value(&self) -> u32 {
        match self {
            ParamKind::Days => 30,
            ParamKind::Limit => 10,
            ParamKind::Months => 6,
        }
    }

    /// 允许的取值范围（闭区间）
    pub fn bounds(&self) -> (u32, u32) {
        match self {
            ParamKind::Days => (1, 365),
            ParamKind::Limit => (1, 100),
            ParamKind::Months => (1, 24),
        }
    }

    pub fn clamp(&self, value: u32) -> u32 {
        let (min, max) = self.bounds();
        value.clamp(min, max)
    }
}

/// 数据集函数目录中的固定函数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetFunction {
    SalesMetrics,
    TopProducts,
    CustomerSegments,
    SalesTrend,
    RevenueByCategory,
    MonthlyComparison,
    CustomerLifetimeValue,
}

impl DatasetFunction {
    pub const ALL: [DatasetFunction; 7] = [
        DatasetFunction::SalesMetrics,
        DatasetFunction::TopProducts,
        DatasetFunction::CustomerSegments,
        DatasetFunction::SalesTrend,
        DatasetFunction::RevenueByCategory,
        DatasetFunction::MonthlyComparison,
        DatasetFunction::CustomerLifetimeValue,
    ];

    /// 合并到 data 时使用的稳定键
    pub fn key(&self) -> &'static str {
        match self {
            DatasetFunction::SalesMetrics => "sales_metrics",
            DatasetFunction::TopProducts => "top_products",
            DatasetFunction::CustomerSegments => "customer_segments",
            DatasetFunction::SalesTrend => "sales_trend",
            DatasetFunction::RevenueByCategory => "revenue_by_category",
            DatasetFunction::MonthlyComparison => "monthly_comparison",
            DatasetFunction::CustomerLifetimeValue => "customer_lifetime_value",
        }
    }

    pub fn function_name(&self) -> String {
        format!("get_{}", self.key())
    }

    pub fn parameter(&self) -> Option<ParamKind> {
        match self {
            DatasetFunction::SalesMetrics | DatasetFunction::SalesTrend => Some(ParamKind::Days),
            DatasetFunction::TopProducts | DatasetFunction::CustomerLifetimeValue => {
                Some(ParamKind::Limit)
            }
            DatasetFunction::MonthlyComparison => Some(ParamKind::Months),
            DatasetFunction::CustomerSegments | DatasetFunction::RevenueByCategory => None,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            DatasetFunction::SalesMetrics => "Revenue, orders, average order value and unique customers over a period",
            DatasetFunction::TopProducts => "Top products ranked by revenue",
            DatasetFunction::CustomerSegments => "Active customers grouped into income-based value segments",
            DatasetFunction::SalesTrend => "Daily revenue and order counts, suited to line charts",
            DatasetFunction::RevenueByCategory => "Revenue breakdown by product category, suited to pie or bar charts",
            DatasetFunction::MonthlyComparison => "Month-over-month revenue comparison, suited to bar charts",
            DatasetFunction::CustomerLifetimeValue => "Top customers ranked by lifetime value",
        }
    }

    /// 结果中承载行数据的字段；sales_metrics 为标量汇总，没有行
    pub fn rows_field(&self) -> Option<&'static str> {
        match self {
            DatasetFunction::SalesMetrics => None,
            DatasetFunction::CustomerLifetimeValue => Some("top_customers"),
            other => Some(other.key()),
        }
    }

    /// 校验数据集返回的结构
    pub fn validate_result(&self, value: &Value) -> Result<(), String> {
        let object = value
            .as_object()
            .ok_or_else(|| format!("expected a JSON object, got {}", json_type(value)))?;

        match self.rows_field() {
            Some(field) => {
                let rows = object
                    .get(field)
                    .ok_or_else(|| format!("missing `{}` rows", field))?
                    .as_array()
                    .ok_or_else(|| format!("`{}` is not an array", field))?;
                if let Some(position) = rows.iter().position(|row| !row.is_object()) {
                    return Err(format!("row {} of `{}` is not an object", position, field));
                }
                Ok(())
            }
            None => {
                for field in ["total_orders", "total_revenue"] {
                    if !object.get(field).is_some_and(Value::is_number) {
                        return Err(format!("missing numeric `{}`", field));
                    }
                }
                Ok(())
            }
        }
    }

    /// 在自然语言中点名该数据集所需的词干，全部出现才算点名
    fn mention_stems(&self) -> &'static [&'static str] {
        match self {
            DatasetFunction::SalesMetrics => &["sale", "metric"],
            DatasetFunction::SalesTrend => &["sale", "trend"],
            DatasetFunction::TopProducts => &["top", "product"],
            DatasetFunction::CustomerSegments => &["segment"],
            DatasetFunction::RevenueByCategory => &["revenue", "categor"],
            DatasetFunction::MonthlyComparison => &["month", "compar"],
            DatasetFunction::CustomerLifetimeValue => &["lifetime", "value"],
        }
    }

    /// 从一段自然语言请求中识别全部被点名的数据集，例如
    /// "sales metrics and top products" 或 "monthly revenue comparison"
    pub fn resolve_mentions(text: &str) -> Vec<DatasetFunction> {
        let lowered = text.to_lowercase();
        let words: Vec<&str> = lowered
            .split(|c: char| !c.is_ascii_alphabetic())
            .filter(|word| !word.is_empty())
            .collect();
        DatasetFunction::ALL
            .into_iter()
            .filter(|function| {
                function
                    .mention_stems()
                    .iter()
                    .all(|stem| words.iter().any(|word| word.starts_with(stem)))
            })
            .collect()
    }

    /// 供提示词使用的函数目录说明
    pub fn catalog_description() -> String {
        DatasetFunction::ALL
            .iter()
            .map(|function| {
                let signature = match function.parameter() {
                    Some(param) => format!(
                        "{}({}: {}..={}, default {})",
                        function.function_name(),
                        param.name(),
                        param.bounds().0,
                        param.bounds().1,
                        param.default_value()
                    ),
                    None => format!("{}()", function.function_name()),
                };
                format!("- {}: {}", signature, function.description())
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Display for DatasetFunction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for DatasetFunction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().trim_end_matches("()").to_lowercase();
        let normalized = normalized.strip_prefix("get_").unwrap_or(&normalized);
        DatasetFunction::ALL
            .into_iter()
            .find(|function| function.key() == normalized)
            .ok_or_else(|| format!("Unknown dataset function: {}", s.trim()))
    }
}

/// 一次具体的数据集调用
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatasetCall {
    pub function: DatasetFunction,
    /// 参数值，已按范围截断；无参数函数为 None
    pub argument: Option<u32>,
}

impl DatasetCall {
    /// 使用默认参数构造
    pub fn new(function: DatasetFunction) -> Self {
        Self {
            function,
            argument: function.parameter().map(|param| param.default_value()),
        }
    }

    pub fn with_argument(mut self, value: u32) -> Self {
        if let Some(param) = self.function.parameter() {
            self.argument = Some(param.clamp(value));
        }
        self
    }

    /// 从角色给出的 `{function, params}` 决策构造调用
    pub fn from_decision(function: &str, params: Option<&Value>) -> Result<Self, String> {
        let function: DatasetFunction = function.parse()?;
        let mut call = DatasetCall::new(function);

        if let (Some(param), Some(params)) = (function.parameter(), params) {
            let raw = params
                .get(param.name())
                .or_else(|| params.as_object().and_then(|map| map.values().next()));
            if let Some(value) = raw.and_then(as_u32) {
                call = call.with_argument(value);
            }
        }
        Ok(call)
    }

    pub fn key(&self) -> &'static str {
        self.function.key()
    }

    /// 以 JSON 对象表示的参数
    pub fn params_json(&self) -> Value {
        match (self.function.parameter(), self.argument) {
            (Some(param), Some(value)) => json!({ param.name(): value }),
            _ => json!({}),
        }
    }
}

impl Display for DatasetCall {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match (self.function.parameter(), self.argument) {
            (Some(param), Some(value)) => write!(
                f,
                "{}({}={})",
                self.function.function_name(),
                param.name(),
                value
            ),
            _ => write!(f, "{}()", self.function.function_name()),
        }
    }
}

fn as_u32(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64))
            .map(|n| n.min(u32::MAX as u64) as u32),
        Value::String(s) => s.trim().parse::<u32>().ok(),
        _ => None,
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
