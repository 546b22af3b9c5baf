use std::fmt::{Display, Formatter};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// 图表类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    Line,
    Bar,
    HorizontalBar,
    Pie,
}

impl Display for ChartKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ChartKind::Line => "line",
            ChartKind::Bar => "bar",
            ChartKind::HorizontalBar => "horizontal_bar",
            ChartKind::Pie => "pie",
        };
        f.write_str(name)
    }
}

/// 折线图、柱状图与横向柱状图共用的字段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SeriesChart {
    pub title: String,
    /// 引用的数据集键，必须是 data 中的顶层键
    pub data_key: String,
    /// 分类或时间字段
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x_field: Option<String>,
    /// 数值字段列表
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub y_fields: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// 饼图字段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PieChart {
    pub title: String,
    pub data_key: String,
    /// 扇区名称字段
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_field: Option<String>,
    /// 扇区数值字段
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// 图表配置，按 `type` 标签区分四种图表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChartSpec {
    Line(SeriesChart),
    Bar(SeriesChart),
    HorizontalBar(SeriesChart),
    Pie(PieChart),
}

impl ChartSpec {
    pub fn kind(&self) -> ChartKind {
        match self {
            ChartSpec::Line(_) => ChartKind::Line,
            ChartSpec::Bar(_) => ChartKind::Bar,
            ChartSpec::HorizontalBar(_) => ChartKind::HorizontalBar,
            ChartSpec::Pie(_) => ChartKind::Pie,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            ChartSpec::Line(c) | ChartSpec::Bar(c) | ChartSpec::HorizontalBar(c) => &c.title,
            ChartSpec::Pie(c) => &c.title,
        }
    }

    pub fn data_key(&self) -> &str {
        match self {
            ChartSpec::Line(c) | ChartSpec::Bar(c) | ChartSpec::HorizontalBar(c) => &c.data_key,
            ChartSpec::Pie(c) => &c.data_key,
        }
    }

    pub fn set_data_key(&mut self, key: &str) {
        match self {
            ChartSpec::Line(c) | ChartSpec::Bar(c) | ChartSpec::HorizontalBar(c) => {
                c.data_key = key.to_string()
            }
            ChartSpec::Pie(c) => c.data_key = key.to_string(),
        }
    }

    /// 图表引用的全部字段名
    pub fn referenced_fields(&self) -> Vec<&str> {
        match self {
            ChartSpec::Line(c) | ChartSpec::Bar(c) | ChartSpec::HorizontalBar(c) => c
                .x_field
                .iter()
                .chain(c.y_fields.iter())
                .map(String::as_str)
                .collect(),
            ChartSpec::Pie(c) => c
                .name_field
                .iter()
                .chain(c.value_field.iter())
                .map(String::as_str)
                .collect(),
        }
    }
}
