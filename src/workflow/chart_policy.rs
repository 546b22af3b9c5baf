//! 图表策略：数据集结构推断、图表校验与基于结构的默认图表

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::types::{ChartSpec, DatasetMap, PieChart, SeriesChart};
use crate::warehouse::DatasetFunction;

static DAILY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}").expect("valid date regex"));
static MONTHLY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}$").expect("valid month regex"));

/// 超过该长度的分类标签使用横向柱状图
const LONG_LABEL: usize = 14;
/// 超过该数量的分类使用横向柱状图
const MANY_CATEGORIES: usize = 8;

/// 字段类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// 日期序列 YYYY-MM-DD
    Daily,
    /// 月份序列 YYYY-MM
    Monthly,
    Numeric,
    Categorical,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldInfo {
    pub name: String,
    pub kind: FieldKind,
    /// 分类字段的最长标签
    pub max_label_len: usize,
}

/// 行式数据集的结构
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetShape {
    pub row_count: usize,
    pub fields: Vec<FieldInfo>,
}

impl DatasetShape {
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name == name)
    }

    fn first_of(&self, kinds: &[FieldKind]) -> Option<&FieldInfo> {
        self.fields.iter().find(|f| kinds.contains(&f.kind))
    }

    fn temporal(&self) -> Option<&FieldInfo> {
        self.first_of(&[FieldKind::Daily, FieldKind::Monthly])
    }

    fn categorical(&self) -> Option<&FieldInfo> {
        self.first_of(&[FieldKind::Categorical])
    }

    /// 优先选择营收类数值字段，跳过 id
    fn measure(&self) -> Option<&FieldInfo> {
        let numeric = || {
            self.fields
                .iter()
                .filter(|f| f.kind == FieldKind::Numeric)
                .filter(|f| f.name != "id" && !f.name.ends_with("_id"))
        };
        numeric()
            .find(|f| f.name.contains("revenue"))
            .or_else(|| numeric().find(|f| f.name == "lifetime_value"))
            .or_else(|| numeric().find(|f| f.name.contains("count")))
            .or_else(|| numeric().next())
    }
}

/// 推断数据集的行结构；标量汇总（如 sales_metrics）返回 None
pub fn infer_shape(key: &str, value: &Value) -> Option<DatasetShape> {
    let rows = dataset_rows(key, value)?;
    let objects: Vec<&Map<String, Value>> = rows.iter().filter_map(Value::as_object).collect();
    let first = objects.first()?;

    let fields = first
        .keys()
        .map(|name| {
            let values: Vec<&Value> = objects
                .iter()
                .filter_map(|row| row.get(name))
                .filter(|v| !v.is_null())
                .collect();
            FieldInfo {
                name: name.clone(),
                kind: classify(&values),
                max_label_len: values
                    .iter()
                    .filter_map(|v| v.as_str())
                    .map(|s| s.chars().count())
                    .max()
                    .unwrap_or_default(),
            }
        })
        .collect();

    Some(DatasetShape {
        row_count: objects.len(),
        fields,
    })
}

fn dataset_rows<'a>(key: &str, value: &'a Value) -> Option<&'a Vec<Value>> {
    if let Value::Array(rows) = value {
        return Some(rows);
    }
    let object = value.as_object()?;
    if let Ok(function) = key.parse::<DatasetFunction>() {
        return function
            .rows_field()
            .and_then(|field| object.get(field))
            .and_then(Value::as_array);
    }
    object
        .get(key)
        .and_then(Value::as_array)
        .or_else(|| object.values().find_map(Value::as_array))
}

fn classify(values: &[&Value]) -> FieldKind {
    if !values.is_empty() && values.iter().all(|v| v.is_number()) {
        return FieldKind::Numeric;
    }
    let strings: Vec<&str> = values.iter().filter_map(|v| v.as_str()).collect();
    if !strings.is_empty() && strings.len() == values.len() {
        if strings.iter().all(|s| DAILY.is_match(s)) {
            return FieldKind::Daily;
        }
        if strings.iter().all(|s| MONTHLY.is_match(s)) {
            return FieldKind::Monthly;
        }
    }
    FieldKind::Categorical
}

/// 按结构为单个数据集选择图表
pub fn suggest_chart(key: &str, value: &Value) -> Option<ChartSpec> {
    let shape = infer_shape(key, value)?;
    let measure = shape.measure()?.name.clone();
    let title = humanize(key);

    if let Some(time) = shape.temporal() {
        let series = SeriesChart {
            title,
            data_key: key.to_string(),
            x_field: Some(time.name.clone()),
            y_fields: vec![measure],
            description: None,
        };
        return Some(match time.kind {
            FieldKind::Daily => ChartSpec::Line(series),
            _ => ChartSpec::Bar(series),
        });
    }

    let category = shape.categorical()?;
    if is_part_of_whole(key, &shape) {
        return Some(ChartSpec::Pie(PieChart {
            title,
            data_key: key.to_string(),
            name_field: Some(category.name.clone()),
            value_field: Some(measure),
            description: None,
        }));
    }

    let series = SeriesChart {
        title,
        data_key: key.to_string(),
        x_field: Some(category.name.clone()),
        y_fields: vec![measure],
        description: None,
    };
    if category.max_label_len > LONG_LABEL || shape.row_count > MANY_CATEGORIES {
        Some(ChartSpec::HorizontalBar(series))
    } else {
        Some(ChartSpec::Bar(series))
    }
}

/// 占比类数据：按某一维度拆分的总量，且分类数量较少
fn is_part_of_whole(key: &str, shape: &DatasetShape) -> bool {
    key.contains("_by_") && (2..=MANY_CATEGORIES).contains(&shape.row_count)
}

/// 为全部已获取的数据集生成默认图表
pub fn suggest_charts(data: &DatasetMap) -> Vec<ChartSpec> {
    data.iter()
        .filter_map(|(key, value)| suggest_chart(key, value))
        .collect()
}

/// 校验并补全图表配置。
///
/// data_key 必须是 data 的顶层键；`top_products.top_products` 这类路径会归一为顶层键。
/// 行式数据集上引用的字段必须存在，缺省字段按结构补全。
pub fn validate_chart(mut chart: ChartSpec, data: &DatasetMap) -> Result<ChartSpec, String> {
    let key = normalize_data_key(chart.data_key(), data)
        .ok_or_else(|| format!("data_key `{}` is not present in data", chart.data_key()))?;
    chart.set_data_key(&key);

    let Some(shape) = data.get(&key).and_then(|value| infer_shape(&key, value)) else {
        return Ok(chart);
    };

    if let Some(missing) = chart
        .referenced_fields()
        .into_iter()
        .find(|field| !shape.has_field(field))
    {
        return Err(format!(
            "field `{}` does not exist in dataset `{}`",
            missing, key
        ));
    }

    match &mut chart {
        ChartSpec::Line(c) | ChartSpec::Bar(c) | ChartSpec::HorizontalBar(c) => {
            if c.x_field.is_none() {
                c.x_field = shape
                    .temporal()
                    .or_else(|| shape.categorical())
                    .map(|f| f.name.clone());
            }
            if c.y_fields.is_empty() {
                c.y_fields.extend(shape.measure().map(|f| f.name.clone()));
            }
        }
        ChartSpec::Pie(c) => {
            if c.name_field.is_none() {
                c.name_field = shape.categorical().map(|f| f.name.clone());
            }
            if c.value_field.is_none() {
                c.value_field = shape.measure().map(|f| f.name.clone());
            }
        }
    }
    Ok(chart)
}

fn normalize_data_key(key: &str, data: &DatasetMap) -> Option<String> {
    let key = key.trim();
    if data.contains_key(key) {
        return Some(key.to_string());
    }
    key.split(['.', '/', '['])
        .next()
        .map(str::trim)
        .filter(|head| data.contains_key(*head))
        .map(str::to_string)
}

/// 宽松地规整模型给出的单个图表对象，使其可按 `type` 标签反序列化
pub fn normalize_chart_value(value: &Value) -> Value {
    let Some(object) = value.as_object() else {
        return value.clone();
    };
    let mut object = object.clone();

    if !object.contains_key("type") {
        if let Some(kind) = object.remove("chart_type") {
            object.insert("type".to_string(), kind);
        }
    }
    if let Some(Value::String(kind)) = object.get("type") {
        let kind = kind
            .trim()
            .to_lowercase()
            .replace([' ', '-'], "_")
            .replace("horizontalbar", "horizontal_bar");
        object.insert("type".to_string(), Value::String(kind));
    }

    match object.remove("y_fields") {
        Some(Value::String(field)) => {
            object.insert("y_fields".to_string(), Value::Array(vec![Value::String(field)]));
        }
        Some(other) => {
            object.insert("y_fields".to_string(), other);
        }
        None => {
            if let Some(field) = object.remove("y_field") {
                object.insert("y_fields".to_string(), Value::Array(vec![field]));
            }
        }
    }

    Value::Object(object)
}

/// sales_trend -> Sales Trend
fn humanize(key: &str) -> String {
    key.split('_')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
