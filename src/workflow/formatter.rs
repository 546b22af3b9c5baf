use serde_json::Value;

use crate::types::DatasetMap;
use crate::warehouse::DatasetFunction;

/// 提示词中的数据格式化器
pub struct DataFormatter {
    /// 每个数据集最多展示的行数
    preview_rows: usize,
}

impl DataFormatter {
    pub fn new(preview_rows: usize) -> Self {
        Self {
            preview_rows: preview_rows.max(1),
        }
    }

    /// 格式化数据集函数目录
    pub fn format_catalog(&self) -> String {
        format!(
            "## Available data functions\n{}\n\n",
            DatasetFunction::catalog_description()
        )
    }

    /// 只列出已获取的数据集键
    pub fn format_data_keys(&self, data: &DatasetMap) -> String {
        if data.is_empty() {
            return String::from("## Current data\n(none fetched yet)\n\n");
        }
        let keys: Vec<&str> = data.keys().map(String::as_str).collect();
        format!("## Current data\n{}\n\n", keys.join(", "))
    }

    /// 格式化数据集内容，行数超限时截断
    pub fn format_datasets(&self, data: &DatasetMap) -> String {
        if data.is_empty() {
            return String::from("## Datasets\n(no data available)\n\n");
        }

        let mut content = String::from("## Datasets\n");
        for (key, value) in data {
            let (preview, truncated) = self.truncate_rows(value);
            content.push_str(&format!(
                "### {}\n```json\n{}\n```\n",
                key,
                serde_json::to_string_pretty(&preview).unwrap_or_default()
            ));
            if truncated > 0 {
                content.push_str(&format!("({} more rows omitted)\n", truncated));
            }
            content.push('\n');
        }
        content
    }

    /// 格式化评估角色提出的数据请求
    pub fn format_requests(&self, requests: &[String]) -> String {
        if requests.is_empty() {
            return String::new();
        }
        let mut content = String::from("## Additional data requested\n");
        for request in requests {
            content.push_str(&format!("- {}\n", request));
        }
        content.push('\n');
        content
    }

    fn truncate_rows(&self, value: &Value) -> (Value, usize) {
        let mut preview = value.clone();
        let mut omitted = 0;
        let arrays: Vec<&mut Vec<Value>> = match &mut preview {
            Value::Array(rows) => vec![rows],
            Value::Object(map) => map.values_mut().filter_map(Value::as_array_mut).collect(),
            _ => Vec::new(),
        };
        for rows in arrays {
            if rows.len() > self.preview_rows {
                omitted += rows.len() - self.preview_rows;
                rows.truncate(self.preview_rows);
            }
        }
        (preview, omitted)
    }
}
