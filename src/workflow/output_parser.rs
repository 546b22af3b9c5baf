//! 角色输出解析：推理后端的输出不可信，先解析为 JSON 值，再逐字段校验

use std::sync::LazyLock;

use regex::Regex;
use schemars::JsonSchema;
use serde_json::Value;

static FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?:json|JSON)?\s*\n?(.*?)```").expect("valid fenced block regex")
});

/// 从模型输出中提取 JSON 值。
///
/// 依次尝试：整段文本、围栏代码块、首个完整的对象或数组。
pub fn extract_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        if value.is_object() || value.is_array() {
            return Some(value);
        }
    }

    for captures in FENCED_BLOCK.captures_iter(trimmed) {
        if let Some(body) = captures.get(1) {
            if let Ok(value) = serde_json::from_str::<Value>(body.as_str().trim()) {
                return Some(value);
            }
        }
    }

    trimmed
        .char_indices()
        .filter(|(_, c)| *c == '{' || *c == '[')
        .find_map(|(start, _)| {
            let end = matching_bracket(&trimmed[start..])?;
            serde_json::from_str::<Value>(&trimmed[start..start + end]).ok()
        })
}

/// 返回与开头括号匹配的结束位置（不含），忽略字符串内的括号
fn matching_bracket(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (idx, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' | '[' => depth += 1,
            '}' | ']' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(idx + c.len_utf8());
                }
            }
            _ => {}
        }
    }
    None
}

/// 生成输出格式约束，嵌入系统提示词
pub fn schema_instruction<T: JsonSchema>() -> String {
    let schema = schemars::schema_for!(T);
    format!(
        "Respond with a single JSON object that conforms to this JSON schema. Do not add commentary outside the JSON.\n```json\n{}\n```",
        serde_json::to_string_pretty(&schema).unwrap_or_default()
    )
}

/// 宽松解析布尔标记，接受 true/false、yes/no 以及 0/1
pub fn parse_flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().filter(|n| *n == 0 || *n == 1).map(|n| n == 1),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" | "y" | "1" => Some(true),
            "false" | "no" | "n" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// 读取字符串或字符串数组
pub fn string_list(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => vec![s.clone()],
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.clone()),
                Value::Null => None,
                other => Some(other.to_string()),
            })
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_json_from_plain_fenced_and_prose() {
        assert_eq!(extract_json(r#"{"a": 1}"#), Some(json!({"a": 1})));

        let fenced = "Here you go:\n```json\n{\"calls\": []}\n```\nThanks";
        assert_eq!(extract_json(fenced), Some(json!({"calls": []})));

        let prose = r#"Decision: [{"function": "get_sales_trend", "params": {"days": 7}}] done"#;
        assert_eq!(
            extract_json(prose),
            Some(json!([{"function": "get_sales_trend", "params": {"days": 7}}]))
        );
    }

    #[test]
    fn test_brackets_inside_strings_are_ignored() {
        let text = r#"note {"analysis": "growth {strong} ] here", "needs_more_data": false} tail"#;
        let value = extract_json(text).unwrap();
        assert_eq!(value["analysis"], "growth {strong} ] here");
    }

    #[test]
    fn test_no_json_found() {
        assert_eq!(extract_json("SUFFICIENT: YES\nANALYSIS: fine"), None);
        assert_eq!(extract_json("{broken"), None);
    }

    #[test]
    fn test_parse_flag_variants() {
        assert_eq!(parse_flag(&json!(true)), Some(true));
        assert_eq!(parse_flag(&json!("No")), Some(false));
        assert_eq!(parse_flag(&json!(1)), Some(true));
        assert_eq!(parse_flag(&json!("maybe")), None);
        assert_eq!(parse_flag(&json!(null)), None);
    }
}
