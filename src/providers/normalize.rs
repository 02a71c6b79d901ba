//! 搜索结果归一化
//!
//! 搜索后端的返回形态不稳定（结果列表 / 单个对象 / 纯字符串 / 其它），
//! 先转为 SearchPayload 标签枚举，再统一展开为文本片段；任何形态都不报错，最差退化为字符串形式。

use serde_json::{Map, Value};

/// 搜索返回形态
#[derive(Debug, Clone, PartialEq)]
pub enum SearchPayload {
    /// 结果列表（通常每项是带 content 字段的对象）
    Results(Vec<Value>),
    /// 单个对象
    Single(Map<String, Value>),
    Text(String),
    /// 无结果（null）
    Empty,
    /// 数字、布尔等其它形态
    Other(Value),
}

impl From<Value> for SearchPayload {
    fn from(value: Value) -> Self {
        match value {
            Value::Array(items) => SearchPayload::Results(items),
            Value::Object(map) => SearchPayload::Single(map),
            Value::String(s) => SearchPayload::Text(s),
            Value::Null => SearchPayload::Empty,
            other => SearchPayload::Other(other),
        }
    }
}

impl SearchPayload {
    /// 展开为有序文本片段
    pub fn into_snippets(self) -> Vec<String> {
        match self {
            SearchPayload::Results(items) => items.into_iter().map(item_text).collect(),
            SearchPayload::Single(map) => vec![content_or_string(map)],
            SearchPayload::Text(s) => vec![s],
            SearchPayload::Empty => Vec::new(),
            SearchPayload::Other(v) => {
                tracing::debug!(shape = "other", "search payload normalized to string");
                vec![value_to_string(&v)]
            }
        }
    }
}

/// 归一化入口：原始 JSON -> 文本片段
pub fn normalize_search_results(raw: Value) -> Vec<String> {
    SearchPayload::from(raw).into_snippets()
}

fn item_text(item: Value) -> String {
    match item {
        Value::Object(map) => content_or_string(map),
        other => value_to_string(&other),
    }
}

fn content_or_string(map: Map<String, Value>) -> String {
    match map.get("content") {
        Some(content) => value_to_string(content),
        None => {
            tracing::debug!(shape = "object_without_content", "search result normalized to string");
            Value::Object(map).to_string()
        }
    }
}

/// 字符串原样返回，其它值用 JSON 文本形式
fn value_to_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_list_of_objects_with_content() {
        let raw = json!([
            {"url": "https://a", "content": "first"},
            {"url": "https://b", "content": "second"}
        ]);
        assert_eq!(normalize_search_results(raw), vec!["first", "second"]);
    }

    #[test]
    fn test_list_of_plain_values() {
        let raw = json!(["plain text", 42, {"title": "no content"}]);
        let snippets = normalize_search_results(raw);
        assert_eq!(snippets.len(), 3);
        assert_eq!(snippets[0], "plain text");
        assert_eq!(snippets[1], "42");
        assert!(snippets[2].contains("no content"));
    }

    #[test]
    fn test_single_object_with_content() {
        let raw = json!({"content": "only one", "score": 0.9});
        assert_eq!(normalize_search_results(raw), vec!["only one"]);
    }

    #[test]
    fn test_single_object_without_content() {
        let raw = json!({"answer": "something"});
        let snippets = normalize_search_results(raw);
        assert_eq!(snippets.len(), 1);
        assert!(snippets[0].contains("answer"));
        assert!(snippets[0].contains("something"));
    }

    #[test]
    fn test_bare_string() {
        let raw = json!("Symptom X is commonly linked to Y.");
        assert_eq!(
            normalize_search_results(raw),
            vec!["Symptom X is commonly linked to Y."]
        );
    }

    #[test]
    fn test_non_string_content_field() {
        let raw = json!([{"content": ["a", "b"]}]);
        assert_eq!(normalize_search_results(raw), vec![r#"["a","b"]"#]);
    }

    #[test]
    fn test_null_and_other_shapes() {
        assert!(normalize_search_results(Value::Null).is_empty());
        assert_eq!(normalize_search_results(json!(true)), vec!["true"]);
        assert!(normalize_search_results(json!([])).is_empty());
    }
}
