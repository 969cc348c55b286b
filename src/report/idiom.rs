use serde::Deserialize;
use serde_json::Value;
use std::path::Path;

use crate::{debug, warn};

/// 对比图底部的三国成语
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Idiom {
    #[serde(rename = "成语")]
    pub title: String,
    #[serde(rename = "典故")]
    pub story: String,
}

/// 支持 `[...]` 与 `{"三国成语大全": [...]}` 两种格式，格式不对的条目跳过
pub fn parse_idioms(text: &str) -> Vec<Idiom> {
    let value: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            warn!(target: "Report", "成语文件解析失败: {}", e);
            return Vec::new();
        }
    };

    let list = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("三国成语大全") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };

    list.into_iter()
        .filter_map(|v| serde_json::from_value(v).ok())
        .collect()
}

pub fn load_idioms(path: &Path) -> Vec<Idiom> {
    match std::fs::read_to_string(path) {
        Ok(text) => parse_idioms(&text),
        Err(e) => {
            debug!(target: "Report", "未加载成语 {:?}: {}", path, e);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_both_layouts() {
        let list = r#"[{"成语":"望梅止渴","典故":"曹操行军失道"}]"#;
        let wrapped = r#"{"三国成语大全":[{"成语":"乐不思蜀","典故":"刘禅降魏"},{"bad":1}]}"#;

        assert_eq!(parse_idioms(list)[0].title, "望梅止渴");
        let w = parse_idioms(wrapped);
        assert_eq!(w.len(), 1);
        assert_eq!(w[0].story, "刘禅降魏");
    }

    #[test]
    fn invalid_json_is_empty() {
        assert!(parse_idioms("not json").is_empty());
        assert!(parse_idioms(r#"{"other": []}"#).is_empty());
    }
}
