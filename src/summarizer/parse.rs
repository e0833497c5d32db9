use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::storage::Category;

pub const DEFAULT_SCORE: u8 = 5;
pub const MAX_TAGS: usize = 3;

const KNOWN_KEYS: [&str; 6] = [
    "title_zh",
    "summary_zh",
    "one_sentence_comment",
    "score",
    "tags",
    "category",
];

/// 模型返回中解析出的字段，缺失的字段保持为 None
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelPayload {
    pub title_zh: Option<String>,
    pub summary_zh: Option<String>,
    pub comment: Option<String>,
    pub score: u8,
    pub tags: Vec<String>,
    pub category: Category,
}

fn fenced_block() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```(?:json)?\s*(.*?)\s*```").expect("valid regex"))
}

/// 从模型的自由文本中取出 JSON 片段
///
/// 优先级：代码块 > 第一个 `{` 到最后一个 `}` > 原文。
pub fn extract_json(text: &str) -> &str {
    if let Some(body) = fenced_block().captures(text).and_then(|c| c.get(1)) {
        let body = body.as_str();
        if body.starts_with('{') {
            return body;
        }
    }

    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if start < end {
            return &text[start..=end];
        }
    }

    text
}

/// 解析模型输出；不是 JSON 对象或不含任何已知字段时返回 None
pub fn parse_payload(text: &str) -> Option<ModelPayload> {
    let value: Value = serde_json::from_str(extract_json(text)).ok()?;
    let object = value.as_object()?;
    if !KNOWN_KEYS.iter().any(|key| object.contains_key(*key)) {
        return None;
    }

    Some(ModelPayload {
        title_zh: string_field(object, "title_zh"),
        summary_zh: string_field(object, "summary_zh"),
        comment: string_field(object, "one_sentence_comment"),
        score: object.get("score").and_then(coerce_score).unwrap_or(DEFAULT_SCORE),
        tags: object.get("tags").map(coerce_tags).unwrap_or_default(),
        category: object
            .get("category")
            .and_then(Value::as_str)
            .map(Category::normalize)
            .unwrap_or_default(),
    })
}

fn string_field(object: &Map<String, Value>, key: &str) -> Option<String> {
    object
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// 分数转成 1..=10 的整数；无法识别时返回 None
pub fn coerce_score(value: &Value) -> Option<u8> {
    let raw = match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64))?,
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f.round() as i64))?
        }
        _ => return None,
    };
    Some(raw.clamp(1, 10) as u8)
}

fn coerce_tags(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .filter(|s| !s.is_empty())
            .take(MAX_TAGS)
            .collect(),
        Value::String(s) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    }
}
