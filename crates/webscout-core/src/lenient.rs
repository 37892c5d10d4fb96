//! Forgiving parsers for tool inputs.
//!
//! Tool inputs come from free model text, so every parser here accepts a
//! well-formed JSON shape, a loosely delimited text shape, and a bare scalar.
//! None of them fail: the last resort is the literal input. The returned
//! [`InputShape`] tells the caller which rung of that ladder was used.

use crate::tools::AnalyzeRequest;
use serde::Serialize;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InputShape {
    /// Parsed from JSON with the expected keys/types.
    Structured,
    /// Recovered from loosely delimited text (lists, lines, embedded URLs).
    Delimited,
    /// The raw input taken literally.
    Scalar,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lenient<T> {
    pub value: T,
    pub shape: InputShape,
}

impl<T> Lenient<T> {
    fn new(value: T, shape: InputShape) -> Self {
        Self { value, shape }
    }

    pub fn is_fallback(&self) -> bool {
        self.shape != InputShape::Structured
    }
}

fn url_regex() -> &'static regex::Regex {
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    RE.get_or_init(|| {
        regex::Regex::new(r#"(?i)https?://[^\s'"<>\[\]{},|`]+"#).expect("static url regex")
    })
}

/// Strip one layer of matching quotes/backticks and surrounding whitespace.
pub fn strip_quotes(s: &str) -> &str {
    let t = s.trim();
    for q in ['"', '\'', '`'] {
        if t.len() >= 2 && t.starts_with(q) && t.ends_with(q) {
            return t[1..t.len() - 1].trim();
        }
    }
    t
}

fn str_field<'a>(obj: &'a serde_json::Map<String, serde_json::Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|k| obj.get(*k).and_then(|v| v.as_str()))
}

fn string_list(v: &serde_json::Value) -> Option<Vec<String>> {
    match v {
        serde_json::Value::Array(items) => Some(
            items
                .iter()
                .filter_map(|x| match x {
                    serde_json::Value::String(s) => Some(s.clone()),
                    serde_json::Value::Null => None,
                    other => Some(other.to_string()),
                })
                .collect(),
        ),
        serde_json::Value::String(s) => Some(vec![s.clone()]),
        _ => None,
    }
}

/// A single free-text argument (search query, news topic).
pub fn parse_text(raw: &str) -> Lenient<String> {
    let trimmed = raw.trim();
    if let Ok(v) = serde_json::from_str::<serde_json::Value>(trimmed) {
        match &v {
            serde_json::Value::String(s) => {
                return Lenient::new(s.trim().to_string(), InputShape::Structured)
            }
            serde_json::Value::Object(obj) => {
                if let Some(s) = str_field(obj, &["query", "topic", "q", "text"]) {
                    return Lenient::new(s.trim().to_string(), InputShape::Structured);
                }
            }
            _ => {}
        }
    }
    for prefix in ["query:", "query=", "topic:", "topic="] {
        let Some(head) = trimmed.get(..prefix.len()) else {
            continue;
        };
        if trimmed.len() > prefix.len() && head.eq_ignore_ascii_case(prefix) {
            let rest = strip_quotes(&trimmed[prefix.len()..]);
            return Lenient::new(rest.to_string(), InputShape::Delimited);
        }
    }
    Lenient::new(strip_quotes(trimmed).to_string(), InputShape::Scalar)
}

fn urls_in(text: &str) -> Vec<String> {
    url_regex()
        .find_iter(text)
        .map(|m| {
            m.as_str()
                .trim_end_matches(['.', ')', ';', ':', '!', '?'])
                .to_string()
        })
        .filter(|u| !u.is_empty())
        .collect()
}

/// A list of URLs: JSON list, `{"url_list": [...]}`, python-ish/comma/newline
/// separated text, a bare URL, or free text that merely contains URLs.
pub fn parse_url_list(raw: &str) -> Lenient<Vec<String>> {
    let trimmed = raw.trim();
    if let Ok(v) = serde_json::from_str::<serde_json::Value>(trimmed) {
        let list = match &v {
            serde_json::Value::Array(_) => string_list(&v),
            serde_json::Value::Object(obj) => ["url_list", "urls", "links", "url"]
                .iter()
                .find_map(|k| obj.get(*k).and_then(string_list)),
            // A JSON-quoted string: recurse on its contents.
            serde_json::Value::String(s) => return parse_url_list(s),
            _ => None,
        };
        if let Some(list) = list {
            let list: Vec<String> = list
                .into_iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            return Lenient::new(list, InputShape::Structured);
        }
    }

    let found = urls_in(trimmed);
    if found.len() == 1 && strip_quotes(trimmed) == found[0] {
        return Lenient::new(found, InputShape::Scalar);
    }
    if !found.is_empty() {
        return Lenient::new(found, InputShape::Delimited);
    }
    if trimmed.is_empty() {
        return Lenient::new(Vec::new(), InputShape::Scalar);
    }
    Lenient::new(vec![strip_quotes(trimmed).to_string()], InputShape::Scalar)
}

/// `{"query": ..., "contents": [...]}`, or the line-oriented fallback where
/// the first line is the query and the remainder is the content.
pub fn parse_analyze_input(raw: &str) -> Lenient<AnalyzeRequest> {
    let trimmed = raw.trim();
    if let Ok(serde_json::Value::Object(obj)) = serde_json::from_str::<serde_json::Value>(trimmed) {
        let query = str_field(&obj, &["query", "q", "question"]);
        let contents = ["contents", "content", "texts", "text"]
            .iter()
            .find_map(|k| obj.get(*k).and_then(string_list));
        if let (Some(query), Some(contents)) = (query, contents) {
            return Lenient::new(
                AnalyzeRequest {
                    query: query.trim().to_string(),
                    contents,
                },
                InputShape::Structured,
            );
        }
    }

    let (first, rest) = match trimmed.split_once('\n') {
        Some((a, b)) => (a, b.trim()),
        None => (trimmed, ""),
    };
    let query = strip_quotes(first).to_string();
    if rest.is_empty() {
        return Lenient::new(
            AnalyzeRequest {
                query,
                contents: Vec::new(),
            },
            InputShape::Scalar,
        );
    }
    let contents = match serde_json::from_str::<serde_json::Value>(rest) {
        Ok(v @ serde_json::Value::Array(_)) => string_list(&v).unwrap_or_default(),
        _ => vec![rest.to_string()],
    };
    Lenient::new(AnalyzeRequest { query, contents }, InputShape::Delimited)
}
