// SPDX-License-Identifier: MIT

//! Tolerant decoding of search-query lists from model output
//!
//! Models are asked for `{"queries": [...]}` but answer with fenced JSON,
//! Python literals, prose with a bracketed list, or nothing usable at all.
//! [`parse`] tries strict decoding before lossy heuristics and never fails.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;

static FENCE_OPEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^```(?:json|python)?[ \t]*\r?\n?").expect("fence pattern is valid")
});

static FENCE_CLOSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\r?\n?[ \t]*```$").expect("fence pattern is valid"));

static BRACKETED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\[(.*?)\]").expect("bracket pattern is valid"));

static LIST_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:[-*•]+|\d+[.)])\s*").expect("list marker pattern is valid"));

const QUOTES: &[char] = &['"', '\'', '`'];

/// Which stage of the cascade produced the batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseStrategy {
    Json,
    Literal,
    Brackets,
    RawText,
}

/// Search queries decoded from one model response
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryBatch {
    pub queries: Vec<String>,
    /// Cleaned response text, kept only when nothing structured was found
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_text: Option<String>,
    #[serde(skip)]
    pub strategy: ParseStrategy,
}

impl QueryBatch {
    fn structured(queries: Vec<String>, strategy: ParseStrategy) -> Self {
        Self {
            queries,
            raw_text: None,
            strategy,
        }
    }

    /// Queries to search for: the parsed list, or each usable line of the raw text
    pub fn candidates(&self) -> Vec<String> {
        if !self.queries.is_empty() {
            return self.queries.clone();
        }
        self.raw_text
            .as_deref()
            .unwrap_or_default()
            .lines()
            .map(|line| {
                let line = line.trim();
                LIST_MARKER
                    .replace(line, "")
                    .trim()
                    .trim_matches(QUOTES)
                    .trim()
                    .to_string()
            })
            .filter(|line| !line.is_empty())
            .collect()
    }
}

/// Decode a query list from raw model text
pub fn parse(raw: &str) -> QueryBatch {
    let cleaned = strip_fences(raw);

    if let Some(queries) = serde_json::from_str::<Value>(&cleaned)
        .ok()
        .and_then(|v| queries_from_value(&v))
    {
        return QueryBatch::structured(queries, ParseStrategy::Json);
    }

    if let Some(queries) = serde_json::from_str::<Value>(&literal_to_json(&cleaned))
        .ok()
        .and_then(|v| queries_from_value(&v))
    {
        log::debug!("Query list decoded as a permissive literal");
        return QueryBatch::structured(queries, ParseStrategy::Literal);
    }

    if let Some(queries) = bracketed_items(&cleaned) {
        log::debug!("Query list recovered from the first bracketed span");
        return QueryBatch::structured(queries, ParseStrategy::Brackets);
    }

    log::warn!("No query list found in model output; keeping raw text");
    QueryBatch {
        queries: Vec::new(),
        raw_text: Some(cleaned),
        strategy: ParseStrategy::RawText,
    }
}

/// Trim, then drop a leading and trailing code fence
fn strip_fences(raw: &str) -> String {
    let trimmed = raw.trim();
    let opened = FENCE_OPEN.replace(trimmed, "");
    FENCE_CLOSE.replace(&opened, "").trim().to_string()
}

/// Accepts `{"queries": [...]}` or a bare list, of strings or `{"query": ..}` objects
fn queries_from_value(value: &Value) -> Option<Vec<String>> {
    let items = match value {
        Value::Object(obj) => obj.get("queries")?.as_array()?,
        Value::Array(items) => items,
        _ => return None,
    };

    let mut queries = Vec::with_capacity(items.len());
    for item in items {
        let text = match item {
            Value::String(s) => s.as_str(),
            Value::Object(obj) => obj.get("query")?.as_str()?,
            _ => return None,
        };
        let text = text.trim();
        if !text.is_empty() {
            queries.push(text.to_string());
        }
    }
    Some(queries)
}

/// Rewrite near-JSON (Python literals, single quotes, trailing commas) as JSON
fn literal_to_json(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len() + 8);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\'' | '"' => {
                let quote = c;
                out.push('"');
                i += 1;
                while i < chars.len() && chars[i] != quote {
                    match chars[i] {
                        '\\' if i + 1 < chars.len() => {
                            let next = chars[i + 1];
                            if next == '\'' {
                                out.push('\'');
                            } else {
                                out.push('\\');
                                out.push(next);
                            }
                            i += 1;
                        }
                        '"' => out.push_str("\\\""),
                        '\n' => out.push_str("\\n"),
                        '\t' => out.push_str("\\t"),
                        other => out.push(other),
                    }
                    i += 1;
                }
                out.push('"');
            }
            ',' => {
                let next = chars[i + 1..].iter().copied().find(|c| !c.is_whitespace());
                if !matches!(next, Some(']') | Some('}')) {
                    out.push(',');
                }
            }
            c if c.is_alphabetic() => {
                let start = i;
                while i + 1 < chars.len()
                    && (chars[i + 1].is_alphanumeric() || chars[i + 1] == '_')
                {
                    i += 1;
                }
                let word: String = chars[start..=i].iter().collect();
                out.push_str(match word.as_str() {
                    "True" => "true",
                    "False" => "false",
                    "None" => "null",
                    other => other,
                });
            }
            other => out.push(other),
        }
        i += 1;
    }
    out
}

/// Items of the first `[...]` span, unquoted; `None` if there are none
fn bracketed_items(text: &str) -> Option<Vec<String>> {
    let inner = BRACKETED.captures(text)?.get(1)?.as_str();
    let items: Vec<String> = inner
        .split(',')
        .map(|piece| piece.trim().trim_matches(QUOTES).trim().to_string())
        .filter(|piece| !piece.is_empty())
        .collect();
    if items.is_empty() {
        None
    } else {
        Some(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fenced_json() {
        let batch = parse("```json\n{\"queries\":[\"a\",\"b\"]}\n```");
        assert_eq!(batch.queries, vec!["a", "b"]);
        assert_eq!(batch.raw_text, None);
        assert_eq!(batch.strategy, ParseStrategy::Json);
    }

    #[test]
    fn test_plain_json_object() {
        let batch = parse(r#"  {"queries": ["eu hicp september", "ecb rate decision"]}  "#);
        assert_eq!(batch.queries, vec!["eu hicp september", "ecb rate decision"]);
        assert_eq!(batch.strategy, ParseStrategy::Json);
    }

    #[test]
    fn test_python_literal() {
        let batch = parse("```python\n{'queries': ['core inflation', \"energy prices\",], 'done': True}\n```");
        assert_eq!(batch.queries, vec!["core inflation", "energy prices"]);
        assert_eq!(batch.strategy, ParseStrategy::Literal);
    }

    #[test]
    fn test_literal_with_escaped_quote() {
        let batch = parse(r#"{'queries': ['ECB\'s outlook', 'say "hi"']}"#);
        assert_eq!(batch.queries, vec!["ECB's outlook", "say \"hi\""]);
        assert_eq!(batch.strategy, ParseStrategy::Literal);
    }

    #[test]
    fn test_malformed_falls_through_to_brackets() {
        let batch = parse("queries: [\"x\", 'y']");
        assert_eq!(batch.queries, vec!["x", "y"]);
        assert_eq!(batch.raw_text, None);
        assert_eq!(batch.strategy, ParseStrategy::Brackets);
    }

    #[test]
    fn test_no_brackets_keeps_raw_text() {
        let batch = parse("no brackets here");
        assert!(batch.queries.is_empty());
        assert_eq!(batch.raw_text.as_deref(), Some("no brackets here"));
        assert_eq!(batch.strategy, ParseStrategy::RawText);
    }

    #[test]
    fn test_array_of_query_objects() {
        let raw = r#"[
            {"query": "eurostat flash estimate", "url": "https://ec.europa.eu"},
            {"query": "ecb monetary policy statement"}
        ]"#;
        let batch = parse(raw);
        assert_eq!(
            batch.queries,
            vec!["eurostat flash estimate", "ecb monetary policy statement"]
        );
        assert_eq!(batch.strategy, ParseStrategy::Json);
    }

    #[test]
    fn test_non_string_queries_are_not_structured() {
        let batch = parse(r#"{"queries": [1, 2]}"#);
        // Strict and literal reject it; brackets recover the raw items
        assert_eq!(batch.strategy, ParseStrategy::Brackets);
        assert_eq!(batch.queries, vec!["1", "2"]);
    }

    #[test]
    fn test_empty_brackets_fall_through() {
        let batch = parse("Here you go: [ ] sorry");
        assert!(batch.queries.is_empty());
        assert_eq!(batch.strategy, ParseStrategy::RawText);
    }

    #[test]
    fn test_never_panics_on_odd_input() {
        for raw in ["", "```", "``````", "[", "]", "{'", "'", "\\", "[\"unterminated", "é[ü]"] {
            let batch = parse(raw);
            assert!(batch.queries.iter().all(|q| !q.is_empty()));
        }
    }

    #[test]
    fn test_candidates_fall_back_to_lines() {
        let batch = parse("Here are some searches\n1. eu inflation 2024\n- \"ecb rates\"\n\n* wage growth");
        assert_eq!(
            batch.candidates(),
            vec![
                "Here are some searches",
                "eu inflation 2024",
                "ecb rates",
                "wage growth"
            ]
        );
    }

    #[test]
    fn test_candidates_prefer_queries() {
        let batch = parse(r#"{"queries": ["only this"]}"#);
        assert_eq!(batch.candidates(), vec!["only this"]);
    }

    #[test]
    fn test_literal_to_json_drops_trailing_commas() {
        assert_eq!(literal_to_json("['a', 'b',]"), r#"["a", "b"]"#);
        assert_eq!(literal_to_json("{'k': None,}"), r#"{"k": null}"#);
    }
}
