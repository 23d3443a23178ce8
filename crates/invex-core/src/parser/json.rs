//! JSON-shaped model output.
//!
//! Models wrap JSON in code fences, embed it in prose, emit arrays or
//! use single-quoted pseudo-JSON. Every candidate span is tried in order;
//! the first that decodes to an object with a recognized field is used.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};

use crate::models::field::FieldSpec;

lazy_static! {
    static ref CODE_FENCE: Regex = Regex::new(r"(?s)```[A-Za-z]*[ \t]*\r?\n?(.*?)```").unwrap();
}

/// Scalar values found for each field, aligned with `specs`.
///
/// Returns `None` unless some candidate decodes to an object holding at
/// least one recognized field.
pub(crate) fn extract(text: &str, specs: &[FieldSpec], lenient: bool) -> Option<Vec<Option<String>>> {
    candidates(text, lenient).into_iter().find_map(|candidate| {
        let value = decode(candidate, lenient)?;
        let object = root_object(&value)?;
        let values: Vec<Option<String>> = specs.iter().map(|spec| find_value(object, spec)).collect();
        values.iter().any(Option::is_some).then_some(values)
    })
}

/// Whole text first, then fenced blocks, then balanced spans.
fn candidates(text: &str, lenient: bool) -> Vec<&str> {
    let mut found = vec![text.trim()];

    for caps in CODE_FENCE.captures_iter(text) {
        if let Some(body) = caps.get(1) {
            found.push(body.as_str().trim());
        }
    }

    let bytes = text.as_bytes();
    let mut start = 0;
    while start < bytes.len() {
        if matches!(bytes[start], b'{' | b'[') {
            if let Some(end) = balanced_end(text, start, lenient) {
                found.push(&text[start..end]);
                start = end;
                continue;
            }
        }
        start += 1;
    }

    found.retain(|c| c.starts_with('{') || c.starts_with('['));
    found.dedup();
    found
}

/// End (exclusive) of the bracketed span opening at `start`.
fn balanced_end(text: &str, start: usize, lenient: bool) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }

        match c {
            '"' => quote = Some('"'),
            '\'' if lenient => quote = Some('\''),
            '{' | '[' => depth += 1,
            '}' | ']' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(start + offset + 1);
                }
            }
            _ => {}
        }
    }

    None
}

fn decode(candidate: &str, lenient: bool) -> Option<Value> {
    match serde_json::from_str(candidate) {
        Ok(value) => Some(value),
        Err(_) if lenient => serde_json::from_str(&relax(candidate)).ok(),
        Err(_) => None,
    }
}

/// Rewrite pseudo-JSON into JSON: single-quoted strings become double
/// quoted, `None`/`True`/`False` become JSON literals and trailing
/// commas are dropped.
fn relax(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '"' => {
                out.push(c);
                i += 1;
                while i < chars.len() {
                    let c = chars[i];
                    out.push(c);
                    i += 1;
                    if c == '\\' && i < chars.len() {
                        out.push(chars[i]);
                        i += 1;
                    } else if c == '"' {
                        break;
                    }
                }
            }
            '\'' => {
                out.push('"');
                i += 1;
                while i < chars.len() && chars[i] != '\'' {
                    match chars[i] {
                        '\\' if chars.get(i + 1) == Some(&'\'') => {
                            out.push('\'');
                            i += 1;
                        }
                        '"' => out.push_str("\\\""),
                        other => out.push(other),
                    }
                    i += 1;
                }
                out.push('"');
                i += 1;
            }
            ',' => {
                let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
                if !matches!(next, Some('}') | Some(']')) {
                    out.push(c);
                }
                i += 1;
            }
            c if c.is_ascii_alphabetic() => {
                let word_end = chars[i..]
                    .iter()
                    .position(|c| !c.is_ascii_alphanumeric() && *c != '_')
                    .map_or(chars.len(), |p| i + p);
                let word: String = chars[i..word_end].iter().collect();
                match word.as_str() {
                    "None" => out.push_str("null"),
                    "True" => out.push_str("true"),
                    "False" => out.push_str("false"),
                    _ => out.push_str(&word),
                }
                i = word_end;
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }

    out
}

/// The object to search: the value itself, or the first object in an array.
fn root_object(value: &Value) -> Option<&Map<String, Value>> {
    match value {
        Value::Object(map) => Some(map),
        Value::Array(items) => items.iter().find_map(Value::as_object),
        _ => None,
    }
}

/// Depth-first search in document order for a key naming the field.
fn find_value(map: &Map<String, Value>, spec: &FieldSpec) -> Option<String> {
    for (key, value) in map {
        if spec.matches_label(key) {
            if let Some(raw) = scalar(value) {
                return Some(raw);
            }
        }

        let nested = match value {
            Value::Object(inner) => find_value(inner, spec),
            Value::Array(items) => items
                .iter()
                .filter_map(Value::as_object)
                .find_map(|inner| find_value(inner, spec)),
            _ => None,
        };
        if nested.is_some() {
            return nested;
        }
    }

    None
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn specs() -> Vec<FieldSpec> {
        vec![FieldSpec::work_order(), FieldSpec::total()]
    }

    fn values(text: &str) -> Option<Vec<Option<String>>> {
        extract(text, &specs(), true)
    }

    fn some(a: &str, b: &str) -> Option<Vec<Option<String>>> {
        Some(vec![Some(a.to_string()), Some(b.to_string())])
    }

    #[test]
    fn test_strict_object() {
        assert_eq!(
            values(r#"{"work_order": "5A-221", "total": "2000"}"#),
            some("5A-221", "2000")
        );
        assert_eq!(
            values(r#"{"Work Order Number": "00123", "Total Cost": 1234.56}"#),
            some("00123", "1234.56")
        );
    }

    #[test]
    fn test_fenced_and_embedded() {
        let fenced = "Here you go:\n```json\n{\"work_order\": \"00123\", \"total\": \"$5.00\"}\n```\nDone.";
        assert_eq!(values(fenced), some("00123", "$5.00"));

        let embedded = "The fields are {\"work_order\": \"00123\", \"total\": 12} as requested.";
        assert_eq!(values(embedded), some("00123", "12"));
    }

    #[test]
    fn test_single_quoted_pseudo_json() {
        let text = "{'work_order': '00123', 'total': '$1,234.56', 'paid': True, 'note': None,}";
        assert_eq!(values(text), some("00123", "$1,234.56"));
        assert_eq!(extract(text, &specs(), false), None);
    }

    #[test]
    fn test_array_first_object_wins() {
        let text = r#"[{"work_order": "11111", "total": 1}, {"work_order": "22222", "total": 2}]"#;
        assert_eq!(values(text), some("11111", "1"));
    }

    #[test]
    fn test_nested_objects() {
        let text = r#"{"invoice": {"details": {"work_order": "00123"}, "summary": {"total": 99.5}}}"#;
        assert_eq!(values(text), some("00123", "99.5"));

        let text = r#"{"total": {"amount": 12.5, "currency": "USD"}, "wo": "12345"}"#;
        assert_eq!(values(text), some("12345", "12.5"));
    }

    #[test]
    fn test_partial_and_unrecognized() {
        assert_eq!(
            values(r#"{"work_order": "00123", "total": null}"#),
            Some(vec![Some("00123".to_string()), None])
        );
        assert_eq!(values(r#"{"vendor": "ACME"}"#), None);
        assert_eq!(values("Work Order Number: 00123"), None);
        assert_eq!(values("{ not json at all"), None);
    }

    #[test]
    fn test_relax() {
        assert_eq!(relax("{'a': 'say \"hi\"'}"), r#"{"a": "say \"hi\""}"#);
        assert_eq!(relax(r#"{"a": "it's", }"#), r#"{"a": "it's" }"#);
        assert_eq!(relax("[True, False, None]"), "[true, false, null]");
    }
}
