//! Parser for legacy repr-style tool-call payloads.
//!
//! Older thread records store tool invocations as a stringified repr such as
//! `Search(query='cats', limit='5'), Search(query="dogs")`. [`parse_tool_calls`]
//! recovers `{type, attributes}` records from that text.
//!
//! Segmentation splits on `, <type>` where `<type>` is the name before the
//! first `(`, so every record in one string is assumed to share that name.
//! A string mixing several tool names is mis-segmented rather than rejected;
//! persisted records depend on this behavior.

use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::LazyLock;

static SINGLE_QUOTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([a-z_]+)='([^']*)'").expect("valid regex"));

static DOUBLE_QUOTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"([a-z_]+)="([^"]*)""#).expect("valid regex"));

/// A repr-style payload: optional `[`, then an identifier directly followed by `(`.
static REPR_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[?[A-Za-z_][A-Za-z0-9_]*\(").expect("valid regex"));

/// One decoded tool call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StructuredToolCall {
    #[serde(rename = "type")]
    pub tool_type: String,
    pub attributes: BTreeMap<String, String>,
}

/// Parse a repr-style payload into one record per segment.
pub fn parse_tool_calls(input: &str) -> Vec<StructuredToolCall> {
    let body = strip_enclosing_brackets(input);
    let tool_type = body.split('(').next().unwrap_or_default();
    let separator = format!(", {}", tool_type);

    body.split(separator.as_str())
        .map(|segment| StructuredToolCall {
            tool_type: tool_type.to_string(),
            attributes: extract_attributes(segment),
        })
        .collect()
}

/// True when `text` looks like a repr-style payload worth handing to [`parse_tool_calls`].
pub fn looks_like_repr(text: &str) -> bool {
    REPR_PREFIX.is_match(text.trim_start())
}

fn strip_enclosing_brackets(input: &str) -> &str {
    input
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .unwrap_or(input)
}

fn extract_attributes(segment: &str) -> BTreeMap<String, String> {
    let mut attributes = BTreeMap::new();
    for re in [&*SINGLE_QUOTED, &*DOUBLE_QUOTED] {
        for caps in re.captures_iter(segment) {
            attributes.insert(caps[1].to_string(), caps[2].to_string());
        }
    }
    attributes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_single_record() {
        let calls = parse_tool_calls("Search(query='cats', limit='5')");
        assert_eq!(
            calls,
            vec![StructuredToolCall {
                tool_type: "Search".into(),
                attributes: attrs(&[("query", "cats"), ("limit", "5")]),
            }]
        );
    }

    #[test]
    fn test_bracketed_input_is_unwrapped() {
        let calls = parse_tool_calls("[Search(query='x')]");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].tool_type, "Search");
        assert_eq!(calls[0].attributes, attrs(&[("query", "x")]));
    }

    #[test]
    fn test_multiple_records_of_same_type() {
        let calls = parse_tool_calls("[Email(to='a@b.c', subject=\"Hi\"), Email(to='d@e.f')]");
        assert_eq!(calls.len(), 2);
        assert_eq!(
            calls[0].attributes,
            attrs(&[("to", "a@b.c"), ("subject", "Hi")])
        );
        assert_eq!(calls[1].tool_type, "Email");
        assert_eq!(calls[1].attributes, attrs(&[("to", "d@e.f")]));
    }

    #[test]
    fn test_double_quoted_value_wins() {
        let calls = parse_tool_calls(r#"Note(text='single', text="double")"#);
        assert_eq!(calls[0].attributes["text"], "double");
    }

    #[test]
    fn test_double_quotes_allow_apostrophes() {
        let calls = parse_tool_calls(r#"Note(text="it's here")"#);
        assert_eq!(calls[0].attributes["text"], "it's here");
    }

    #[test]
    fn test_mixed_types_stay_in_first_segment() {
        let calls = parse_tool_calls("Search(query='a'), Fetch(url='b')");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].tool_type, "Search");
        assert_eq!(calls[0].attributes, attrs(&[("query", "a"), ("url", "b")]));
    }

    #[test]
    fn test_keys_with_digits_are_ignored() {
        let calls = parse_tool_calls("Search(q1='a', page_size='10')");
        assert_eq!(calls[0].attributes, attrs(&[("page_size", "10")]));
    }

    #[test]
    fn test_looks_like_repr() {
        assert!(looks_like_repr("Search(query='x')"));
        assert!(looks_like_repr("  [Search(query='x')]"));
        assert!(!looks_like_repr("Hello (world)"));
        assert!(!looks_like_repr("plain text"));
    }

    #[test]
    fn test_serializes_type_field() {
        let calls = parse_tool_calls("Search(query='x')");
        let json = serde_json::to_value(&calls[0]).unwrap();
        assert_eq!(json["type"], "Search");
        assert_eq!(json["attributes"]["query"], "x");
    }
}
