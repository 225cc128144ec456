//! Extraction of one structured JSON object from free-form model text.
//!
//! Models wrap their answers in markdown fences, prefix them with prose, or
//! return bare JSON. Every stage goes through [`extract_json_object`], which
//! tries, in order:
//!
//! 1. fenced blocks tagged `json`, then any other fenced block
//! 2. the whole trimmed text
//! 3. the first balanced `{ ... }` span, scanning past braces inside strings
//!
//! The first candidate that parses to a JSON object wins.

use serde_json::Value;
use thiserror::Error;

/// Errors from [`extract_json_object`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractError {
    #[error("response text is empty")]
    Empty,

    #[error("no JSON object found in response")]
    NotFound,

    #[error("expected a JSON object, found {0}")]
    NotAnObject(&'static str),

    #[error("invalid JSON: {0}")]
    Invalid(String),
}

/// Extract a single JSON object from model output.
pub fn extract_json_object(text: &str) -> Result<Value, ExtractError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ExtractError::Empty);
    }

    let mut first_failure: Option<ExtractError> = None;
    let mut note = |err: ExtractError| {
        if first_failure.is_none() {
            first_failure = Some(err);
        }
    };

    let blocks = fenced_blocks(trimmed);
    let tagged = blocks.iter().filter(|b| b.is_json);
    let untagged = blocks.iter().filter(|b| !b.is_json);
    for block in tagged.chain(untagged) {
        match parse_object(block.body) {
            Ok(value) => return Ok(value),
            Err(e) => note(e),
        }
    }

    match parse_object(trimmed) {
        Ok(value) => return Ok(value),
        Err(e @ ExtractError::NotAnObject(_)) if blocks.is_empty() => note(e),
        Err(_) => {}
    }

    let mut search_from = 0;
    while let Some(offset) = trimmed[search_from..].find('{') {
        let start = search_from + offset;
        match balanced_object_end(trimmed, start) {
            Some(end) => match parse_object(&trimmed[start..end]) {
                Ok(value) => return Ok(value),
                Err(e) => {
                    note(e);
                    search_from = start + 1;
                }
            },
            None => {
                note(ExtractError::Invalid(
                    "unterminated JSON object in response".to_string(),
                ));
                search_from = start + 1;
            }
        }
    }

    Err(first_failure.unwrap_or(ExtractError::NotFound))
}

fn parse_object(candidate: &str) -> Result<Value, ExtractError> {
    let candidate = candidate.trim();
    if candidate.is_empty() {
        return Err(ExtractError::NotFound);
    }
    match serde_json::from_str::<Value>(candidate) {
        Ok(Value::Object(map)) => Ok(Value::Object(map)),
        Ok(other) => Err(ExtractError::NotAnObject(json_kind(&other))),
        Err(e) => Err(ExtractError::Invalid(e.to_string())),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

struct FencedBlock<'a> {
    is_json: bool,
    body: &'a str,
}

/// Split out the bodies of ``` fenced blocks. An unclosed final fence runs
/// to the end of the text, which covers truncated responses.
fn fenced_blocks(text: &str) -> Vec<FencedBlock<'_>> {
    const FENCE: &str = "```";
    let mut blocks = Vec::new();
    let mut rest = text;

    while let Some(open) = rest.find(FENCE) {
        let after_open = &rest[open + FENCE.len()..];
        let (info, body_start) = match after_open.find('\n') {
            Some(nl) => (&after_open[..nl], nl + 1),
            None => (after_open, after_open.len()),
        };

        // An info string containing a brace is really inline content
        // such as ```{"a":1}```.
        let (is_json, body_from) = if info.contains('{') {
            (false, 0)
        } else {
            (info.trim().eq_ignore_ascii_case("json"), body_start)
        };

        let body_region = &after_open[body_from..];
        match body_region.find(FENCE) {
            Some(close) => {
                blocks.push(FencedBlock {
                    is_json,
                    body: &body_region[..close],
                });
                rest = &body_region[close + FENCE.len()..];
            }
            None => {
                blocks.push(FencedBlock {
                    is_json,
                    body: body_region,
                });
                break;
            }
        }
    }

    blocks
}

/// Byte index one past the `}` that closes the object opened at `start`.
fn balanced_object_end(text: &str, start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(start + i + 1);
                }
            }
            _ => {}
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_bare_object() {
        let value = extract_json_object(r#"{"qualityScore": 8}"#).unwrap();
        assert_eq!(value, json!({"qualityScore": 8}));
    }

    #[test]
    fn test_json_fence_with_prose() {
        let text = "Here is the analysis:\n```json\n{\"hazards\": []}\n```\nLet me know.";
        assert_eq!(extract_json_object(text).unwrap(), json!({"hazards": []}));
    }

    #[test]
    fn test_plain_fence() {
        let text = "```\n{\"a\": {\"b\": 1}}\n```";
        assert_eq!(extract_json_object(text).unwrap(), json!({"a": {"b": 1}}));
    }

    #[test]
    fn test_json_fence_preferred_over_earlier_plain_fence() {
        let text = "```\nnot json\n```\n```json\n{\"ok\": true}\n```";
        assert_eq!(extract_json_object(text).unwrap(), json!({"ok": true}));
    }

    #[test]
    fn test_unclosed_fence() {
        let text = "```json\n{\"truncated\": false}";
        assert_eq!(extract_json_object(text).unwrap(), json!({"truncated": false}));
    }

    #[test]
    fn test_inline_fence() {
        let text = "```{\"inline\": 1}```";
        assert_eq!(extract_json_object(text).unwrap(), json!({"inline": 1}));
    }

    #[test]
    fn test_object_embedded_in_prose() {
        let text = r#"Sure! The result is {"note": "use } carefully", "n": 2} as requested."#;
        assert_eq!(
            extract_json_object(text).unwrap(),
            json!({"note": "use } carefully", "n": 2})
        );
    }

    #[test]
    fn test_skips_non_json_braces() {
        let text = r#"Template {placeholder} then {"real": "object"}"#;
        assert_eq!(extract_json_object(text).unwrap(), json!({"real": "object"}));
    }

    #[test]
    fn test_empty_text() {
        assert_eq!(extract_json_object("   \n"), Err(ExtractError::Empty));
    }

    #[test]
    fn test_no_object() {
        assert_eq!(
            extract_json_object("I cannot help with that."),
            Err(ExtractError::NotFound)
        );
    }

    #[test]
    fn test_array_is_rejected() {
        assert_eq!(
            extract_json_object("[1, 2, 3]"),
            Err(ExtractError::NotAnObject("an array"))
        );
    }

    #[test]
    fn test_malformed_fenced_json_reports_invalid() {
        let result = extract_json_object("```json\n{\"a\": }\n```");
        assert!(matches!(result, Err(ExtractError::Invalid(_))));
    }

    #[test]
    fn test_unterminated_object() {
        let result = extract_json_object(r#"{"hazards": [{"name": "fall""#);
        assert!(matches!(result, Err(ExtractError::Invalid(_))));
    }

    #[test]
    fn test_unterminated_prose_brace_skips_to_later_object() {
        let result = extract_json_object(r#"Use {braces" carefully. {"ok": 1}"#).unwrap();
        assert_eq!(result, json!({"ok": 1}));
    }

    fn json_leaf() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            (-1000i64..1000).prop_map(|n| json!(n)),
            "[a-zA-Z0-9 {}\"\\\\]{0,12}".prop_map(Value::String),
        ]
    }

    fn json_object() -> impl Strategy<Value = Value> {
        let value = json_leaf().prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                prop::collection::btree_map("[a-z]{1,6}", inner, 0..4)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        });
        prop::collection::btree_map("[a-zA-Z]{1,8}", value, 0..5)
            .prop_map(|m| Value::Object(m.into_iter().collect()))
    }

    proptest! {
        #[test]
        fn prop_fenced_and_unfenced_agree(object in json_object(), pretty in any::<bool>()) {
            let body = if pretty {
                serde_json::to_string_pretty(&object).unwrap()
            } else {
                serde_json::to_string(&object).unwrap()
            };

            let bare = extract_json_object(&body).unwrap();
            let fenced_json = extract_json_object(&format!("```json\n{}\n```", body)).unwrap();
            let fenced_plain =
                extract_json_object(&format!("Result:\n```\n{}\n```\nDone.", body)).unwrap();

            prop_assert_eq!(&bare, &object);
            prop_assert_eq!(&fenced_json, &object);
            prop_assert_eq!(&fenced_plain, &object);
        }
    }
}
