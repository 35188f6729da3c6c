//! Tolerant JSON extraction from free-form model output.
//!
//! Attempts, in order:
//!   1. the interior of the first fenced code block (optionally tagged `json`),
//!   2. the slice from the first `{` to the last `}`,
//!   3. the whole text.
//!
//! Step 2 is a greedy slice, not a balanced-brace scanner: prose containing an
//! unrelated `{...}` before or after the real object yields an invalid slice
//! and the attempt fails. Callers rely on that failure mode.

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::util::truncate_chars;

/// How much of the raw model text is kept for diagnostics.
pub const RAW_PREFIX_CHARS: usize = 1000;

#[derive(Debug, Error)]
#[error("could not parse model response: {reason}")]
pub struct ResponseParseError {
    pub reason: String,
    /// At most `RAW_PREFIX_CHARS` characters of the original text.
    pub raw_prefix: String,
}

impl ResponseParseError {
    pub fn new(reason: impl Into<String>, raw: &str) -> Self {
        Self { reason: reason.into(), raw_prefix: truncate_chars(raw, RAW_PREFIX_CHARS) }
    }
}

pub fn extract_json(raw: &str) -> Result<Value, ResponseParseError> {
    if let Some(inner) = fenced_block(raw) {
        match serde_json::from_str(inner) {
            Ok(v) => return Ok(v),
            Err(e) => debug!(target: "provider", error = %e, "Fenced block is not JSON; trying brace slice"),
        }
    }

    if let Some(slice) = outer_braces(raw) {
        match serde_json::from_str(slice) {
            Ok(v) => return Ok(v),
            Err(e) => debug!(target: "provider", error = %e, "Brace slice is not JSON; trying whole text"),
        }
    }

    serde_json::from_str(raw.trim()).map_err(|e| ResponseParseError::new(format!("no JSON found ({})", e), raw))
}

/// Extract and deserialize into `T`. A shape mismatch is a parse error as well.
pub fn extract_as<T: DeserializeOwned>(raw: &str) -> Result<T, ResponseParseError> {
    let value = extract_json(raw)?;
    serde_json::from_value(value).map_err(|e| ResponseParseError::new(format!("unexpected JSON shape ({})", e), raw))
}

/// Interior of the first fenced code block, without a `json` tag.
pub(crate) fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after = &text[start + 3..];
    let body = after
        .strip_prefix("json")
        .or_else(|| after.strip_prefix("JSON"))
        .unwrap_or(after);
    let end = body.find("```")?;
    Some(body[..end].trim())
}

fn outer_braces(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if start < end { Some(&text[start..=end]) } else { None }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[test]
    fn fenced_json_block() {
        assert_eq!(extract_json("```json\n{\"a\":1}\n```").unwrap(), json!({"a": 1}));
    }

    #[test]
    fn untagged_fence_with_prose() {
        let raw = "Hier ist das Ergebnis:\n```\n{\"a\": [1, 2]}\n```\nViel Erfolg!";
        assert_eq!(extract_json(raw).unwrap(), json!({"a": [1, 2]}));
    }

    #[test]
    fn braces_inside_noise() {
        assert_eq!(extract_json("noise {\"a\":1} trailing").unwrap(), json!({"a": 1}));
    }

    #[test]
    fn plain_json_text() {
        assert_eq!(extract_json("  [1, 2, 3] ").unwrap(), json!([1, 2, 3]));
    }

    #[test]
    fn broken_fence_falls_back_to_braces() {
        let raw = "```python\nprint(1)\n``` und dann {\"ok\": true}";
        // The fence interior is not JSON, the greedy slice is.
        assert_eq!(extract_json(raw).unwrap(), json!({"ok": true}));
    }

    #[test]
    fn not_json_at_all() {
        let err = extract_json("not json at all").unwrap_err();
        assert_eq!(err.raw_prefix, "not json at all");
    }

    #[test]
    fn unrelated_braces_break_the_greedy_slice() {
        let raw = "{\"a\":1} und später noch {Mengenklammer}";
        assert!(extract_json(raw).is_err());
    }

    #[test]
    fn raw_prefix_is_bounded() {
        let raw = "ä".repeat(5000);
        let err = extract_json(&raw).unwrap_err();
        assert_eq!(err.raw_prefix.chars().count(), RAW_PREFIX_CHARS);
    }

    #[test]
    fn typed_extraction_rejects_wrong_shape() {
        #[derive(Deserialize, Debug)]
        struct Shape {
            #[allow(dead_code)]
            questions: Vec<u32>,
        }
        assert!(extract_as::<Shape>("{\"questions\": [1]}").is_ok());
        let err = extract_as::<Shape>("{\"fragen\": []}").unwrap_err();
        assert!(err.reason.contains("unexpected JSON shape"));
    }
}
