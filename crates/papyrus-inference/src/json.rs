//! Lenient JSON extraction from model output.
//!
//! Models frequently wrap the requested JSON in prose or a fenced code
//! block. These helpers recover the object without failing the task.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

static FENCED_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").expect("valid regex"));

/// Extract the first JSON object found in `text`.
///
/// Tries, in order: the whole text, a fenced code block, and the span
/// between the first `{` and the last `}`.
pub fn extract_json_object(text: &str) -> Option<JsonValue> {
    let trimmed = text.trim();

    if let Ok(value @ JsonValue::Object(_)) = serde_json::from_str::<JsonValue>(trimmed) {
        return Some(value);
    }

    if let Some(block) = FENCED_BLOCK.captures(trimmed).and_then(|c| c.get(1)) {
        if let Ok(value @ JsonValue::Object(_)) = serde_json::from_str::<JsonValue>(block.as_str())
        {
            return Some(value);
        }
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str::<JsonValue>(&trimmed[start..=end]) {
        Ok(value @ JsonValue::Object(_)) => Some(value),
        _ => None,
    }
}

/// Extract a JSON object from `text` and deserialize it into `T`.
pub fn parse_json_as<T: DeserializeOwned>(text: &str) -> Option<T> {
    extract_json_object(text).and_then(|value| serde_json::from_value(value).ok())
}

/// Read a string array field, skipping non-string items.
pub(crate) fn string_list(value: &JsonValue, key: &str) -> Vec<String> {
    value
        .get(key)
        .and_then(JsonValue::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(JsonValue::as_str)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// Read a non-empty string field.
pub(crate) fn string_field(value: &JsonValue, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(JsonValue::as_str)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
