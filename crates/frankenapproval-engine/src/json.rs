//! JSON rendering for structured payloads.
//!
//! Objects keep insertion order unless sorting is requested, in which case
//! keys are sorted at every depth. Array order is always preserved.

use frankenapproval_core::error::{ApprovalError, ApprovalResult};
use serde::Serialize;
use serde_json::{Map, Value};

pub const JSON_EXTENSION: &str = ".json";

const ENCODER: &str = "json";

/// Render `value` as two-space indented JSON.
///
/// # Errors
///
/// Returns `ApprovalError::InvalidPayload` if `value` cannot be represented as JSON
/// (for example a map with non-string keys).
pub fn render_json<T: Serialize + ?Sized>(value: &T, sort: bool) -> ApprovalResult<String> {
    let value = serde_json::to_value(value).map_err(invalid_payload)?;
    render_value(value, sort)
}

/// Parse JSON text, then render it like [`render_json`].
///
/// # Errors
///
/// Returns `ApprovalError::InvalidPayload` if `text` is not valid JSON.
pub fn render_json_str(text: &str, sort: bool) -> ApprovalResult<String> {
    let value: Value = serde_json::from_str(text).map_err(invalid_payload)?;
    render_value(value, sort)
}

fn render_value(value: Value, sort: bool) -> ApprovalResult<String> {
    let value = if sort { sort_keys(value) } else { value };
    serde_json::to_string_pretty(&value).map_err(invalid_payload)
}

fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.cmp(b));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(key, value)| (key, sort_keys(value)))
                    .collect::<Map<String, Value>>(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

fn invalid_payload(error: serde_json::Error) -> ApprovalError {
    ApprovalError::InvalidPayload {
        encoder: ENCODER,
        reason: error.to_string(),
    }
}
