//! Recovers tool-call ids from an LLM span's `ai.response.toolCalls` payload.

use crate::span::AttributeValue;
use serde_json::Value;

/// Parses a JSON array of tool-call objects and returns their `toolCallId`
/// strings in array order.
///
/// Anything unexpected (no value, a non-string value, invalid JSON, a
/// non-array document) yields an empty list. Entries without a string
/// `toolCallId` are skipped.
pub fn extract_tool_call_ids(raw: Option<&AttributeValue>) -> Vec<String> {
    let Some(AttributeValue::String(payload)) = raw else {
        return Vec::new();
    };

    match serde_json::from_str::<Value>(payload) {
        Ok(Value::Array(calls)) => calls
            .iter()
            .filter_map(|call| call.get("toolCallId")?.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}
