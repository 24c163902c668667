//! Attribute Mapping and Sanitization
//!
//! Translates the attribute conventions of the instrumented LLM runtime into
//! the collector's schema, then strips empty values before export.
//!
//! Two metadata conventions exist and are selected with [`MetadataConvention`]:
//!
//! - [`MetadataConvention::SessionId`] maps only
//!   `ai.telemetry.metadata.sessionId` onto [`SESSION_ID`].
//! - [`MetadataConvention::Aggregate`] folds every `ai.telemetry.metadata.*`
//!   attribute into one JSON-encoded [`METADATA`] attribute.
//!
//! Both conventions rename the span from `ai.telemetry.functionId`.

use crate::span::{AttributeValue, Span};
use serde_json::{Map, Value};

/// OpenInference role of a span (`"LLM"`, `"TOOL"`, ...).
pub const OPENINFERENCE_SPAN_KIND: &str = "openinference.span.kind";
/// JSON array of the tool calls an LLM turn produced.
pub const RESPONSE_TOOL_CALLS: &str = "ai.response.toolCalls";
/// Id of the tool invocation a TOOL span records.
pub const TOOL_CALL_ID: &str = "ai.toolCall.id";
/// Function id the runtime attaches to every span of an instrumented call.
pub const FUNCTION_ID: &str = "ai.telemetry.functionId";
/// Prefix of caller-supplied telemetry metadata.
pub const METADATA_PREFIX: &str = "ai.telemetry.metadata.";
/// Session id as supplied by the caller.
pub const RUNTIME_SESSION_ID: &str = "ai.telemetry.metadata.sessionId";
/// Session id in the collector's schema.
pub const SESSION_ID: &str = "freeplay.session.id";
/// Span id of the LLM span a TOOL span was linked to.
pub const PARENT_SPAN_ID: &str = "parent_span_id";
/// Aggregated metadata object (JSON string).
pub const METADATA: &str = "metadata";

/// How `ai.telemetry.metadata.*` attributes are carried into the export.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MetadataConvention {
    /// Map `ai.telemetry.metadata.sessionId` to `freeplay.session.id` and drop the source key.
    #[default]
    SessionId,
    /// Fold every `ai.telemetry.metadata.*` key into a JSON `metadata` attribute.
    Aggregate,
}

impl MetadataConvention {
    /// Attribute the exporter reads an LLM span's session id from.
    ///
    /// Under `Aggregate` the runtime key is kept on the span, so it is read
    /// directly; otherwise it has already been mapped to [`SESSION_ID`].
    pub fn session_source_key(self) -> &'static str {
        match self {
            Self::SessionId => SESSION_ID,
            Self::Aggregate => RUNTIME_SESSION_ID,
        }
    }
}

/// Rewrites runtime attribute keys into the collector's conventions, in place.
///
/// Never fails: a missing or malformed value turns the corresponding rule into
/// a no-op.
pub fn map_attributes(span: &mut Span, convention: MetadataConvention) {
    match convention {
        MetadataConvention::SessionId => map_session_id(span),
        MetadataConvention::Aggregate => aggregate_metadata(span),
    }
    map_function_id(span);
}

fn map_session_id(span: &mut Span) {
    let Some(raw) = span.attributes.remove(RUNTIME_SESSION_ID) else {
        return;
    };
    let Some(session_id) = raw.coerce_to_string() else {
        return;
    };
    let session_id = session_id.trim();
    if !session_id.is_empty() {
        span.fill_attribute(SESSION_ID, session_id);
    }
}

fn aggregate_metadata(span: &mut Span) {
    let metadata: Map<String, Value> = span
        .attributes
        .iter()
        .filter_map(|(key, value)| {
            let field = key.strip_prefix(METADATA_PREFIX)?;
            Some((field.to_string(), attribute_to_json(value)))
        })
        .collect();

    if metadata.is_empty() {
        return;
    }

    // A Map of plain values always serializes
    if let Ok(encoded) = serde_json::to_string(&metadata) {
        span.set_attribute(METADATA, encoded);
    }
}

fn attribute_to_json(value: &AttributeValue) -> Value {
    match value {
        AttributeValue::Null => Value::Null,
        AttributeValue::String(s) => Value::String(s.clone()),
        AttributeValue::Int(i) => Value::from(*i),
        AttributeValue::Float(f) => Value::from(*f),
        AttributeValue::Bool(b) => Value::Bool(*b),
        AttributeValue::Array(items) => {
            Value::Array(items.iter().cloned().map(Value::String).collect())
        }
    }
}

fn map_function_id(span: &mut Span) {
    let Some(raw) = span.attributes.remove(FUNCTION_ID) else {
        return;
    };
    if let Some(function_id) = raw.coerce_to_string() {
        let function_id = function_id.trim();
        if !function_id.is_empty() {
            span.name = function_id.to_string();
        }
    }
}

/// Drops `Null` and empty-string attributes. Idempotent.
pub fn sanitize_attributes(span: &mut Span) {
    span.attributes.retain(|_, value| !value.is_empty());
}
