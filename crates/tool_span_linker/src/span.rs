use crate::attributes::OPENINFERENCE_SPAN_KIND;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::SystemTime;

/// Represents a single finished distributed tracing span.
///
/// Spans are handed to the pipeline by value, so every hook that rewrites a
/// span's name or attributes takes `&mut Span` and the capability shows up in
/// its signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    /// Unique trace identifier (128-bit)
    pub trace_id: u128,
    /// Unique span identifier (64-bit, 0 is invalid)
    pub span_id: u64,
    /// Parent span identifier (0 if root span)
    pub parent_span_id: u64,
    /// Span start time (Unix nanoseconds)
    pub start_time: u64,
    /// Span end time (Unix nanoseconds)
    pub end_time: u64,
    /// Display name
    pub name: String,
    /// Span attributes (boxed to keep Span size manageable)
    pub attributes: Box<HashMap<String, AttributeValue>>,
    /// Span status
    pub status: SpanStatus,
    /// Span kind
    pub kind: SpanKind,
}

/// Attribute value types for span metadata.
///
/// `Null` stands in for the null/undefined values the instrumented runtime
/// emits; the sanitizer strips it before export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Null,
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Array(Vec<String>),
}

impl AttributeValue {
    /// Returns the inner string for `String` values.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Renders the value as a string the way the runtime's string coercion
    /// does. `Null` has no string form.
    pub fn coerce_to_string(&self) -> Option<String> {
        match self {
            Self::Null => None,
            Self::String(s) => Some(s.clone()),
            Self::Int(i) => Some(i.to_string()),
            Self::Float(f) => Some(f.to_string()),
            Self::Bool(b) => Some(b.to_string()),
            Self::Array(items) => Some(items.join(",")),
        }
    }

    /// True for `Null` and the empty string.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Null => true,
            Self::String(s) => s.is_empty(),
            _ => false,
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Span execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpanStatus {
    /// Span completed successfully
    Ok,
    /// Span completed with error
    Error,
    /// Span status unknown
    Unset,
}

/// Span kind as defined by OpenTelemetry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpanKind {
    /// Internal operation span
    Internal,
    /// Server-side RPC span
    Server,
    /// Client-side RPC span
    Client,
    /// Producer span (messaging)
    Producer,
    /// Consumer span (messaging)
    Consumer,
}

/// Role of a span in an LLM application, read from `openinference.span.kind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenInferenceKind {
    /// A model invocation turn.
    Llm,
    /// A tool/function call made on behalf of a model turn.
    Tool,
    /// Anything else, including spans without the attribute.
    Other,
}

impl fmt::Display for OpenInferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Llm => f.write_str("LLM"),
            Self::Tool => f.write_str("TOOL"),
            Self::Other => f.write_str("OTHER"),
        }
    }
}

/// Batch of spans for export
#[derive(Debug, Clone)]
pub struct SpanBatch {
    /// All spans in this batch
    pub spans: Vec<Span>,
    /// Batch creation timestamp
    pub timestamp: SystemTime,
}

fn unix_nanos() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map_or(0, |d| d.as_nanos() as u64)
}

impl Span {
    /// Creates a new span with the given parameters
    pub fn new(
        trace_id: u128,
        span_id: u64,
        parent_span_id: u64,
        name: String,
        kind: SpanKind,
    ) -> Self {
        let now = unix_nanos();

        Self {
            trace_id,
            span_id,
            parent_span_id,
            start_time: now,
            end_time: now,
            name,
            attributes: Box::new(HashMap::new()),
            status: SpanStatus::Unset,
            kind,
        }
    }

    /// Marks the span as completed with the given status
    pub fn finish(&mut self, status: SpanStatus) {
        self.end_time = unix_nanos();
        self.status = status;
    }

    /// Adds an attribute to the span
    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<AttributeValue>) {
        self.attributes.insert(key.into(), value.into());
    }

    /// Builder-style variant of [`Span::set_attribute`].
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.set_attribute(key, value);
        self
    }

    /// Looks up an attribute by key.
    pub fn attribute(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.get(key)
    }

    /// Looks up a string attribute by key.
    pub fn string_attribute(&self, key: &str) -> Option<&str> {
        self.attribute(key).and_then(AttributeValue::as_str)
    }

    /// Sets `key` only when it is absent, `Null` or the empty string.
    ///
    /// Returns `true` if the value was written.
    pub fn fill_attribute(&mut self, key: &str, value: impl Into<AttributeValue>) -> bool {
        if self.attribute(key).is_some_and(|v| !v.is_empty()) {
            return false;
        }
        self.attributes.insert(key.to_string(), value.into());
        true
    }

    /// Classifies the span by its `openinference.span.kind` attribute.
    pub fn openinference_kind(&self) -> OpenInferenceKind {
        match self.string_attribute(OPENINFERENCE_SPAN_KIND) {
            Some("LLM") => OpenInferenceKind::Llm,
            Some("TOOL") => OpenInferenceKind::Tool,
            _ => OpenInferenceKind::Other,
        }
    }

    /// Span id in the 16-digit lowercase hex form used on the wire.
    pub fn span_id_hex(&self) -> String {
        format!("{:016x}", self.span_id)
    }

    /// Duration of the span in nanoseconds
    pub fn duration_nanos(&self) -> u64 {
        self.end_time.saturating_sub(self.start_time)
    }
}

impl SpanBatch {
    /// Creates a new empty span batch
    pub fn new() -> Self {
        Self {
            spans: Vec::new(),
            timestamp: SystemTime::now(),
        }
    }

    /// Creates a batch with the given spans
    pub fn with_spans(spans: Vec<Span>) -> Self {
        Self {
            spans,
            timestamp: SystemTime::now(),
        }
    }

    /// Adds a span to the batch
    pub fn add(&mut self, span: Span) {
        self.spans.push(span);
    }

    /// Returns the number of spans in the batch
    pub fn len(&self) -> usize {
        self.spans.len()
    }

    /// Returns true if the batch is empty
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }
}

impl Default for SpanBatch {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Vec<Span>> for SpanBatch {
    fn from(spans: Vec<Span>) -> Self {
        Self::with_spans(spans)
    }
}
