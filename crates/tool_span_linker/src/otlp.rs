//! Conversion of finished spans into OTLP protobuf messages.
//!
//! Ids are written big-endian, so the hex form of an OTLP `span_id` equals
//! [`Span::span_id_hex`], which is what linked TOOL spans carry in
//! `parent_span_id`.

use crate::span::{AttributeValue, Span, SpanKind, SpanStatus};
use opentelemetry_proto::tonic::collector::trace::v1::ExportTraceServiceRequest;
use opentelemetry_proto::tonic::common::v1::{
    any_value, AnyValue, ArrayValue, InstrumentationScope, KeyValue,
};
use opentelemetry_proto::tonic::resource::v1::Resource;
use opentelemetry_proto::tonic::trace::v1::{
    self as otel_trace, span, status, ResourceSpans, ScopeSpans,
};

/// Instrumentation scope name stamped on every exported batch.
pub const SCOPE_NAME: &str = "tool-span-linker";

// ============================================================
// Public API
// ============================================================

/// Wraps `spans` into a single-resource, single-scope export request.
pub fn to_export_request(spans: &[Span]) -> ExportTraceServiceRequest {
    ExportTraceServiceRequest {
        resource_spans: vec![ResourceSpans {
            resource: Some(Resource::default()),
            scope_spans: vec![ScopeSpans {
                scope: Some(InstrumentationScope {
                    name: SCOPE_NAME.to_string(),
                    version: env!("CARGO_PKG_VERSION").to_string(),
                    ..Default::default()
                }),
                spans: spans.iter().map(convert_span).collect(),
                ..Default::default()
            }],
            ..Default::default()
        }],
    }
}

/// Converts one span. `Null` attributes have no OTLP form and are skipped.
pub fn convert_span(span: &Span) -> otel_trace::Span {
    let parent_span_id = if span.parent_span_id == 0 {
        Vec::new()
    } else {
        span_id_to_bytes(span.parent_span_id)
    };

    let mut attributes: Vec<KeyValue> = span
        .attributes
        .iter()
        .filter_map(|(key, value)| {
            Some(KeyValue {
                key: key.clone(),
                value: Some(convert_value(value)?),
            })
        })
        .collect();
    attributes.sort_by(|a, b| a.key.cmp(&b.key));

    otel_trace::Span {
        trace_id: trace_id_to_bytes(span.trace_id),
        span_id: span_id_to_bytes(span.span_id),
        parent_span_id,
        name: span.name.clone(),
        kind: span_kind(span.kind) as i32,
        start_time_unix_nano: span.start_time,
        end_time_unix_nano: span.end_time,
        attributes,
        status: Some(otel_trace::Status {
            code: status_code(span.status) as i32,
            ..Default::default()
        }),
        ..Default::default()
    }
}

// ============================================================
// Type conversion helpers
// ============================================================

/// 128-bit trace id as 16 big-endian bytes.
pub fn trace_id_to_bytes(id: u128) -> Vec<u8> {
    id.to_be_bytes().to_vec()
}

/// 64-bit span id as 8 big-endian bytes.
pub fn span_id_to_bytes(id: u64) -> Vec<u8> {
    id.to_be_bytes().to_vec()
}

fn convert_value(value: &AttributeValue) -> Option<AnyValue> {
    let value = match value {
        AttributeValue::Null => return None,
        AttributeValue::String(s) => any_value::Value::StringValue(s.clone()),
        AttributeValue::Int(i) => any_value::Value::IntValue(*i),
        AttributeValue::Float(f) => any_value::Value::DoubleValue(*f),
        AttributeValue::Bool(b) => any_value::Value::BoolValue(*b),
        AttributeValue::Array(items) => any_value::Value::ArrayValue(ArrayValue {
            values: items
                .iter()
                .map(|s| AnyValue {
                    value: Some(any_value::Value::StringValue(s.clone())),
                })
                .collect(),
        }),
    };
    Some(AnyValue { value: Some(value) })
}

fn span_kind(kind: SpanKind) -> span::SpanKind {
    match kind {
        SpanKind::Internal => span::SpanKind::Internal,
        SpanKind::Server => span::SpanKind::Server,
        SpanKind::Client => span::SpanKind::Client,
        SpanKind::Producer => span::SpanKind::Producer,
        SpanKind::Consumer => span::SpanKind::Consumer,
    }
}

fn status_code(status: SpanStatus) -> status::StatusCode {
    match status {
        SpanStatus::Ok => status::StatusCode::Ok,
        SpanStatus::Error => status::StatusCode::Error,
        SpanStatus::Unset => status::StatusCode::Unset,
    }
}
