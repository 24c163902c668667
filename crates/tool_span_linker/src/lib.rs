//! Tool Span Linker
//!
//! Post-processing stage for spans emitted by an instrumented LLM runtime.
//! Finished spans pass through an attribute hook that rewrites the runtime's
//! conventions into the collector's, and then through a correlating exporter
//! that holds TOOL spans back until the LLM span that issued the tool call is
//! exported. Released TOOL spans carry `parent_span_id` and the session id of
//! that LLM span.
//!
//! ```text
//! runtime ──► SpanProcessor::filter ──► CorrelatingExporter ──► HttpExporter ──► collector (OTLP/HTTP)
//!              (map + sanitize)          (buffer / link)
//! ```
//!
//! Exporters use native async fn in traits (no `#[async_trait]` macro).

pub mod attributes;
pub mod buffer;
pub mod config;
pub mod correlating;
pub mod error;
pub mod exporter;
pub mod extractor;
pub mod http_exporter;
pub mod otlp;
pub mod processor;
pub mod span;
pub mod telemetry;

// Re-export main types
pub use attributes::{map_attributes, sanitize_attributes, MetadataConvention};
pub use buffer::{BufferConfig, BufferMetrics, ToolSpanBuffer};
pub use config::{ProcessorConfig, ResolvedConfig, DEFAULT_COLLECTOR_URL};
pub use correlating::CorrelatingExporter;
pub use error::ConfigError;
pub use exporter::{ExportError, NullExporter, SpanExporter, SpanExporterBoxed, StdoutExporter};
pub use extractor::extract_tool_call_ids;
pub use http_exporter::HttpExporter;
pub use processor::SpanProcessor;
pub use span::{AttributeValue, OpenInferenceKind, Span, SpanBatch, SpanKind, SpanStatus};
pub use telemetry::{PromptInfo, TelemetryOptions, TelemetrySettings};
