//! Span Processor
//!
//! Binds the attribute hook and the [`CorrelatingExporter`] into the two
//! pieces a tracing pipeline expects from a span processor: a filter applied
//! to each finished span before export, and an exporter for what passes it.
//!
//! ```ignore
//! let processor = SpanProcessor::from_config(
//!     ProcessorConfig::default().with_project_id("my-project"),
//! )?;
//!
//! // For every finished span
//! processor.on_end(span).await?;
//!
//! processor.shutdown().await?;
//! ```

use crate::attributes::{map_attributes, sanitize_attributes, MetadataConvention};
use crate::buffer::{BufferConfig, BufferMetrics};
use crate::config::ProcessorConfig;
use crate::correlating::CorrelatingExporter;
use crate::error::ConfigError;
use crate::exporter::{ExportError, SpanExporter};
use crate::http_exporter::HttpExporter;
use crate::span::{Span, SpanBatch};

/// Span processor for LLM application traces.
pub struct SpanProcessor<E: SpanExporter> {
    exporter: CorrelatingExporter<E>,
    convention: MetadataConvention,
}

impl SpanProcessor<HttpExporter> {
    /// Resolves `config` (falling back to the environment) and builds a
    /// processor that ships to the collector over HTTP.
    ///
    /// Fails before any span is processed if a credential is missing or the
    /// HTTP exporter cannot be built for the endpoint.
    pub fn from_config(config: ProcessorConfig) -> Result<Self, ConfigError> {
        let resolved = config.resolve()?;
        let http = HttpExporter::from_config(&resolved)?;
        tracing::info!(
            endpoint = %http.endpoint(),
            project_id = %resolved.project_id,
            convention = ?resolved.metadata_convention,
            "span processor ready"
        );
        Ok(Self::new(http, resolved.metadata_convention, resolved.buffer))
    }
}

impl<E: SpanExporter> SpanProcessor<E> {
    /// Builds a processor around any delegate sink.
    pub fn new(delegate: E, convention: MetadataConvention, buffer: BufferConfig) -> Self {
        Self {
            exporter: CorrelatingExporter::new(delegate, convention, buffer),
            convention,
        }
    }

    /// Pre-export hook: maps runtime attributes to the collector's
    /// conventions, then strips empty values. Always keeps the span.
    pub fn filter(&self, span: &mut Span) -> bool {
        map_attributes(span, self.convention);
        sanitize_attributes(span);
        true
    }

    /// Handles one finished span: filters it and exports it on its own.
    pub async fn on_end(&self, mut span: Span) -> Result<(), ExportError> {
        if !self.filter(&mut span) {
            return Ok(());
        }
        self.exporter.export(SpanBatch::with_spans(vec![span])).await
    }

    /// Filters every span of `batch` and exports what is kept.
    pub async fn export(&self, mut batch: SpanBatch) -> Result<(), ExportError> {
        batch.spans.retain_mut(|span| self.filter(span));
        self.exporter.export(batch).await
    }

    /// Delegates to the sink. Buffered TOOL spans are not flushed.
    pub async fn force_flush(&self) -> Result<(), ExportError> {
        self.exporter.force_flush().await
    }

    /// Delegates to the sink. Buffered TOOL spans are not flushed.
    pub async fn shutdown(&self) -> Result<(), ExportError> {
        self.exporter.shutdown().await
    }

    /// Number of TOOL spans waiting for their LLM span.
    pub fn buffered_tool_spans(&self) -> usize {
        self.exporter.buffered_len()
    }

    /// Buffer counters.
    pub fn buffer_metrics(&self) -> BufferMetrics {
        self.exporter.buffer_metrics()
    }

    /// The correlating exporter the processor feeds.
    pub fn exporter(&self) -> &CorrelatingExporter<E> {
        &self.exporter
    }
}
