use crate::span::SpanBatch;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;

/// Error types for span export operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExportError {
    /// Transport-layer error (network, HTTP status)
    #[error("transport error: {0}")]
    Transport(String),
    /// Export operation timed out
    #[error("export operation timed out")]
    Timeout,
    /// The batch could not be partitioned or linked; nothing was forwarded
    #[error("error processing spans in buffering exporter: {0}")]
    Processing(String),
    /// The exporter has been shut down
    #[error("exporter has been shut down")]
    Shutdown,
}

/// Boxed export future used by [`SpanExporterBoxed`].
pub type BoxExportFuture<'a> = Pin<Box<dyn Future<Output = Result<(), ExportError>> + Send + 'a>>;

/// Trait for exporting span batches to various backends.
///
/// Uses native async fn in traits instead of `#[async_trait]`.
///
/// # Note on Object Safety
///
/// This trait uses `impl Future` return types which are not object-safe.
/// For dynamic dispatch, use `Box<dyn SpanExporterBoxed>`, which itself
/// implements `SpanExporter`.
pub trait SpanExporter: Send + Sync {
    /// Exports a batch of spans.
    fn export(&self, batch: SpanBatch) -> impl Future<Output = Result<(), ExportError>> + Send;

    /// Flushes anything the exporter holds in flight.
    fn force_flush(&self) -> impl Future<Output = Result<(), ExportError>> + Send {
        async { Ok(()) }
    }

    /// Releases the exporter's resources. Exports after shutdown may fail.
    fn shutdown(&self) -> impl Future<Output = Result<(), ExportError>> + Send {
        async { Ok(()) }
    }

    /// Returns the exporter name for debugging.
    fn name(&self) -> &str;
}

/// Object-safe version of SpanExporter for dynamic dispatch.
pub trait SpanExporterBoxed: Send + Sync {
    /// Exports a batch of spans (boxed future for object safety).
    fn export_boxed(&self, batch: SpanBatch) -> BoxExportFuture<'_>;

    /// Boxed [`SpanExporter::force_flush`].
    fn force_flush_boxed(&self) -> BoxExportFuture<'_>;

    /// Boxed [`SpanExporter::shutdown`].
    fn shutdown_boxed(&self) -> BoxExportFuture<'_>;

    /// Returns the exporter name for debugging.
    fn name(&self) -> &str;
}

/// Blanket implementation: any SpanExporter can be used as SpanExporterBoxed
impl<T: SpanExporter> SpanExporterBoxed for T {
    fn export_boxed(&self, batch: SpanBatch) -> BoxExportFuture<'_> {
        Box::pin(self.export(batch))
    }

    fn force_flush_boxed(&self) -> BoxExportFuture<'_> {
        Box::pin(self.force_flush())
    }

    fn shutdown_boxed(&self) -> BoxExportFuture<'_> {
        Box::pin(self.shutdown())
    }

    fn name(&self) -> &str {
        SpanExporter::name(self)
    }
}

impl SpanExporter for Box<dyn SpanExporterBoxed> {
    async fn export(&self, batch: SpanBatch) -> Result<(), ExportError> {
        self.as_ref().export_boxed(batch).await
    }

    async fn force_flush(&self) -> Result<(), ExportError> {
        self.as_ref().force_flush_boxed().await
    }

    async fn shutdown(&self) -> Result<(), ExportError> {
        self.as_ref().shutdown_boxed().await
    }

    fn name(&self) -> &str {
        SpanExporterBoxed::name(self.as_ref())
    }
}

impl<E: SpanExporter> SpanExporter for Arc<E> {
    fn export(&self, batch: SpanBatch) -> impl Future<Output = Result<(), ExportError>> + Send {
        self.as_ref().export(batch)
    }

    fn force_flush(&self) -> impl Future<Output = Result<(), ExportError>> + Send {
        self.as_ref().force_flush()
    }

    fn shutdown(&self) -> impl Future<Output = Result<(), ExportError>> + Send {
        self.as_ref().shutdown()
    }

    fn name(&self) -> &str {
        SpanExporter::name(self.as_ref())
    }
}

/// Stdout exporter for local development and the demo binary
pub struct StdoutExporter {
    verbose: bool,
}

impl StdoutExporter {
    /// Creates a new stdout exporter
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl SpanExporter for StdoutExporter {
    async fn export(&self, batch: SpanBatch) -> Result<(), ExportError> {
        if self.verbose {
            println!("=== Exporting {} spans ===", batch.spans.len());
            for span in &batch.spans {
                let mut attributes: Vec<_> = span.attributes.iter().collect();
                attributes.sort_by(|a, b| a.0.cmp(b.0));
                println!(
                    "Span: span_id={} kind={} name={} duration={}ns",
                    span.span_id_hex(),
                    span.openinference_kind(),
                    span.name,
                    span.duration_nanos(),
                );
                for (key, value) in attributes {
                    println!("    {key} = {value:?}");
                }
            }
            println!("=== Export complete ===\n");
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "stdout"
    }
}

/// Null exporter that discards all spans (for benchmarking)
pub struct NullExporter;

impl NullExporter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NullExporter {
    fn default() -> Self {
        Self::new()
    }
}

impl SpanExporter for NullExporter {
    async fn export(&self, _batch: SpanBatch) -> Result<(), ExportError> {
        Ok(())
    }

    fn name(&self) -> &str {
        "null"
    }
}

/// Test exporter that records every exported batch for verification
#[cfg(test)]
#[derive(Default)]
pub(crate) struct RecordingExporter {
    batches: std::sync::Mutex<Vec<Vec<crate::span::Span>>>,
    fail_with: Option<ExportError>,
}

#[cfg(test)]
impl RecordingExporter {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Records batches but reports `error` for every export.
    pub(crate) fn failing(error: ExportError) -> Self {
        Self {
            batches: std::sync::Mutex::new(Vec::new()),
            fail_with: Some(error),
        }
    }

    pub(crate) fn batches(&self) -> Vec<Vec<crate::span::Span>> {
        self.batches.lock().unwrap().clone()
    }

    pub(crate) fn export_calls(&self) -> usize {
        self.batches.lock().unwrap().len()
    }
}

#[cfg(test)]
impl SpanExporter for RecordingExporter {
    async fn export(&self, batch: SpanBatch) -> Result<(), ExportError> {
        self.batches.lock().unwrap().push(batch.spans);
        match &self.fail_with {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn name(&self) -> &str {
        "recording"
    }
}
