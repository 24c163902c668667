//! Correlating Exporter
//!
//! A [`SpanExporter`] decorator that holds back TOOL spans until the LLM span
//! that issued the tool call is exported, then links them to it.
//!
//! TOOL spans usually finish before the LLM span that caused them has
//! recorded its response, so they reach the exporter first and without any
//! way to tell which model turn they belong to. The LLM span's
//! `ai.response.toolCalls` attribute lists the tool-call ids of that turn,
//! and each TOOL span carries its own id in `ai.toolCall.id`.
//!
//! # Per-batch algorithm
//!
//! ```text
//!  batch ──► partition ──► TOOL  ──────────────► buffer.put(id, span)
//!                     ├──► LLM   ─► ids, parent ─┐
//!                     └──► OTHER ─┐              │
//!                                 ▼              ▼
//!                            forward list ◄── buffer.take_matching(ids)
//!                                 │
//!                                 ▼
//!                     empty? ── yes ──► Ok(()) (delegate not called)
//!                                 │ no
//!                                 ▼
//!                       inner.export(forward)
//! ```
//!
//! When several LLM spans in one batch carry tool calls, the last one
//! observed is used as parent and session source for every flushed span.
//!
//! # Concurrency
//!
//! The buffer sits behind a `std::sync::Mutex` that is held only while the
//! batch is partitioned and linked, never across the delegate's `.await`.

use crate::attributes::{MetadataConvention, RESPONSE_TOOL_CALLS};
use crate::buffer::{tool_call_id, BufferConfig, BufferMetrics, ToolSpanBuffer};
use crate::exporter::{ExportError, SpanExporter};
use crate::extractor::extract_tool_call_ids;
use crate::span::{OpenInferenceKind, Span, SpanBatch};
use std::sync::{Mutex, PoisonError};

/// The LLM span flushed TOOL spans get linked to.
struct LlmParent {
    span_id: String,
    session_id: Option<String>,
}

/// Exporter wrapper that buffers TOOL spans and releases them, linked, with
/// their LLM span.
pub struct CorrelatingExporter<E: SpanExporter> {
    inner: E,
    buffer: Mutex<ToolSpanBuffer>,
    session_key: &'static str,
}

impl<E: SpanExporter> CorrelatingExporter<E> {
    /// Wraps `inner`, reading LLM session ids according to `convention`.
    pub fn new(inner: E, convention: MetadataConvention, buffer: BufferConfig) -> Self {
        Self {
            inner,
            buffer: Mutex::new(ToolSpanBuffer::new(buffer)),
            session_key: convention.session_source_key(),
        }
    }

    /// Wraps `inner` with the default convention and an unbounded buffer.
    pub fn with_defaults(inner: E) -> Self {
        Self::new(inner, MetadataConvention::default(), BufferConfig::default())
    }

    /// The wrapped exporter.
    pub fn inner(&self) -> &E {
        &self.inner
    }

    /// Number of TOOL spans waiting for their LLM span.
    pub fn buffered_len(&self) -> usize {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// True if a TOOL span is waiting under `tool_call_id`.
    pub fn is_buffered(&self, tool_call_id: &str) -> bool {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(tool_call_id)
    }

    /// Snapshot of the buffer counters.
    pub fn buffer_metrics(&self) -> BufferMetrics {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .metrics()
            .clone()
    }

    /// Splits the batch, buffers TOOL spans and releases the ones the batch's
    /// LLM span asked for. Returns the spans to forward, in order.
    ///
    /// An LLM span that cannot be linked against fails the batch after its
    /// TOOL spans are buffered and before anything is released, so no
    /// buffered span is lost.
    fn partition(&self, batch: SpanBatch) -> Result<Vec<Span>, ExportError> {
        let mut forward = Vec::with_capacity(batch.len());
        let mut to_buffer = Vec::new();
        let mut tool_call_ids: Vec<String> = Vec::new();
        let mut llm_parent: Option<LlmParent> = None;
        let mut failure: Option<ExportError> = None;

        for span in batch.spans {
            match span.openinference_kind() {
                OpenInferenceKind::Tool => match tool_call_id(&span) {
                    Some(id) => to_buffer.push((id.to_string(), span)),
                    None => tracing::warn!(
                        span_id = %span.span_id_hex(),
                        name = %span.name,
                        "dropping TOOL span without a tool call id"
                    ),
                },
                OpenInferenceKind::Llm => {
                    let ids = extract_tool_call_ids(span.attribute(RESPONSE_TOOL_CALLS));
                    if !ids.is_empty() {
                        if span.span_id == 0 {
                            failure.get_or_insert_with(|| {
                                ExportError::Processing(format!(
                                    "LLM span {:?} issued {} tool call(s) but has no valid span id",
                                    span.name,
                                    ids.len()
                                ))
                            });
                            continue;
                        }
                        llm_parent = Some(LlmParent {
                            span_id: span.span_id_hex(),
                            session_id: session_id(&span, self.session_key),
                        });
                        tool_call_ids.extend(ids);
                    }
                    forward.push(span);
                }
                OpenInferenceKind::Other => forward.push(span),
            }
        }

        let mut buffer = self
            .buffer
            .lock()
            .map_err(|_| ExportError::Processing("tool span buffer lock poisoned".into()))?;

        buffer.evict_stale();

        let buffered = to_buffer.len();
        for (id, span) in to_buffer {
            buffer.put(id, span);
        }

        if let Some(failure) = failure {
            return Err(failure);
        }

        let mut flushed = 0;
        if let Some(parent) = llm_parent {
            let linked = buffer.take_matching(
                &parent.span_id,
                parent.session_id.as_deref(),
                &tool_call_ids,
            );
            flushed = linked.len();
            forward.extend(linked);
        }

        tracing::debug!(
            buffered,
            flushed,
            forwarded = forward.len(),
            pending = buffer.len(),
            "partitioned span batch"
        );

        Ok(forward)
    }
}

/// Session id of an LLM span, coerced to a string the way the attribute
/// mapper does. Blank values count as absent.
fn session_id(span: &Span, key: &str) -> Option<String> {
    let raw = span.attribute(key)?.coerce_to_string()?;
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

impl<E: SpanExporter> SpanExporter for CorrelatingExporter<E> {
    async fn export(&self, batch: SpanBatch) -> Result<(), ExportError> {
        let forward = match self.partition(batch) {
            Ok(forward) => forward,
            Err(e) => {
                tracing::debug!(error = %e, "span batch rejected before export");
                return Err(e);
            }
        };

        if forward.is_empty() {
            return Ok(());
        }

        self.inner.export(SpanBatch::with_spans(forward)).await
    }

    fn force_flush(&self) -> impl std::future::Future<Output = Result<(), ExportError>> + Send {
        self.inner.force_flush()
    }

    async fn shutdown(&self) -> Result<(), ExportError> {
        let stranded = self.buffered_len();
        if stranded > 0 {
            tracing::warn!(
                stranded,
                "shutting down with TOOL spans still waiting for their LLM span"
            );
        }
        self.inner.shutdown().await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
