//! Tool Span Buffer
//!
//! Holds TOOL spans, keyed by tool-call id, until the LLM span that issued the
//! call shows up and supplies the parent span id and session id they lack.
//!
//! The buffer is a plain sequential structure (no locking, no atomics). The
//! owning [`CorrelatingExporter`](crate::CorrelatingExporter) decides how it is
//! shared.
//!
//! # Growth
//!
//! With the default [`BufferConfig`] entries leave the buffer only when they
//! are flushed, so a TOOL span whose LLM span never arrives stays forever.
//! Setting `max_entries` and/or `max_age` bounds the buffer: the oldest entry
//! is dropped when a new key arrives at capacity, and [`ToolSpanBuffer::evict_stale`]
//! drops entries older than `max_age`.

use crate::attributes::{PARENT_SPAN_ID, SESSION_ID, TOOL_CALL_ID};
use crate::span::Span;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

/// Bounds for the tool span buffer. Unbounded by default.
#[derive(Debug, Clone, Default)]
pub struct BufferConfig {
    /// Maximum number of buffered spans; the oldest is dropped beyond this.
    pub max_entries: Option<usize>,
    /// Maximum time a span may wait for its LLM span.
    pub max_age: Option<Duration>,
}

impl BufferConfig {
    /// Sets the entry limit.
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = Some(max_entries);
        self
    }

    /// Sets the age limit.
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }
}

/// Buffer counters (plain u64, the buffer is never shared without a lock)
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BufferMetrics {
    /// Spans stored
    pub spans_buffered: u64,
    /// Spans released by a matching LLM span
    pub spans_flushed: u64,
    /// Spans dropped by a capacity or age bound
    pub spans_evicted: u64,
}

#[derive(Debug)]
struct BufferedToolSpan {
    span: Span,
    buffered_at: Instant,
}

/// Returns the tool-call id a TOOL span carries, if it is a string.
pub fn tool_call_id(span: &Span) -> Option<&str> {
    span.string_attribute(TOOL_CALL_ID)
}

/// Keyed store of TOOL spans awaiting correlation.
#[derive(Debug)]
pub struct ToolSpanBuffer {
    pending: HashMap<String, BufferedToolSpan>,
    config: BufferConfig,
    metrics: BufferMetrics,
}

impl Default for ToolSpanBuffer {
    fn default() -> Self {
        Self::new(BufferConfig::default())
    }
}

impl ToolSpanBuffer {
    /// Creates an empty buffer with the given bounds.
    pub fn new(config: BufferConfig) -> Self {
        Self {
            pending: HashMap::new(),
            config,
            metrics: BufferMetrics::default(),
        }
    }

    /// Stores `span` under `tool_call_id`, replacing any span already stored
    /// under that id.
    pub fn put(&mut self, tool_call_id: String, span: Span) {
        if !self.pending.contains_key(&tool_call_id) {
            self.make_room();
        }

        self.pending.insert(
            tool_call_id,
            BufferedToolSpan {
                span,
                buffered_at: Instant::now(),
            },
        );
        self.metrics.spans_buffered += 1;
    }

    fn make_room(&mut self) {
        let Some(max_entries) = self.config.max_entries else {
            return;
        };

        while self.pending.len() >= max_entries.max(1) {
            let Some(oldest) = self
                .pending
                .iter()
                .min_by_key(|(_, entry)| entry.buffered_at)
                .map(|(id, _)| id.clone())
            else {
                return;
            };
            self.pending.remove(&oldest);
            self.metrics.spans_evicted += 1;
            tracing::warn!(
                tool_call_id = %oldest,
                max_entries,
                "tool span buffer full, dropping oldest buffered tool span"
            );
        }
    }

    /// Removes the spans stored under `tool_call_ids`, in the order the ids are
    /// given, and links each one to its LLM span.
    ///
    /// `parent_span_id` and `session_id` are written only where the span does
    /// not already carry a value. Ids with no buffered span are skipped.
    pub fn take_matching(
        &mut self,
        parent_span_id: &str,
        session_id: Option<&str>,
        tool_call_ids: &[String],
    ) -> Vec<Span> {
        let mut flushed = Vec::new();

        for id in tool_call_ids {
            let Some(BufferedToolSpan { mut span, .. }) = self.pending.remove(id) else {
                continue;
            };

            span.fill_attribute(PARENT_SPAN_ID, parent_span_id);
            if let Some(session_id) = session_id {
                span.fill_attribute(SESSION_ID, session_id);
            }
            flushed.push(span);
        }

        self.metrics.spans_flushed += flushed.len() as u64;
        flushed
    }

    /// Drops every entry older than `max_age`. Returns how many were dropped.
    pub fn evict_stale(&mut self) -> usize {
        let Some(max_age) = self.config.max_age else {
            return 0;
        };

        let now = Instant::now();
        let before = self.pending.len();
        self.pending.retain(|id, entry| {
            let keep = now.duration_since(entry.buffered_at) < max_age;
            if !keep {
                tracing::warn!(
                    tool_call_id = %id,
                    span_name = %entry.span.name,
                    ?max_age,
                    "dropping tool span that never met its LLM span"
                );
            }
            keep
        });

        let evicted = before - self.pending.len();
        self.metrics.spans_evicted += evicted as u64;
        evicted
    }

    /// True if a span is buffered under `tool_call_id`.
    pub fn contains(&self, tool_call_id: &str) -> bool {
        self.pending.contains_key(tool_call_id)
    }

    /// Number of buffered spans.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// True if nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Returns the buffer counters.
    pub fn metrics(&self) -> &BufferMetrics {
        &self.metrics
    }
}
