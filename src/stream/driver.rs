//! Stream driver.
//!
//! Pulls rows one at a time, batches them, encodes batches into frames and
//! writes each frame to the sink, waiting for the sink to accept it before the
//! next row is pulled.
//!
//! - The row limit bounds pulls, not just emission.
//! - A source or encoder failure stops pulling and is returned; frames
//!   already written stay written, nothing malformed is appended.
//! - A rejected write is cancellation: the cursor is closed, nothing else is
//!   written, and the outcome is `Cancelled` rather than an error.

use std::num::NonZeroUsize;
use std::sync::Arc;

use uuid::Uuid;

use super::accumulator::{BatchAccumulator, DEFAULT_BATCH_CAPACITY};
use super::columnar::ColumnarEncoder;
use super::errors::{StreamError, StreamResult};
use super::format::{FrameEncoder, SchemaPolicy, StreamFormat};
use super::line::LineEncoder;
use super::sink::ChunkSink;
use crate::observability::{
    log_event_with_fields, Event, Logger, ObservationScope, Severity, StreamMetrics,
};
use crate::source::RowCursor;

/// Per-stream settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamOptions {
    pub format: StreamFormat,
    pub limit: Option<u64>,
    pub batch_capacity: NonZeroUsize,
    pub schema_policy: SchemaPolicy,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            format: StreamFormat::default(),
            limit: None,
            batch_capacity: NonZeroUsize::new(DEFAULT_BATCH_CAPACITY)
                .unwrap_or(NonZeroUsize::MIN),
            schema_policy: SchemaPolicy::default(),
        }
    }
}

impl StreamOptions {
    pub fn new(format: StreamFormat) -> Self {
        Self {
            format,
            ..Self::default()
        }
    }

    pub fn with_limit(mut self, limit: Option<u64>) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_batch_capacity(mut self, capacity: NonZeroUsize) -> Self {
        self.batch_capacity = capacity;
        self
    }

    pub fn with_schema_policy(mut self, policy: SchemaPolicy) -> Self {
        self.schema_policy = policy;
        self
    }
}

/// How a stream that did not fail ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    /// Every row up to the end or limit was written, trailer included
    Completed,
    /// The sink stopped accepting chunks
    Cancelled,
}

impl StreamOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamOutcome::Completed => "completed",
            StreamOutcome::Cancelled => "cancelled",
        }
    }
}

/// What a finished stream did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSummary {
    pub outcome: StreamOutcome,
    /// Rows pulled from the source
    pub rows: u64,
    /// Chunks accepted by the sink
    pub frames: u64,
    /// Bytes accepted by the sink
    pub bytes: u64,
    /// Fields dropped by null-fill coercion
    pub dropped_fields: u64,
}

impl StreamSummary {
    fn new() -> Self {
        Self {
            outcome: StreamOutcome::Completed,
            rows: 0,
            frames: 0,
            bytes: 0,
            dropped_fields: 0,
        }
    }
}

/// Drives one stream. Construct one per request.
pub struct StreamDriver {
    id: Uuid,
    options: StreamOptions,
    metrics: Option<Arc<StreamMetrics>>,
}

impl StreamDriver {
    pub fn new(options: StreamOptions) -> Self {
        Self {
            id: Uuid::new_v4(),
            options,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<StreamMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Identifier used in logs and response headers
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn options(&self) -> &StreamOptions {
        &self.options
    }

    /// Run the stream to completion, cancellation or failure.
    ///
    /// The cursor is always closed before this returns. The sink's `finish`
    /// is called only for completed streams.
    pub async fn drive<C, K>(&self, cursor: C, sink: &mut K) -> StreamResult<StreamSummary>
    where
        C: RowCursor,
        K: ChunkSink,
    {
        let id = self.id.to_string();
        let format = self.options.format.as_str();
        let limit = self
            .options
            .limit
            .map_or_else(|| "none".to_string(), |l| l.to_string());
        let scope = ObservationScope::with_fields(
            "STREAM",
            &[
                ("stream_id", id.as_str()),
                ("format", format),
                ("limit", limit.as_str()),
            ],
        );
        if let Some(metrics) = &self.metrics {
            metrics.increment_started();
        }

        let result = match self.options.format {
            StreamFormat::Line => self.run(cursor, sink, LineEncoder::new()).await,
            StreamFormat::Columnar => {
                let encoder = ColumnarEncoder::new(self.options.schema_policy);
                self.run(cursor, sink, encoder).await
            }
        };

        self.record(&result);
        match &result {
            Ok(summary) => {
                let rows = summary.rows.to_string();
                let bytes = summary.bytes.to_string();
                if summary.outcome == StreamOutcome::Cancelled {
                    log_event_with_fields(
                        Event::StreamCancelled,
                        &[("stream_id", id.as_str()), ("rows", rows.as_str())],
                    );
                }
                scope.complete_with_fields(&[
                    ("outcome", summary.outcome.as_str()),
                    ("rows", rows.as_str()),
                    ("bytes", bytes.as_str()),
                ]);
            }
            Err(err) => scope.fail(&err.to_string()),
        }
        result
    }

    async fn run<C, K, E>(
        &self,
        mut cursor: C,
        sink: &mut K,
        mut encoder: E,
    ) -> StreamResult<StreamSummary>
    where
        C: RowCursor,
        K: ChunkSink,
        E: FrameEncoder,
    {
        let mut summary = StreamSummary::new();
        let pumped = self.pump(&mut cursor, sink, &mut encoder, &mut summary).await;
        cursor.close().await;
        summary.dropped_fields = encoder.dropped_fields();

        match pumped? {
            StreamOutcome::Completed => {
                if sink.finish().await.is_err() {
                    summary.outcome = StreamOutcome::Cancelled;
                }
            }
            StreamOutcome::Cancelled => summary.outcome = StreamOutcome::Cancelled,
        }
        Ok(summary)
    }

    async fn pump<C, K, E>(
        &self,
        cursor: &mut C,
        sink: &mut K,
        encoder: &mut E,
        summary: &mut StreamSummary,
    ) -> StreamResult<StreamOutcome>
    where
        C: RowCursor,
        K: ChunkSink,
        E: FrameEncoder,
    {
        let capacity = encoder.batch_capacity(self.options.batch_capacity);
        let mut accumulator = BatchAccumulator::new(capacity);
        let mut frames: Vec<Vec<u8>> = Vec::new();

        while self.options.limit.map_or(true, |limit| summary.rows < limit) {
            let row = match cursor.next().await? {
                Some(row) => row,
                None => break,
            };
            summary.rows += 1;
            if let Some(metrics) = &self.metrics {
                metrics.add_rows(1);
            }

            if let Some(batch) = accumulator.accumulate(row) {
                encoder.encode_batch(batch, &mut frames)?;
                if !self.emit(sink, &mut frames, summary).await {
                    return Ok(StreamOutcome::Cancelled);
                }
            }
        }

        if let Some(batch) = accumulator.flush() {
            encoder.encode_batch(batch, &mut frames)?;
            if !self.emit(sink, &mut frames, summary).await {
                return Ok(StreamOutcome::Cancelled);
            }
        }

        encoder.finish(&mut frames)?;
        if !self.emit(sink, &mut frames, summary).await {
            return Ok(StreamOutcome::Cancelled);
        }
        Ok(StreamOutcome::Completed)
    }

    /// Write pending frames in order. Returns false once the sink rejects one;
    /// the remaining frames are discarded.
    async fn emit<K: ChunkSink>(
        &self,
        sink: &mut K,
        frames: &mut Vec<Vec<u8>>,
        summary: &mut StreamSummary,
    ) -> bool {
        for frame in frames.drain(..) {
            let len = frame.len() as u64;
            if sink.write(frame).await.is_err() {
                return false;
            }
            summary.frames += 1;
            summary.bytes += len;
            if let Some(metrics) = &self.metrics {
                metrics.record_frame(len);
            }
            if Logger::enabled(Severity::Trace) {
                let id = self.id.to_string();
                let bytes = len.to_string();
                Logger::trace(
                    Event::FrameWritten.as_str(),
                    &[("stream_id", id.as_str()), ("bytes", bytes.as_str())],
                );
            }
        }
        true
    }

    /// Rows and frames are counted as they happen, so failed streams are
    /// included in both.
    fn record(&self, result: &StreamResult<StreamSummary>) {
        let Some(metrics) = &self.metrics else {
            return;
        };
        match result {
            Ok(summary) => {
                metrics.add_fields_dropped(summary.dropped_fields);
                match summary.outcome {
                    StreamOutcome::Completed => metrics.increment_completed(),
                    StreamOutcome::Cancelled => metrics.increment_cancelled(),
                }
            }
            Err(_) => metrics.increment_failed(),
        }
    }
}

/// Convenience for callers that only need the error kind
pub fn is_source_failure(err: &StreamError) -> bool {
    matches!(err, StreamError::Source(_))
}
