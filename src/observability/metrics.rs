//! Stream metrics
//!
//! - Counters only, monotonic, reset on process start
//! - Shared across requests; every other piece of stream state is per-request

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Process-wide stream counters.
///
/// Relaxed ordering throughout; readers only need eventually exact totals.
#[derive(Debug, Default)]
pub struct StreamMetrics {
    streams_started: AtomicU64,
    streams_completed: AtomicU64,
    streams_cancelled: AtomicU64,
    streams_failed: AtomicU64,
    requests_rejected: AtomicU64,
    rows_streamed: AtomicU64,
    frames_written: AtomicU64,
    bytes_written: AtomicU64,
    fields_dropped: AtomicU64,
}

impl StreamMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_started(&self) {
        self.streams_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_completed(&self) {
        self.streams_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_cancelled(&self) {
        self.streams_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_failed(&self) {
        self.streams_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_rejected(&self) {
        self.requests_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_rows(&self, rows: u64) {
        self.rows_streamed.fetch_add(rows, Ordering::Relaxed);
    }

    /// Record one chunk accepted by a sink
    pub fn record_frame(&self, bytes: u64) {
        self.frames_written.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn add_fields_dropped(&self, fields: u64) {
        self.fields_dropped.fetch_add(fields, Ordering::Relaxed);
    }

    /// Point-in-time copy of every counter
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            streams_started: self.streams_started.load(Ordering::Relaxed),
            streams_completed: self.streams_completed.load(Ordering::Relaxed),
            streams_cancelled: self.streams_cancelled.load(Ordering::Relaxed),
            streams_failed: self.streams_failed.load(Ordering::Relaxed),
            requests_rejected: self.requests_rejected.load(Ordering::Relaxed),
            rows_streamed: self.rows_streamed.load(Ordering::Relaxed),
            frames_written: self.frames_written.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            fields_dropped: self.fields_dropped.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of all metrics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub streams_started: u64,
    pub streams_completed: u64,
    pub streams_cancelled: u64,
    pub streams_failed: u64,
    pub requests_rejected: u64,
    pub rows_streamed: u64,
    pub frames_written: u64,
    pub bytes_written: u64,
    pub fields_dropped: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_metrics_are_zero() {
        let snapshot = StreamMetrics::new().snapshot();
        assert_eq!(snapshot.streams_started, 0);
        assert_eq!(snapshot.rows_streamed, 0);
        assert_eq!(snapshot.bytes_written, 0);
    }

    #[test]
    fn test_record_frame() {
        let metrics = StreamMetrics::new();
        metrics.record_frame(100);
        metrics.record_frame(28);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.frames_written, 2);
        assert_eq!(snapshot.bytes_written, 128);
    }

    #[test]
    fn test_snapshot_serializes() {
        let metrics = StreamMetrics::new();
        metrics.increment_started();
        metrics.increment_cancelled();
        metrics.add_rows(42);

        let json = serde_json::to_value(metrics.snapshot()).unwrap();
        assert_eq!(json["streams_started"], 1);
        assert_eq!(json["streams_cancelled"], 1);
        assert_eq!(json["rows_streamed"], 42);
    }

    #[test]
    fn test_thread_safety() {
        use std::sync::Arc;
        use std::thread;

        let metrics = Arc::new(StreamMetrics::new());
        let mut handles = vec![];

        for _ in 0..8 {
            let m = Arc::clone(&metrics);
            handles.push(thread::spawn(move || {
                for _ in 0..100 {
                    m.increment_started();
                    m.add_rows(2);
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.streams_started, 800);
        assert_eq!(snapshot.rows_streamed, 1600);
    }
}
