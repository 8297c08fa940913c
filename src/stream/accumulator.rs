//! Batch accumulation.
//!
//! Rows are grouped into fixed-capacity batches in arrival order. Each batch
//! carries its sequence number so ordering can be checked downstream.

use std::num::NonZeroUsize;

use crate::row::Row;

/// Default rows per batch
pub const DEFAULT_BATCH_CAPACITY: usize = 1000;

/// An ordered group of rows, never larger than the accumulator capacity.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    sequence: u64,
    rows: Vec<Row>,
}

impl Batch {
    pub fn new(sequence: u64, rows: Vec<Row>) -> Self {
        Self { sequence, rows }
    }

    /// Zero-based position of this batch in the stream
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Groups consecutive rows into batches.
#[derive(Debug)]
pub struct BatchAccumulator {
    capacity: NonZeroUsize,
    pending: Vec<Row>,
    next_sequence: u64,
}

impl BatchAccumulator {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            capacity,
            pending: Vec::with_capacity(capacity.get().min(DEFAULT_BATCH_CAPACITY)),
            next_sequence: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }

    /// Rows waiting for the current batch to fill
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Append a row. Returns the completed batch once capacity is reached.
    pub fn accumulate(&mut self, row: Row) -> Option<Batch> {
        self.pending.push(row);
        if self.pending.len() >= self.capacity.get() {
            Some(self.take_pending())
        } else {
            None
        }
    }

    /// Return the partial batch at end of stream, `None` when nothing is pending.
    pub fn flush(&mut self) -> Option<Batch> {
        if self.pending.is_empty() {
            None
        } else {
            Some(self.take_pending())
        }
    }

    fn take_pending(&mut self) -> Batch {
        let next = Vec::with_capacity(self.capacity.get().min(DEFAULT_BATCH_CAPACITY));
        let rows = std::mem::replace(&mut self.pending, next);
        let batch = Batch::new(self.next_sequence, rows);
        self.next_sequence += 1;
        batch
    }
}
