//! In-memory row source.
//!
//! Serves a fixed row list or an unbounded generator, can be told to fail
//! after N rows, and records how many rows were pulled and whether the
//! cursor was closed.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use super::errors::{SourceError, SourceResult};
use super::{RowCursor, RowSource};
use crate::row::Row;

type Generator = Arc<dyn Fn(u64) -> Row + Send + Sync>;

#[derive(Clone)]
enum Rows {
    Fixed(Arc<Vec<Row>>),
    Generated(Generator),
}

/// Shared counters observed by tests after a stream has run.
#[derive(Debug, Clone, Default)]
pub struct SourceProbe {
    opened: Arc<AtomicU64>,
    pulled: Arc<AtomicU64>,
    closed: Arc<AtomicBool>,
}

impl SourceProbe {
    /// Number of cursors opened
    pub fn opened(&self) -> u64 {
        self.opened.load(Ordering::SeqCst)
    }

    /// Rows handed out across all cursors
    pub fn pulled(&self) -> u64 {
        self.pulled.load(Ordering::SeqCst)
    }

    /// True once any cursor was closed
    pub fn closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[derive(Clone)]
pub struct MemoryRowSource {
    rows: Rows,
    fail_after: Option<(u64, String)>,
    probe: SourceProbe,
}

impl MemoryRowSource {
    pub fn from_rows(rows: Vec<Row>) -> Self {
        Self {
            rows: Rows::Fixed(Arc::new(rows)),
            fail_after: None,
            probe: SourceProbe::default(),
        }
    }

    /// Unbounded source; row `i` is `generate(i)`.
    pub fn generate<F>(generate: F) -> Self
    where
        F: Fn(u64) -> Row + Send + Sync + 'static,
    {
        Self {
            rows: Rows::Generated(Arc::new(generate)),
            fail_after: None,
            probe: SourceProbe::default(),
        }
    }

    /// Make every cursor fail with `reason` once `rows` rows have been served.
    pub fn fail_after(mut self, rows: u64, reason: impl Into<String>) -> Self {
        self.fail_after = Some((rows, reason.into()));
        self
    }

    pub fn probe(&self) -> SourceProbe {
        self.probe.clone()
    }
}

impl RowSource for MemoryRowSource {
    type Cursor = MemoryCursor;

    async fn open(&self, _query: &str, _limit_hint: Option<u64>) -> SourceResult<MemoryCursor> {
        self.probe.opened.fetch_add(1, Ordering::SeqCst);
        Ok(MemoryCursor {
            rows: self.rows.clone(),
            position: 0,
            fail_after: self.fail_after.clone(),
            probe: self.probe.clone(),
        })
    }
}

pub struct MemoryCursor {
    rows: Rows,
    position: u64,
    fail_after: Option<(u64, String)>,
    probe: SourceProbe,
}

impl RowCursor for MemoryCursor {
    async fn next(&mut self) -> SourceResult<Option<Row>> {
        if let Some((limit, reason)) = &self.fail_after {
            if self.position >= *limit {
                return Err(SourceError::Execution(reason.clone()));
            }
        }

        let row = match &self.rows {
            Rows::Fixed(rows) => match rows.get(self.position as usize) {
                Some(row) => row.clone(),
                None => return Ok(None),
            },
            Rows::Generated(generate) => generate(self.position),
        };

        self.position += 1;
        self.probe.pulled.fetch_add(1, Ordering::SeqCst);
        Ok(Some(row))
    }

    async fn close(self) {
        self.probe.closed.store(true, Ordering::SeqCst);
    }
}
