//! # Row Sources
//!
//! Pull-based access to the rows of one query execution.
//!
//! A [`RowSource`] opens a [`RowCursor`] for a query. The cursor yields rows
//! one at a time until it reports the end, and must tolerate being closed
//! before it is exhausted: the stream driver closes early on row limits,
//! failures and client disconnects.

mod errors;
mod memory;
mod sqlite;

pub use errors::{SourceError, SourceResult};
pub use memory::{MemoryCursor, MemoryRowSource, SourceProbe};
pub use sqlite::{SqliteCursor, SqliteRowSource};

use std::future::Future;

use crate::row::Row;

/// Opens cursors over query results.
///
/// The query string is opaque to the stream core; only the source interprets
/// it. `limit_hint` is advisory: a source may stop producing after that many
/// rows, but the driver enforces the limit on its own.
pub trait RowSource: Send + Sync {
    type Cursor: RowCursor + 'static;

    fn open(
        &self,
        query: &str,
        limit_hint: Option<u64>,
    ) -> impl Future<Output = SourceResult<Self::Cursor>> + Send;
}

/// A forward-only cursor.
pub trait RowCursor: Send {
    /// Next row, `Ok(None)` at the end. May suspend while the executor fetches.
    fn next(&mut self) -> impl Future<Output = SourceResult<Option<Row>>> + Send;

    /// Release the cursor and whatever executor resources back it.
    fn close(self) -> impl Future<Output = ()> + Send;
}
