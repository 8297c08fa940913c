//! SQLite row source.
//!
//! Each cursor owns one read-only connection running on a blocking thread.
//! Rows travel to the async side over a bounded channel, so the executor runs
//! at most `fetch_size` rows ahead of the stream driver. A semaphore bounds
//! the number of connections open at once; that is the only state shared
//! between concurrent streams. Opening with every connection in use fails
//! immediately with `Unavailable` instead of queueing.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rusqlite::types::ValueRef;
use rusqlite::{Connection, InterruptHandle, OpenFlags};
use tokio::sync::{mpsc, oneshot, OwnedSemaphorePermit, Semaphore, TryAcquireError};
use tokio::task::JoinHandle;

use super::errors::{SourceError, SourceResult};
use super::{RowCursor, RowSource};
use crate::row::{Row, Value};

/// Opens read-only SQLite cursors against one database file.
pub struct SqliteRowSource {
    path: PathBuf,
    permits: Arc<Semaphore>,
    fetch_size: usize,
}

impl SqliteRowSource {
    /// `max_connections` and `fetch_size` are clamped to at least 1.
    pub fn new(path: impl Into<PathBuf>, max_connections: usize, fetch_size: usize) -> Self {
        Self {
            path: path.into(),
            permits: Arc::new(Semaphore::new(max_connections.max(1))),
            fetch_size: fetch_size.max(1),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Connections not currently held by a cursor
    pub fn available_connections(&self) -> usize {
        self.permits.available_permits()
    }
}

impl RowSource for SqliteRowSource {
    type Cursor = SqliteCursor;

    async fn open(&self, query: &str, limit_hint: Option<u64>) -> SourceResult<SqliteCursor> {
        let permit = Arc::clone(&self.permits)
            .try_acquire_owned()
            .map_err(|e| match e {
                TryAcquireError::NoPermits => {
                    SourceError::Unavailable("no connection available".to_string())
                }
                TryAcquireError::Closed => {
                    SourceError::Unavailable("connection pool closed".to_string())
                }
            })?;

        let (row_tx, row_rx) = mpsc::channel(self.fetch_size);
        let (ready_tx, ready_rx) = oneshot::channel();
        let query = QueryTask {
            path: self.path.clone(),
            sql: query.to_string(),
            limit_hint,
        };

        let worker = tokio::task::spawn_blocking(move || query.run(permit, ready_tx, row_tx));

        match ready_rx.await {
            Ok(Ok(interrupt)) => Ok(SqliteCursor {
                rows: row_rx,
                interrupt,
                worker,
            }),
            Ok(Err(err)) => {
                let _ = worker.await;
                Err(err)
            }
            Err(_) => {
                let _ = worker.await;
                Err(SourceError::Execution(
                    "query worker exited before the statement was ready".to_string(),
                ))
            }
        }
    }
}

struct QueryTask {
    path: PathBuf,
    sql: String,
    limit_hint: Option<u64>,
}

impl QueryTask {
    /// Runs on a blocking thread until the result is exhausted, the limit is
    /// reached, or the cursor side hangs up.
    fn run(
        self,
        _permit: OwnedSemaphorePermit,
        ready: oneshot::Sender<SourceResult<InterruptHandle>>,
        rows: mpsc::Sender<SourceResult<Row>>,
    ) {
        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY
            | OpenFlags::SQLITE_OPEN_NO_MUTEX
            | OpenFlags::SQLITE_OPEN_URI;
        let conn = match Connection::open_with_flags(&self.path, flags) {
            Ok(conn) => conn,
            Err(e) => {
                let _ = ready.send(Err(SourceError::Unavailable(e.to_string())));
                return;
            }
        };

        let mut stmt = match conn.prepare(&self.sql) {
            Ok(stmt) => stmt,
            Err(e) => {
                let _ = ready.send(Err(SourceError::InvalidQuery(e.to_string())));
                return;
            }
        };

        let columns: Vec<Arc<str>> = stmt.column_names().into_iter().map(Arc::from).collect();

        let mut result = match stmt.query([]) {
            Ok(result) => result,
            Err(e) => {
                let _ = ready.send(Err(SourceError::Execution(e.to_string())));
                return;
            }
        };

        if ready.send(Ok(conn.get_interrupt_handle())).is_err() {
            return;
        }

        let mut produced: u64 = 0;
        while self.limit_hint.map_or(true, |limit| produced < limit) {
            let item = match result.next() {
                Ok(Some(row)) => convert_row(&columns, row),
                Ok(None) => break,
                Err(e) => Err(SourceError::from(e)),
            };
            let failed = item.is_err();

            // send fails once the cursor is closed or dropped
            if rows.blocking_send(item).is_err() || failed {
                break;
            }
            produced += 1;
        }
    }
}

fn convert_row(columns: &[Arc<str>], row: &rusqlite::Row<'_>) -> SourceResult<Row> {
    let mut fields = Vec::with_capacity(columns.len());
    for (i, name) in columns.iter().enumerate() {
        let value = match row.get_ref(i)? {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(v) => Value::Integer(v),
            ValueRef::Real(v) => Value::Float(v),
            ValueRef::Text(bytes) => match std::str::from_utf8(bytes) {
                Ok(text) => Value::Text(text.to_string()),
                Err(e) => {
                    return Err(SourceError::InvalidValue {
                        column: name.to_string(),
                        reason: e.to_string(),
                    })
                }
            },
            ValueRef::Blob(bytes) => Value::Bytes(bytes.to_vec()),
        };
        fields.push((Arc::clone(name), value));
    }
    Ok(Row::new(fields))
}

/// Cursor over a running SQLite query.
pub struct SqliteCursor {
    rows: mpsc::Receiver<SourceResult<Row>>,
    interrupt: InterruptHandle,
    worker: JoinHandle<()>,
}

impl RowCursor for SqliteCursor {
    async fn next(&mut self) -> SourceResult<Option<Row>> {
        match self.rows.recv().await {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(err)) => Err(err),
            None => Ok(None),
        }
    }

    /// Stops the worker and waits for it so the connection and its pool
    /// permit are released before this returns.
    async fn close(self) {
        let SqliteCursor {
            mut rows,
            interrupt,
            worker,
        } = self;

        rows.close();
        interrupt.interrupt();
        drop(rows);
        let _ = worker.await;
    }
}
