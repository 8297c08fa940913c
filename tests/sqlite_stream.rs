//! SQLite-backed streaming tests
//!
//! Real databases in temporary directories, driven through the same driver
//! the HTTP endpoint uses.

use std::io::Cursor;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

use arrow::array::{Array, BinaryArray, Float64Array, Int64Array, StringArray};
use arrow::datatypes::DataType;
use arrow::ipc::reader::StreamReader;
use querystream::source::{RowCursor, RowSource, SourceError, SqliteRowSource};
use querystream::row::ValueKind;
use querystream::stream::{
    EncodeError, MemorySink, StreamDriver, StreamError, StreamFormat, StreamOptions, StreamOutcome,
};
use rusqlite::Connection;
use tempfile::TempDir;

const INFINITE: &str =
    "WITH RECURSIVE n(i) AS (SELECT 1 UNION ALL SELECT i + 1 FROM n) SELECT i FROM n";

fn create_database(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("metrics.db");
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(
        "CREATE TABLE readings (id INTEGER, sensor TEXT, value REAL, raw BLOB);
         INSERT INTO readings VALUES (1, 'north', 1.5, x'01ff');
         INSERT INTO readings VALUES (2, 'south', NULL, x'');
         INSERT INTO readings VALUES (3, NULL, 3.25, NULL);",
    )
    .unwrap();
    path
}

fn options(format: StreamFormat, capacity: usize, limit: Option<u64>) -> StreamOptions {
    StreamOptions::new(format)
        .with_limit(limit)
        .with_batch_capacity(NonZeroUsize::new(capacity).unwrap())
}

// =============================================================================
// OUTPUT
// =============================================================================

/// SQLite storage classes map onto Arrow column types.
#[tokio::test]
async fn test_columnar_from_sqlite() {
    let dir = TempDir::new().unwrap();
    let source = SqliteRowSource::new(create_database(&dir), 2, 16);

    let cursor = source
        .open("SELECT id, sensor, value, raw FROM readings ORDER BY id", None)
        .await
        .unwrap();
    let mut sink = MemorySink::new();
    let summary = StreamDriver::new(options(StreamFormat::Columnar, 2, None))
        .drive(cursor, &mut sink)
        .await
        .unwrap();
    assert_eq!(summary.rows, 3);

    let reader = StreamReader::try_new(Cursor::new(sink.bytes()), None).unwrap();
    let schema = reader.schema();
    assert_eq!(schema.field(0).data_type(), &DataType::Int64);
    assert_eq!(schema.field(1).data_type(), &DataType::Utf8);
    assert_eq!(schema.field(2).data_type(), &DataType::Float64);
    assert_eq!(schema.field(3).data_type(), &DataType::Binary);

    let batches = reader.collect::<Result<Vec<_>, _>>().unwrap();
    assert_eq!(batches.len(), 2);

    let first = &batches[0];
    let id = first.column(0).as_any().downcast_ref::<Int64Array>().unwrap();
    let value = first.column(2).as_any().downcast_ref::<Float64Array>().unwrap();
    let raw = first.column(3).as_any().downcast_ref::<BinaryArray>().unwrap();
    assert_eq!(id.value(1), 2);
    assert!(value.is_null(1));
    assert_eq!(raw.value(0), &[0x01, 0xff]);

    let last = &batches[1];
    let sensor = last.column(1).as_any().downcast_ref::<StringArray>().unwrap();
    assert!(sensor.is_null(0));
}

/// NDJSON output from SQLite, with blobs as base64 and NULL as null.
#[tokio::test]
async fn test_line_from_sqlite() {
    let dir = TempDir::new().unwrap();
    let source = SqliteRowSource::new(create_database(&dir), 2, 16);

    let cursor = source
        .open("SELECT id, raw FROM readings ORDER BY id", None)
        .await
        .unwrap();
    let mut sink = MemorySink::new();
    StreamDriver::new(options(StreamFormat::Line, 100, None))
        .drive(cursor, &mut sink)
        .await
        .unwrap();

    let text = String::from_utf8(sink.bytes()).unwrap();
    assert_eq!(
        text,
        "{\"id\":1,\"raw\":\"Af8=\"}\n{\"id\":2,\"raw\":\"\"}\n{\"id\":3,\"raw\":null}\n"
    );
}

/// An empty result set is a valid, complete stream.
#[tokio::test]
async fn test_empty_result() {
    let dir = TempDir::new().unwrap();
    let source = SqliteRowSource::new(create_database(&dir), 1, 16);

    let cursor = source
        .open("SELECT * FROM readings WHERE id > 100", None)
        .await
        .unwrap();
    let mut sink = MemorySink::new();
    let summary = StreamDriver::new(options(StreamFormat::Columnar, 10, None))
        .drive(cursor, &mut sink)
        .await
        .unwrap();

    assert_eq!(summary.outcome, StreamOutcome::Completed);
    let reader = StreamReader::try_new(Cursor::new(sink.bytes()), None).unwrap();
    assert_eq!(reader.count(), 0);
}

/// NUMERIC affinity stores 1.0 as INTEGER, so the column freezes as Int64 and
/// a later REAL cannot be encoded. Line output is unaffected.
#[tokio::test]
async fn test_numeric_affinity_mixes_integer_and_real() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("numeric.db");
    Connection::open(&path)
        .unwrap()
        .execute_batch("CREATE TABLE t (v NUMERIC); INSERT INTO t VALUES (1.0), (1.5);")
        .unwrap();
    let source = SqliteRowSource::new(path, 1, 8);

    let cursor = source.open("SELECT v FROM t ORDER BY rowid", None).await.unwrap();
    let mut sink = MemorySink::new();
    let err = StreamDriver::new(options(StreamFormat::Columnar, 10, None))
        .drive(cursor, &mut sink)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        StreamError::Encoding(EncodeError::TypeMismatch {
            field: "v".to_string(),
            expected: ValueKind::Integer,
            found: ValueKind::Float,
        })
    );
    assert_eq!(source.available_connections(), 1);

    let cursor = source.open("SELECT v FROM t ORDER BY rowid", None).await.unwrap();
    let mut sink = MemorySink::new();
    StreamDriver::new(options(StreamFormat::Line, 10, None))
        .drive(cursor, &mut sink)
        .await
        .unwrap();
    assert_eq!(String::from_utf8(sink.bytes()).unwrap(), "{\"v\":1}\n{\"v\":1.5}\n");
}

// =============================================================================
// LIMITS, FAILURES AND RESOURCES
// =============================================================================

/// A limit on an unbounded query terminates and frees the connection.
#[tokio::test]
async fn test_limit_on_infinite_query() {
    let dir = TempDir::new().unwrap();
    let source = SqliteRowSource::new(create_database(&dir), 1, 8);

    let cursor = source.open(INFINITE, Some(1000)).await.unwrap();
    let mut sink = MemorySink::new();
    let summary = StreamDriver::new(options(StreamFormat::Columnar, 256, Some(1000)))
        .drive(cursor, &mut sink)
        .await
        .unwrap();

    assert_eq!(summary.rows, 1000);
    assert_eq!(source.available_connections(), 1);
}

/// Cancellation by the sink closes the cursor and releases its connection.
#[tokio::test]
async fn test_cancellation_releases_connection() {
    let dir = TempDir::new().unwrap();
    let source = SqliteRowSource::new(create_database(&dir), 1, 8);

    let cursor = source.open(INFINITE, None).await.unwrap();
    assert_eq!(source.available_connections(), 0);

    let mut sink = MemorySink::rejecting_from(3);
    let summary = StreamDriver::new(options(StreamFormat::Line, 1, None))
        .drive(cursor, &mut sink)
        .await
        .unwrap();

    assert_eq!(summary.outcome, StreamOutcome::Cancelled);
    assert_eq!(summary.rows, 3);
    assert_eq!(source.available_connections(), 1);
}

/// With one connection, a second open is refused until the first cursor closes.
#[tokio::test]
async fn test_connection_budget_is_shared() {
    let dir = TempDir::new().unwrap();
    let source = SqliteRowSource::new(create_database(&dir), 1, 8);

    let first = source.open(INFINITE, None).await.unwrap();
    let refused = tokio::time::timeout(Duration::from_secs(5), source.open("SELECT 1", None))
        .await
        .unwrap();
    assert!(matches!(refused, Err(SourceError::Unavailable(_))));

    first.close().await;
    let mut second = source.open("SELECT 1", None).await.unwrap();
    assert!(second.next().await.unwrap().is_some());
    second.close().await;
}

/// Prepare errors surface from open, before any output exists.
#[tokio::test]
async fn test_invalid_sql_fails_at_open() {
    let dir = TempDir::new().unwrap();
    let source = SqliteRowSource::new(create_database(&dir), 1, 8);

    let result = source.open("SELECT * FROM missing_table", None).await;
    assert!(matches!(result, Err(SourceError::InvalidQuery(_))));
    assert_eq!(source.available_connections(), 1);
}

/// A missing database file is reported as unavailable.
#[tokio::test]
async fn test_missing_database_is_unavailable() {
    let dir = TempDir::new().unwrap();
    let source = SqliteRowSource::new(dir.path().join("absent.db"), 1, 8);

    let result = source.open("SELECT 1", None).await;
    assert!(matches!(result, Err(SourceError::Unavailable(_))));
}

/// Runtime errors after rows were produced abort the stream with a source error.
#[tokio::test]
async fn test_runtime_error_mid_stream() {
    let dir = TempDir::new().unwrap();
    let source = SqliteRowSource::new(create_database(&dir), 1, 8);

    // abs(i64::MIN) overflows on the fourth row
    let sql = "SELECT abs(x) AS v FROM (SELECT 1 AS x UNION ALL SELECT 2 UNION ALL SELECT 3 \
               UNION ALL SELECT -9223372036854775808)";
    let cursor = source.open(sql, None).await.unwrap();
    let mut sink = MemorySink::new();
    let err = StreamDriver::new(options(StreamFormat::Line, 1, None))
        .drive(cursor, &mut sink)
        .await
        .unwrap_err();

    assert!(matches!(err, StreamError::Source(SourceError::Execution(_))));
    assert_eq!(sink.chunks().len(), 3);
    assert_eq!(source.available_connections(), 1);
}
