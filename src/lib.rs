//! querystream - stream SQL query results over HTTP
//!
//! Rows are pulled one at a time from a [`source::RowCursor`], grouped into
//! batches and written as NDJSON lines or Arrow IPC stream frames. Every chunk
//! waits for the consumer before the next row is pulled, so memory is bounded
//! by one batch no matter how large the result is.

pub mod cli;
pub mod http_server;
pub mod observability;
pub mod row;
pub mod source;
pub mod stream;
