//! # Stream Module
//!
//! Turns a row cursor into a sequence of output chunks.
//!
//! ```text
//! RowCursor -> BatchAccumulator -> FrameEncoder (line | columnar) -> ChunkSink
//! ```
//!
//! The driver pulls one row at a time and waits on each sink write, so memory
//! stays bounded by one batch plus one encoded frame regardless of result size.

mod accumulator;
mod columnar;
mod driver;
mod errors;
mod format;
mod line;
mod schema;
mod sink;

pub use accumulator::{Batch, BatchAccumulator, DEFAULT_BATCH_CAPACITY};
pub use columnar::{ColumnarEncoder, ColumnarPhase};
pub use driver::{is_source_failure, StreamDriver, StreamOptions, StreamOutcome, StreamSummary};
pub use errors::{EncodeError, EncodeResult, SinkError, StreamAbort, StreamError, StreamResult};
pub use format::{FrameEncoder, SchemaPolicy, StreamFormat};
pub use line::LineEncoder;
pub use schema::{Schema, SchemaField, SchemaInferencer};
pub use sink::{ChannelSink, ChunkItem, ChunkReceiver, ChunkSink, MemorySink, WriterSink};
