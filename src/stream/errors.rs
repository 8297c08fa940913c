//! # Stream Errors
//!
//! Error types for encoding, sinks and the stream driver.

use arrow::error::ArrowError;
use thiserror::Error;

use crate::row::ValueKind;
use crate::source::SourceError;

/// Result type for encoder operations
pub type EncodeResult<T> = Result<T, EncodeError>;

/// Result type for a driven stream
pub type StreamResult<T> = Result<T, StreamError>;

/// A row could not be serialized or coerced to the frozen schema.
///
/// Encoding errors fail the whole stream; offending fields are never
/// skipped or null-filled on type grounds.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EncodeError {
    /// The value kind has no columnar representation
    #[error("Field '{field}' has kind {kind}, which cannot be encoded as a column")]
    UnsupportedKind { field: String, kind: ValueKind },

    /// Value kind differs from the frozen column type
    #[error("Field '{field}' expected {expected}, found {found}")]
    TypeMismatch {
        field: String,
        expected: ValueKind,
        found: ValueKind,
    },

    /// Strict schema policy: a schema field is absent from a row
    #[error("Row is missing field '{0}' of the frozen schema")]
    MissingField(String),

    /// Strict schema policy: a row carries a field outside the schema
    #[error("Row has field '{0}' that is not part of the frozen schema")]
    UnexpectedField(String),

    /// Text serialization failed
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Arrow IPC writer failure
    #[error("Arrow error: {0}")]
    Arrow(String),

    /// The encoder was used after its trailer was written
    #[error("Encoder already closed")]
    Closed,
}

impl From<ArrowError> for EncodeError {
    fn from(err: ArrowError) -> Self {
        EncodeError::Arrow(err.to_string())
    }
}

impl From<serde_json::Error> for EncodeError {
    fn from(err: serde_json::Error) -> Self {
        EncodeError::Serialization(err.to_string())
    }
}

/// The sink refused a chunk. Treated as cancellation, not as a failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SinkError {
    /// Receiver side is gone (client disconnected)
    #[error("Sink closed")]
    Closed,

    /// Underlying writer failed
    #[error("Sink write failed: {0}")]
    Io(String),
}

/// Failures surfaced by the stream driver.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StreamError {
    #[error("Row source failed: {0}")]
    Source(#[from] SourceError),

    #[error("Encoding failed: {0}")]
    Encoding(#[from] EncodeError),
}

/// Error placed on a transport channel to abort a response mid-body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Stream aborted: {0}")]
pub struct StreamAbort(pub String);
