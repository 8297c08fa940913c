//! Output formats and the encoder contract shared by both of them.

use std::fmt;
use std::num::NonZeroUsize;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::accumulator::Batch;
use super::errors::EncodeResult;

/// Wire format selected once per stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StreamFormat {
    /// Newline-delimited JSON, one object per row
    #[default]
    #[serde(rename = "ndjson", alias = "line")]
    Line,
    /// Arrow IPC stream
    #[serde(rename = "arrow", alias = "columnar")]
    Columnar,
}

impl StreamFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamFormat::Line => "ndjson",
            StreamFormat::Columnar => "arrow",
        }
    }

    /// Content type tag handed to the transport
    pub fn content_type(&self) -> &'static str {
        match self {
            StreamFormat::Line => "application/x-ndjson",
            StreamFormat::Columnar => "application/vnd.apache.arrow.stream",
        }
    }
}

impl fmt::Display for StreamFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for StreamFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ndjson" | "line" => Ok(StreamFormat::Line),
            "arrow" | "columnar" => Ok(StreamFormat::Columnar),
            other => Err(format!(
                "unknown format '{}', expected ndjson or arrow",
                other
            )),
        }
    }
}

/// How the columnar encoder treats rows whose field set differs from the
/// frozen schema. Type mismatches are always errors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaPolicy {
    /// Missing fields become null; fields outside the schema are dropped
    #[default]
    NullFill,
    /// Any missing or extra field fails the stream
    Strict,
}

impl SchemaPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaPolicy::NullFill => "null_fill",
            SchemaPolicy::Strict => "strict",
        }
    }
}

/// Turns batches into frames.
///
/// Implementations append complete frames to `frames`; the driver drains and
/// writes them in order. Nothing is appended when an error is returned.
pub trait FrameEncoder: Send {
    /// Batch size the driver should use. Line output flushes each row
    /// on its own regardless of the requested capacity.
    fn batch_capacity(&self, requested: NonZeroUsize) -> NonZeroUsize;

    fn encode_batch(&mut self, batch: Batch, frames: &mut Vec<Vec<u8>>) -> EncodeResult<()>;

    /// Emit whatever closes the stream. Called once, after the last batch.
    fn finish(&mut self, frames: &mut Vec<Vec<u8>>) -> EncodeResult<()>;

    /// Fields dropped under [`SchemaPolicy::NullFill`] so far
    fn dropped_fields(&self) -> u64 {
        0
    }
}
