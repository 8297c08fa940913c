//! Line encoder: one compact JSON object per row, newline terminated.

use std::num::NonZeroUsize;

use super::accumulator::Batch;
use super::errors::EncodeResult;
use super::format::FrameEncoder;
use crate::row::Row;

/// Stateless NDJSON encoder.
#[derive(Debug, Default)]
pub struct LineEncoder;

impl LineEncoder {
    pub fn new() -> Self {
        Self
    }

    /// Serialize one row. JSON string escaping guarantees the only raw
    /// newline in the output is the terminator.
    pub fn encode_row(&self, row: &Row) -> EncodeResult<Vec<u8>> {
        let mut buf = Vec::with_capacity(32 + row.len() * 16);
        serde_json::to_writer(&mut buf, row)?;
        buf.push(b'\n');
        Ok(buf)
    }
}

impl FrameEncoder for LineEncoder {
    fn batch_capacity(&self, _requested: NonZeroUsize) -> NonZeroUsize {
        NonZeroUsize::MIN
    }

    fn encode_batch(&mut self, batch: Batch, frames: &mut Vec<Vec<u8>>) -> EncodeResult<()> {
        let encoded = batch
            .rows()
            .iter()
            .map(|row| self.encode_row(row))
            .collect::<EncodeResult<Vec<_>>>()?;
        frames.extend(encoded);
        Ok(())
    }

    fn finish(&mut self, _frames: &mut Vec<Vec<u8>>) -> EncodeResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::Value;

    #[test]
    fn test_encode_row() {
        let row = Row::from_pairs([("a", Value::from(1i64)), ("b", Value::from("x"))]);
        let chunk = LineEncoder::new().encode_row(&row).unwrap();
        assert_eq!(chunk, b"{\"a\":1,\"b\":\"x\"}\n");
    }

    #[test]
    fn test_embedded_newlines_are_escaped() {
        let row = Row::from_pairs([("note", Value::from("line1\nline2\r\n"))]);
        let chunk = LineEncoder::new().encode_row(&row).unwrap();

        assert_eq!(chunk.iter().filter(|b| **b == b'\n').count(), 1);
        assert_eq!(chunk.last(), Some(&b'\n'));

        let parsed: serde_json::Value = serde_json::from_slice(&chunk).unwrap();
        assert_eq!(parsed["note"], "line1\nline2\r\n");
    }

    #[test]
    fn test_empty_row() {
        let chunk = LineEncoder::new().encode_row(&Row::default()).unwrap();
        assert_eq!(chunk, b"{}\n");
    }

    #[test]
    fn test_batch_produces_one_frame_per_row() {
        let mut encoder = LineEncoder::new();
        let batch = Batch::new(
            0,
            vec![
                Row::from_pairs([("n", 1i64)]),
                Row::from_pairs([("n", 2i64)]),
            ],
        );
        let mut frames = Vec::new();
        encoder.encode_batch(batch, &mut frames).unwrap();
        encoder.finish(&mut frames).unwrap();
        assert_eq!(frames, vec![b"{\"n\":1}\n".to_vec(), b"{\"n\":2}\n".to_vec()]);
    }

    #[test]
    fn test_always_flushes_per_row() {
        let requested = NonZeroUsize::new(1000).unwrap();
        assert_eq!(LineEncoder::new().batch_capacity(requested).get(), 1);
    }
}
