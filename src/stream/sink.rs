//! Output sinks.
//!
//! A sink acknowledges each chunk: `write` resolves only once the chunk has
//! been accepted, which is what paces the driver. A rejected write means the
//! consumer is gone.

use std::future::Future;

use futures_util::stream::{self, Stream};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use super::errors::{SinkError, StreamAbort};

pub trait ChunkSink: Send {
    fn write(&mut self, chunk: Vec<u8>) -> impl Future<Output = Result<(), SinkError>> + Send;

    /// Called once after the final chunk of a successful stream.
    fn finish(&mut self) -> impl Future<Output = Result<(), SinkError>> + Send;
}

/// Item type carried from a [`ChannelSink`] to the transport
pub type ChunkItem = Result<Vec<u8>, StreamAbort>;

/// Sink backed by a bounded channel, for handing chunks to another task.
///
/// With capacity 1 a write completes only after the consumer has taken the
/// previous chunk.
pub struct ChannelSink {
    tx: mpsc::Sender<ChunkItem>,
}

/// Consumer half of a [`ChannelSink`].
pub struct ChunkReceiver {
    rx: mpsc::Receiver<ChunkItem>,
}

impl ChannelSink {
    pub fn channel(capacity: usize) -> (ChannelSink, ChunkReceiver) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (ChannelSink { tx }, ChunkReceiver { rx })
    }

    /// Tell the consumer the stream failed after some chunks were already sent.
    pub async fn abort(&self, reason: impl Into<String>) {
        let _ = self.tx.send(Err(StreamAbort(reason.into()))).await;
    }
}

impl ChunkSink for ChannelSink {
    async fn write(&mut self, chunk: Vec<u8>) -> Result<(), SinkError> {
        self.tx.send(Ok(chunk)).await.map_err(|_| SinkError::Closed)
    }

    async fn finish(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

impl ChunkReceiver {
    /// Adapt into a `Stream`; dropping the stream closes the sink side.
    pub fn into_stream(self) -> impl Stream<Item = ChunkItem> + Send + 'static {
        stream::unfold(self.rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        })
    }
}

/// Sink over any async writer (stdout for exports). Flushes every chunk.
pub struct WriterSink<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin + Send> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: AsyncWrite + Unpin + Send> ChunkSink for WriterSink<W> {
    async fn write(&mut self, chunk: Vec<u8>) -> Result<(), SinkError> {
        self.writer
            .write_all(&chunk)
            .await
            .map_err(|e| SinkError::Io(e.to_string()))?;
        self.writer
            .flush()
            .await
            .map_err(|e| SinkError::Io(e.to_string()))
    }

    async fn finish(&mut self) -> Result<(), SinkError> {
        self.writer
            .flush()
            .await
            .map_err(|e| SinkError::Io(e.to_string()))
    }
}

/// Sink that keeps every chunk in memory, optionally rejecting from the
/// n-th write (1-based) on.
#[derive(Debug, Default)]
pub struct MemorySink {
    chunks: Vec<Vec<u8>>,
    reject_from: Option<usize>,
    writes: usize,
    finished: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rejecting_from(write: usize) -> Self {
        Self {
            reject_from: Some(write),
            ..Self::default()
        }
    }

    pub fn chunks(&self) -> &[Vec<u8>] {
        &self.chunks
    }

    /// All accepted chunks concatenated
    pub fn bytes(&self) -> Vec<u8> {
        self.chunks.concat()
    }

    /// Write attempts, including rejected ones
    pub fn writes(&self) -> usize {
        self.writes
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl ChunkSink for MemorySink {
    async fn write(&mut self, chunk: Vec<u8>) -> Result<(), SinkError> {
        self.writes += 1;
        if self.reject_from.is_some_and(|n| self.writes >= n) {
            return Err(SinkError::Closed);
        }
        self.chunks.push(chunk);
        Ok(())
    }

    async fn finish(&mut self) -> Result<(), SinkError> {
        self.finished = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    #[tokio::test]
    async fn test_channel_sink_delivers_in_order() {
        let (mut sink, receiver) = ChannelSink::channel(4);
        sink.write(b"one".to_vec()).await.unwrap();
        sink.write(b"two".to_vec()).await.unwrap();
        drop(sink);

        let items: Vec<ChunkItem> = receiver.into_stream().collect().await;
        assert_eq!(items, vec![Ok(b"one".to_vec()), Ok(b"two".to_vec())]);
    }

    #[tokio::test]
    async fn test_channel_sink_rejects_after_receiver_drop() {
        let (mut sink, receiver) = ChannelSink::channel(1);
        drop(receiver);
        assert_eq!(sink.write(b"x".to_vec()).await, Err(SinkError::Closed));
    }

    #[tokio::test]
    async fn test_abort_reaches_consumer() {
        let (mut sink, receiver) = ChannelSink::channel(2);
        sink.write(b"partial".to_vec()).await.unwrap();
        sink.abort("source failed").await;
        drop(sink);

        let items: Vec<ChunkItem> = receiver.into_stream().collect().await;
        assert_eq!(
            items,
            vec![
                Ok(b"partial".to_vec()),
                Err(StreamAbort("source failed".to_string()))
            ]
        );
    }

    #[tokio::test]
    async fn test_writer_sink() {
        let mut sink = WriterSink::new(Vec::new());
        sink.write(b"a\n".to_vec()).await.unwrap();
        sink.write(b"b\n".to_vec()).await.unwrap();
        sink.finish().await.unwrap();
        assert_eq!(sink.into_inner(), b"a\nb\n");
    }

    #[tokio::test]
    async fn test_memory_sink_rejection() {
        let mut sink = MemorySink::rejecting_from(2);
        assert!(sink.write(b"1".to_vec()).await.is_ok());
        assert!(sink.write(b"2".to_vec()).await.is_err());
        assert_eq!(sink.chunks().len(), 1);
        assert_eq!(sink.writes(), 2);
    }
}
