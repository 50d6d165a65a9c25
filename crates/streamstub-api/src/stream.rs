//! Chunk emission: buffer one line, flush it as its own body frame, repeat.

use std::convert::Infallible;

use axum::body::{Body, Bytes};
use serde::Serialize;
use streamstub_common::{Result, StubError};
use streamstub_obs::StreamMetrics;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::params::StreamParams;
use crate::record::{ChunkRecord, UsageLine};

/// One frame in flight at a time, so a slow reader stalls the producer.
pub const BODY_CHANNEL_CAPACITY: usize = 1;

/// Largest run of `delta` spaces held in memory at once. Longer deltas go out
/// as several frames, the line's closing frame flushed last.
pub const MAX_DELTA_BLOCK: usize = 64 * 1024;

pub type Frame = core::result::Result<Bytes, Infallible>;

/// Line writer over the response body channel.
///
/// `write_json` and `write_raw` only buffer; nothing reaches the connection
/// until `flush`.
pub struct ChunkWriter {
    tx: mpsc::Sender<Frame>,
    buf: Vec<u8>,
}

impl ChunkWriter {
    pub fn channel() -> (Self, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(BODY_CHANNEL_CAPACITY);
        (Self { tx, buf: Vec::new() }, rx)
    }

    /// Appends `value` as one JSON line to the pending buffer.
    pub fn write_json<T: Serialize>(&mut self, value: &T) -> Result<()> {
        serde_json::to_writer(&mut self.buf, value)?;
        self.buf.push(b'\n');
        Ok(())
    }

    /// Appends raw bytes to the pending buffer.
    pub fn write_raw(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Hands the buffered bytes to the transport as a single frame and returns
    /// how many were sent. Fails with `ClientGone` once the body is dropped.
    pub async fn flush(&mut self) -> Result<usize> {
        if self.buf.is_empty() {
            return Ok(0);
        }
        let next = Vec::with_capacity(self.buf.capacity());
        let frame = Bytes::from(std::mem::replace(&mut self.buf, next));
        let n = frame.len();
        self.tx.send(Ok(frame)).await.map_err(|_| StubError::ClientGone)?;
        Ok(n)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmitSummary {
    pub chunks: usize,
    pub bytes: usize,
}

/// Writes `params.chunks` content lines, flushing after each and sleeping
/// `delay_ms` after every flush (the last content line included), then the
/// usage line.
pub async fn emit(params: StreamParams, out: &mut ChunkWriter, metrics: &StreamMetrics) -> Result<EmitSummary> {
    let block = " ".repeat(params.bytes_per_chunk.min(MAX_DELTA_BLOCK));
    let delay = params.delay();
    let mut summary = EmitSummary::default();

    for i in 0..params.chunks {
        let n = write_chunk(out, &block, params.bytes_per_chunk, i).await?;
        summary.chunks += 1;
        summary.bytes += n;
        metrics.chunk_flushed();
        metrics.bytes_flushed(n);
        if let Some(d) = delay {
            tokio::time::sleep(d).await;
        }
    }

    out.write_json(&UsageLine::STUB)?;
    let n = out.flush().await?;
    summary.bytes += n;
    metrics.bytes_flushed(n);
    Ok(summary)
}

/// Writes and flushes content line `i`. A delta that fits in `block` is one
/// serialized record; a longer one is streamed block by block so memory stays
/// bounded whatever `bytes_per_chunk` is.
async fn write_chunk(out: &mut ChunkWriter, block: &str, bytes_per_chunk: usize, i: usize) -> Result<usize> {
    if bytes_per_chunk <= block.len() {
        out.write_json(&ChunkRecord { delta: block, i })?;
        return out.flush().await;
    }

    let mut sent = 0;
    out.write_raw(br#"{"delta":""#);
    let mut left = bytes_per_chunk;
    while left > 0 {
        let take = left.min(block.len());
        out.write_raw(&block.as_bytes()[..take]);
        sent += out.flush().await?;
        left -= take;
    }
    out.write_raw(format!("\",\"i\":{}}}\n", i).as_bytes());
    sent += out.flush().await?;
    Ok(sent)
}

/// Spawns the producer for one request and returns the body it feeds.
pub fn spawn_stream(params: StreamParams, metrics: StreamMetrics) -> Body {
    let (mut writer, rx) = ChunkWriter::channel();
    tokio::spawn(async move {
        match emit(params, &mut writer, &metrics).await {
            Ok(summary) => {
                tracing::debug!(target: "api", chunks = summary.chunks, bytes = summary.bytes, "stream complete");
            }
            Err(StubError::ClientGone) => {
                metrics.stream_aborted();
                tracing::debug!(target: "api", "client disconnected mid-stream");
            }
            Err(e) => tracing::warn!(target: "api", "stream failed: {}", e),
        }
    });
    Body::from_stream(ReceiverStream::new(rx))
}
