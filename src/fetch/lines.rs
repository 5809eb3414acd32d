//! Turns a byte stream into a lazy sequence of parsed JSON values, one per
//! non-empty line.
//!
//! The underlying `AsyncRead` (via `tokio_util::io::StreamReader`) is framed
//! with `tokio_util::codec::LinesCodec`, which already handles
//! `\n`/`\r\n`/`\r` terminators, UTF-8-safe buffering across chunk
//! boundaries, and an unterminated final line — exactly the contract
//! spec.md §4.2 asks for, so there is no hand-rolled line splitter here.

use crate::error::LineReaderError;
use bytes::Bytes;
use futures::Stream;
use std::time::Duration;
use tokio_util::codec::{FramedRead, LinesCodec};
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;

/// A lazy reader over line-delimited JSON, releasing the underlying stream
/// as soon as an error or end-of-stream is observed.
pub struct LineReader<S> {
    inner: FramedRead<StreamReader<S, Bytes>, LinesCodec>,
    timeout: Duration,
    line_no: u64,
}

impl<S> LineReader<S>
where
    S: Stream<Item = std::io::Result<Bytes>> + Unpin,
{
    pub fn new(stream: S, timeout: Duration) -> Self {
        Self {
            inner: FramedRead::new(StreamReader::new(stream), LinesCodec::new_with_max_length(
                16 * 1024 * 1024,
            )),
            timeout,
            line_no: 0,
        }
    }

    /// Returns the next non-empty line parsed as JSON, or `None` at
    /// end-of-stream. Observes `cancel` between lines and applies `timeout`
    /// to each underlying read, per spec.md §4.2/§5.
    pub async fn next_record(
        &mut self,
        cancel: &CancellationToken,
    ) -> Option<Result<serde_json::Value, LineReaderError>> {
        use futures::StreamExt;

        loop {
            if cancel.is_cancelled() {
                return Some(Err(LineReaderError::Aborted));
            }

            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => return Some(Err(LineReaderError::Aborted)),
                result = tokio::time::timeout(self.timeout, self.inner.next()) => result,
            };

            let line = match next {
                Err(_elapsed) => return Some(Err(LineReaderError::Timeout)),
                Ok(None) => return None,
                Ok(Some(Err(err))) => return Some(Err(LineReaderError::Io(err.to_string()))),
                Ok(Some(Ok(line))) => line,
            };

            self.line_no += 1;
            if line.trim().is_empty() {
                continue;
            }

            return Some(
                serde_json::from_str(&line)
                    .map_err(|source| LineReaderError::InvalidJson {
                        line: self.line_no,
                        source,
                    }),
            );
        }
    }
}
