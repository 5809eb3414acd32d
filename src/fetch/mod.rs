//! The HTTP fetch primitive, plus the line-delimited JSON reader built on
//! top of it.
//!
//! A plain `reqwest::Client`, `bytes_stream()` turned into an `AsyncRead`
//! via `tokio_util::io::StreamReader`, and an explicit `tokio::time::timeout`
//! around the parts that can hang. Data files here are always plain
//! `.jsonl`, so there is no content-negotiation over alternate encodings.

pub mod lines;

use crate::error::FetchError;
use bytes::Bytes;
use futures::{Stream, StreamExt, TryStreamExt};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

/// GETs `url` with `timeout` applied to the first byte of the response, and
/// yields the body as a byte stream. Matches spec.md §4.1's contract exactly:
/// `Aborted` if `cancel` fires first, `Timeout` if no response arrives in
/// time, `NotFound` on 404, `NotAccessible` for any other non-2xx status or
/// transport failure.
pub async fn fetch(
    client: &reqwest::Client,
    url: Url,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<impl Stream<Item = std::io::Result<Bytes>>, FetchError> {
    let request = client.get(url.clone()).send();

    let response = tokio::select! {
        biased;
        () = cancel.cancelled() => return Err(FetchError::Aborted(url)),
        result = tokio::time::timeout(timeout, request) => {
            match result {
                Err(_elapsed) => return Err(FetchError::Timeout(url)),
                Ok(Err(err)) => return Err(FetchError::NotAccessible(url, err.to_string())),
                Ok(Ok(response)) => response,
            }
        }
    };

    if response.status() == reqwest::StatusCode::NOT_FOUND {
        return Err(FetchError::NotFound(url));
    }
    let response = match response.error_for_status() {
        Ok(response) => response,
        Err(err) => return Err(FetchError::NotAccessible(url, err.to_string())),
    };

    // `reqwest` always hands back a (possibly empty) byte stream for a 2xx
    // response; there is no separate "body present?" check to perform. A
    // server that sends headers but then closes the connection mid-body
    // surfaces as a `NotAccessible` through the stream's own `Err` item,
    // handled by callers of this stream.
    Ok(response
        .bytes_stream()
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::Other, err)))
}

/// Collects a URL's whole body into memory, used for the manifest fetch,
/// which is always small. Large per-line data files go through
/// [`lines::LineReader`] instead and are never buffered whole.
pub async fn fetch_bytes(
    client: &reqwest::Client,
    url: Url,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<Bytes, FetchError> {
    let stream = fetch(client, url.clone(), timeout, cancel).await?;
    tokio::pin!(stream);
    let mut buf = Vec::new();
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(FetchError::Aborted(url)),
            chunk = stream.next() => {
                match chunk {
                    Some(Ok(bytes)) => buf.extend_from_slice(&bytes),
                    Some(Err(err)) => return Err(FetchError::NotAccessible(url, err.to_string())),
                    None => break,
                }
            }
        }
    }
    Ok(Bytes::from(buf))
}
