//! Streaming object downloads

use crate::types::ObjectDescriptor;
use crate::{ClientError, Result};
use bytes::{Bytes, BytesMut};
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Body of a GET response, read chunk by chunk.
///
/// Memory use is bounded by the chunk size, not the object size. Dropping
/// the stream early closes the underlying connection.
pub struct ObjectStream {
    info: ObjectDescriptor,
    content_range: Option<String>,
    expected_len: Option<u64>,
    inner: BoxStream<'static, reqwest::Result<Bytes>>,
}

impl ObjectStream {
    pub(crate) fn new(
        info: ObjectDescriptor,
        content_range: Option<String>,
        response: reqwest::Response,
    ) -> Self {
        Self {
            info,
            content_range,
            expected_len: response.content_length(),
            inner: response.bytes_stream().boxed(),
        }
    }

    /// Metadata from the response headers
    pub fn info(&self) -> &ObjectDescriptor {
        &self.info
    }

    /// `Content-Range` of a ranged read
    pub fn content_range(&self) -> Option<&str> {
        self.content_range.as_deref()
    }

    /// Number of bytes the response declared
    pub fn content_length(&self) -> Option<u64> {
        self.expected_len
    }

    /// Read the whole body into memory
    pub async fn bytes(mut self) -> Result<Bytes> {
        let capacity = self.expected_len.unwrap_or(0).min(8 * 1024 * 1024) as usize;
        let mut buf = BytesMut::with_capacity(capacity);
        while let Some(chunk) = self.next().await {
            buf.extend_from_slice(&chunk?);
        }
        self.check_len(buf.len() as u64)?;
        Ok(buf.freeze())
    }

    /// Copy the body into `writer`, returning the number of bytes written
    pub async fn write_to<W>(mut self, writer: &mut W) -> Result<u64>
    where
        W: AsyncWrite + Unpin,
    {
        let mut written = 0u64;
        while let Some(chunk) = self.next().await {
            let chunk = chunk?;
            writer.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        writer.flush().await?;
        self.check_len(written)?;
        Ok(written)
    }

    fn check_len(&self, received: u64) -> Result<()> {
        match self.expected_len {
            Some(expected) if expected != received => Err(ClientError::Integrity(format!(
                "received {} bytes of {}, expected {}",
                received, self.info.key, expected
            ))),
            _ => Ok(()),
        }
    }
}

impl Stream for ObjectStream {
    type Item = Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner
            .poll_next_unpin(cx)
            .map(|chunk| chunk.map(|r| r.map_err(ClientError::from)))
    }
}

impl fmt::Debug for ObjectStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectStream")
            .field("info", &self.info)
            .field("content_range", &self.content_range)
            .field("expected_len", &self.expected_len)
            .finish_non_exhaustive()
    }
}
