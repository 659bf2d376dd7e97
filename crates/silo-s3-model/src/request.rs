//! Streaming request payloads.
//!
//! [`PayloadStream`] carries an object body through the gateway without ever
//! materializing it: the transport produces frames, the object layer
//! consumes them exactly once. Size travels separately (`Content-Length`,
//! with `-1` for unknown) so the layer can detect short reads.

use std::fmt;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::stream::{self, Stream};

/// A once-consumable stream of payload bytes.
pub struct PayloadStream {
    inner: Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send + 'static>>,
}

impl PayloadStream {
    /// Wrap an arbitrary byte stream.
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = io::Result<Bytes>> + Send + 'static,
    {
        Self {
            inner: Box::pin(stream),
        }
    }

    /// A stream yielding a single chunk; used by tests and the copy path.
    #[must_use]
    pub fn from_bytes(bytes: Bytes) -> Self {
        Self::new(stream::once(async move { Ok(bytes) }))
    }

    /// A stream yielding nothing.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(stream::empty())
    }

    /// Drain the stream into one buffer.
    ///
    /// Only backends that cannot accept a stream should call this; the
    /// gateway itself never does.
    ///
    /// # Errors
    ///
    /// Returns the first I/O error produced by the underlying stream.
    pub async fn collect(mut self) -> io::Result<Bytes> {
        use futures::StreamExt;

        let mut buf = Vec::new();
        while let Some(chunk) = self.inner.next().await {
            buf.extend_from_slice(&chunk?);
        }
        Ok(Bytes::from(buf))
    }
}

impl Stream for PayloadStream {
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl fmt::Debug for PayloadStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PayloadStream")
    }
}
