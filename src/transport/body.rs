//! Streaming response bodies.

use std::fmt;
use std::io;
use std::pin::Pin;
use std::task::{Context as TaskContext, Poll};

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};

/// A response body read incrementally from its source.
pub struct Body {
    inner: Pin<Box<dyn AsyncRead + Send>>,
}

impl Body {
    /// A body with no content.
    pub fn empty() -> Self {
        Self::from_bytes(Bytes::new())
    }

    /// A body replaying `bytes`.
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        Self::from_reader(io::Cursor::new(bytes.into()))
    }

    /// A body streaming from `reader`.
    pub fn from_reader<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + 'static,
    {
        Self {
            inner: Box::pin(reader),
        }
    }

    /// Reads the whole body.
    ///
    /// # Errors
    ///
    /// Returns the first error the underlying source reports.
    pub async fn bytes(mut self) -> io::Result<Bytes> {
        let mut data = Vec::new();
        self.read_to_end(&mut data).await?;
        Ok(Bytes::from(data))
    }

    /// Reads the whole body as text, replacing invalid UTF-8.
    ///
    /// # Errors
    ///
    /// Returns the first error the underlying source reports.
    pub async fn text(self) -> io::Result<String> {
        let bytes = self.bytes().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

impl AsyncRead for Body {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut TaskContext<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        self.inner.as_mut().poll_read(cx, buf)
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Body").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bytes_body() {
        let body = Body::from_bytes("hello");
        assert_eq!(body.bytes().await.unwrap(), Bytes::from_static(b"hello"));
        assert!(Body::empty().bytes().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_text_is_lossy() {
        let body = Body::from_bytes(vec![b'o', b'k', 0xff]);
        assert_eq!(body.text().await.unwrap(), "ok\u{fffd}");
    }
}
