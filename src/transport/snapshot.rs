//! Response body snapshots.

use std::io;
use std::pin::Pin;
use std::task::{Context as TaskContext, Poll};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};

use crate::config::DEFAULT_SNAPSHOT_SIZE;
use crate::context::ContextError;
use crate::error_handling::Result;
use crate::model::EventBuffer;
use crate::transport::{Body, Request, Response, Transport};

/// Bounded prefix of one response body.
#[derive(Debug, Clone)]
pub struct BodySnapshot {
    /// Captured bytes, at most the configured snapshot size
    pub data: Bytes,
    /// Error hit while capturing, if any
    pub error: Option<String>,
    /// When the capture finished
    pub captured_at: DateTime<Utc>,
    /// Request URL
    pub url: String,
}

/// Captures a bounded prefix of every successful response body.
///
/// The caller still reads the whole body: the captured prefix is replayed
/// before the rest of the stream. When capturing fails, every read of the
/// returned body fails with the capture error. Cancellation during the
/// capture fails the round trip with the context error and takes no snapshot.
#[derive(Debug)]
pub struct SnapshotSaverTransport<T> {
    inner: T,
    snapshot_size: usize,
    snapshots: EventBuffer<BodySnapshot>,
}

impl<T> SnapshotSaverTransport<T> {
    /// Wraps `inner`, capturing up to 256 KiB per body.
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            snapshot_size: DEFAULT_SNAPSHOT_SIZE,
            snapshots: EventBuffer::new(),
        }
    }

    /// Sets the capture limit; `0` restores the default.
    pub fn with_snapshot_size(mut self, size: usize) -> Self {
        self.snapshot_size = if size == 0 {
            DEFAULT_SNAPSHOT_SIZE
        } else {
            size
        };
        self
    }

    /// Returns the snapshots taken since the last call.
    pub fn snapshots(&self) -> Vec<BodySnapshot> {
        self.snapshots.drain()
    }
}

#[async_trait]
impl<T: Transport> Transport for SnapshotSaverTransport<T> {
    async fn round_trip(&self, req: Request) -> Result<Response> {
        let ctx = req.context().clone();
        let mut resp = self.inner.round_trip(req).await?;

        let mut data = Vec::new();
        let outcome = ctx
            .run((&mut resp.body).take(self.snapshot_size as u64).read_to_end(&mut data))
            .await
            .unwrap_or_else(|err| Err(io::Error::other(err)));
        if let Some(err) = outcome.as_ref().err().and_then(context_error) {
            return Err(err.into());
        }
        let data = Bytes::from(data);

        let error = match outcome {
            Ok(_) => {
                let rest = std::mem::replace(&mut resp.body, Body::empty());
                resp.body = Body::from_reader(io::Cursor::new(data.clone()).chain(rest));
                None
            }
            Err(e) => {
                log::debug!("Failed to snapshot body of {}: {e}", resp.url);
                let message = e.to_string();
                resp.body = Body::from_reader(FailedBody {
                    kind: e.kind(),
                    message: message.clone(),
                });
                Some(message)
            }
        };

        self.snapshots.push(BodySnapshot {
            data,
            error,
            captured_at: Utc::now(),
            url: resp.url.to_string(),
        });
        Ok(resp)
    }

    fn close_idle_connections(&self) {
        self.inner.close_idle_connections()
    }
}

/// The context error an interrupted read carries, if any.
fn context_error(err: &io::Error) -> Option<ContextError> {
    err.get_ref()?.downcast_ref::<ContextError>().copied()
}

/// Body whose every read fails with the same error.
struct FailedBody {
    kind: io::ErrorKind,
    message: String,
}

impl AsyncRead for FailedBody {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut TaskContext<'_>,
        _buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Poll::Ready(Err(io::Error::new(self.kind, self.message.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::{Method, StatusCode, Version};

    /// Answers every request with a freshly built body.
    struct FixedBody(fn() -> Body);

    #[async_trait]
    impl Transport for FixedBody {
        async fn round_trip(&self, req: Request) -> Result<Response> {
            Ok(Response {
                status: StatusCode::OK,
                version: Version::HTTP_11,
                headers: Default::default(),
                body: (self.0)(),
                url: req.url,
                conn_id: Some(7),
            })
        }
    }

    /// Yields a few bytes, then fails.
    struct BrokenReader {
        sent: bool,
    }

    impl AsyncRead for BrokenReader {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut TaskContext<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            if self.sent {
                return Poll::Ready(Err(io::Error::new(
                    io::ErrorKind::ConnectionReset,
                    "connection reset by peer",
                )));
            }
            self.sent = true;
            buf.put_slice(b"abc");
            Poll::Ready(Ok(()))
        }
    }

    fn request() -> Request {
        Request::parse(Method::GET, "http://example.com/index.html").unwrap()
    }

    #[tokio::test]
    async fn test_snapshot_is_bounded_and_body_is_complete() {
        let txp = SnapshotSaverTransport::new(FixedBody(|| Body::from_bytes("0123456789")))
            .with_snapshot_size(4);
        let resp = txp.round_trip(request()).await.unwrap();
        assert_eq!(resp.body.text().await.unwrap(), "0123456789");

        let snapshots = txp.snapshots();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(&snapshots[0].data[..], b"0123");
        assert!(snapshots[0].error.is_none());
        assert_eq!(snapshots[0].url, "http://example.com/index.html");
        assert!(txp.snapshots().is_empty());
    }

    #[tokio::test]
    async fn test_short_body_is_captured_whole() {
        let txp = SnapshotSaverTransport::new(FixedBody(|| Body::from_bytes("tiny")));
        let resp = txp.round_trip(request()).await.unwrap();
        assert_eq!(resp.body.text().await.unwrap(), "tiny");
        assert_eq!(&txp.snapshots()[0].data[..], b"tiny");
    }

    #[tokio::test]
    async fn test_capture_error_is_replayed() {
        let txp = SnapshotSaverTransport::new(FixedBody(|| {
            Body::from_reader(BrokenReader { sent: false })
        }));
        let mut resp = txp.round_trip(request()).await.unwrap();

        let mut buf = [0u8; 8];
        for _ in 0..2 {
            let err = resp.body.read(&mut buf).await.unwrap_err();
            assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
        }

        let snapshots = txp.snapshots();
        assert_eq!(&snapshots[0].data[..], b"abc");
        assert_eq!(
            snapshots[0].error.as_deref(),
            Some("connection reset by peer")
        );
    }

    /// Never produces a byte.
    struct StalledReader;

    impl AsyncRead for StalledReader {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut TaskContext<'_>,
            _buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            Poll::Pending
        }
    }

    #[tokio::test]
    async fn test_cancel_interrupts_capture() {
        let txp = SnapshotSaverTransport::new(FixedBody(|| Body::from_reader(StalledReader)));
        let ctx = crate::context::Context::background();
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let err = txp
            .round_trip(request().with_context(ctx))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "context canceled");
        assert!(err.is_cancellation());
        assert!(txp.snapshots().is_empty());
    }

    #[test]
    fn test_zero_size_means_default() {
        let txp = SnapshotSaverTransport::new(FixedBody(Body::empty)).with_snapshot_size(0);
        assert_eq!(txp.snapshot_size, DEFAULT_SNAPSHOT_SIZE);
    }
}
