//! Dialer opening measured TCP connections.

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;

use crate::config::TCP_CONNECT_TIMEOUT;
use crate::context::Context;
use crate::dialer::{next_conn_id, BoxConn, Dialer, MeasuringConn};
use crate::error_handling::{Error, Result};
use crate::model::MeasurementKind;

/// Connects with `TcpStream` and emits connect-start/connect-done events.
///
/// Each attempt gets a fresh connection id, shared by its events and by the
/// returned [`MeasuringConn`]. `address` must carry an IP literal; use
/// [`ResolvingDialer`](crate::dialer::ResolvingDialer) for hostnames.
#[derive(Debug, Clone)]
pub struct BaseDialer {
    connect_timeout: Duration,
}

impl BaseDialer {
    /// A dialer giving up on a single connect after `connect_timeout`.
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }

    async fn connect(&self, ctx: &Context, network: &str, address: &str) -> Result<TcpStream> {
        match network {
            "tcp" | "tcp4" | "tcp6" => {}
            other => {
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("unsupported network: {other}"),
                )))
            }
        }
        let attempt = tokio::time::timeout(self.connect_timeout, TcpStream::connect(address));
        match ctx.run(attempt).await? {
            Ok(connected) => Ok(connected?),
            Err(_elapsed) => Err(Error::Io(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("dial {network} {address}: i/o timeout"),
            ))),
        }
    }
}

impl Default for BaseDialer {
    fn default() -> Self {
        Self::new(TCP_CONNECT_TIMEOUT)
    }
}

#[async_trait]
impl Dialer for BaseDialer {
    async fn dial_context(&self, ctx: &Context, network: &str, address: &str) -> Result<BoxConn> {
        let root = ctx.root();
        let conn_id = next_conn_id();
        root.emit(
            Some(conn_id),
            MeasurementKind::ConnectStart {
                network: network.to_string(),
                address: address.to_string(),
            },
        );
        let result = self.connect(ctx, network, address).await;
        root.emit(
            Some(conn_id),
            MeasurementKind::ConnectDone {
                network: network.to_string(),
                address: address.to_string(),
                failure: result.as_ref().err().map(Error::failure),
            },
        );
        let stream = result?;
        Ok(Box::new(MeasuringConn::new(stream, conn_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextError;
    use crate::model::{MeasurementRoot, SavingSink};
    use std::sync::Arc;
    use tokio::net::TcpListener;

    fn measured() -> (Context, Arc<SavingSink>) {
        let sink = Arc::new(SavingSink::new());
        let root = Arc::new(MeasurementRoot::new(sink.clone()));
        (Context::background().with_root(root), sink)
    }

    #[tokio::test]
    async fn test_dial_emits_events_with_conn_id() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let (ctx, sink) = measured();

        let conn = BaseDialer::default()
            .dial_context(&ctx, "tcp", &address)
            .await
            .unwrap();
        let conn_id = conn.conn_id();
        assert!(conn_id.is_some());

        let events = sink.read();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.conn_id == conn_id));
        match &events[1].kind {
            MeasurementKind::ConnectDone {
                failure, address: a, ..
            } => {
                assert!(failure.is_none());
                assert_eq!(a, &address);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_refused_connection_is_classified_in_event() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);
        let (ctx, sink) = measured();

        let err = BaseDialer::default()
            .dial_context(&ctx, "tcp", &address)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Io(_)));
        match &sink.read()[1].kind {
            MeasurementKind::ConnectDone { failure, .. } => {
                assert_eq!(failure.as_ref().unwrap().to_string(), "connection_refused");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_cancelled_context_does_not_connect() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let ctx = Context::background();
        ctx.cancel();
        let err = BaseDialer::default()
            .dial_context(&ctx, "tcp", &address)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Context(ContextError::Canceled)));
    }

    #[tokio::test]
    async fn test_unsupported_network() {
        let err = BaseDialer::default()
            .dial_context(&Context::background(), "udp", "127.0.0.1:53")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("unsupported network"));
    }
}
