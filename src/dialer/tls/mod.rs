//! TLS dialing on top of any [`Dialer`].
//!
//! The dialer connects with a bounded connect timeout, then performs the
//! handshake under a deadline that is the earlier of the handshake timeout
//! and the context deadline. On failure the raw connection is shut down; on
//! success the deadline is cleared before the connection is returned.

mod extract;

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context as TaskContext, Poll};
use std::time::Duration;

use async_trait::async_trait;
use rustls::pki_types::ServerName;
use rustls::ClientConfig;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::time::Instant;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;

use crate::config::{TLS_CONNECT_TIMEOUT, TLS_HANDSHAKE_TIMEOUT};
use crate::context::Context;
use crate::dialer::{BoxConn, Connection, Dialer, TlsDialer};
use crate::error_handling::{classify_result, default_table, Error, Result};
use crate::model::{MeasurementKind, TlsConnectionState};
use crate::utils::split_host_port;

pub(crate) use extract::connection_state;
pub use extract::summarize_certificate;

/// Performs TLS handshakes with rustls over connections from `dialer`.
pub struct RustlsDialer<D> {
    dialer: D,
    config: Arc<ClientConfig>,
    server_name: Option<String>,
    connect_timeout: Duration,
    handshake_timeout: Duration,
}

impl<D> RustlsDialer<D> {
    /// Handshakes with `config` over connections from `dialer`, using the
    /// default connect (30s) and handshake (10s) timeouts.
    pub fn new(dialer: D, config: Arc<ClientConfig>) -> Self {
        Self {
            dialer,
            config,
            server_name: None,
            connect_timeout: TLS_CONNECT_TIMEOUT,
            handshake_timeout: TLS_HANDSHAKE_TIMEOUT,
        }
    }

    /// Sends `name` as SNI instead of the host part of the dialed address.
    pub fn with_server_name(mut self, name: Option<String>) -> Self {
        self.server_name = name;
        self
    }

    /// Overrides the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Overrides the handshake timeout.
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }
}

impl<D: Dialer> RustlsDialer<D> {
    async fn handshake(
        &self,
        ctx: &Context,
        mut conn: BoxConn,
        sni: &str,
        server_name: ServerName<'static>,
    ) -> Result<BoxConn> {
        let conn_id = conn.conn_id();
        let handshake_deadline = Instant::now() + self.handshake_timeout;
        let deadline = match ctx.deadline() {
            Some(at) if at < handshake_deadline => at,
            _ => handshake_deadline,
        };
        conn.set_deadline(Some(deadline));

        let root = ctx.root();
        root.emit(
            conn_id,
            MeasurementKind::TlsHandshakeStart {
                sni: sni.to_string(),
            },
        );

        let connector = TlsConnector::from(Arc::clone(&self.config));
        let outcome = ctx
            .run(connector.connect(server_name, conn).into_fallible())
            .await;
        let result = match outcome {
            Ok(Ok(mut stream)) => {
                stream.get_mut().0.set_deadline(None);
                let state = connection_state(stream.get_ref().1);
                Ok(TlsConn { stream, state })
            }
            Ok(Err((err, mut raw))) => {
                if let Err(e) = raw.shutdown().await {
                    log::debug!("Failed to close connection after TLS failure: {e}");
                }
                Err(default_table().wrap(Error::Io(err), "tls_handshake", conn_id))
            }
            // The half-finished stream was dropped with the future, closing it.
            Err(ctx_err) => Err(Error::Context(ctx_err)),
        };

        root.emit(
            conn_id,
            MeasurementKind::TlsHandshakeDone {
                state: result.as_ref().ok().map(|conn| conn.state.clone()),
                failure: result.as_ref().err().map(Error::failure),
            },
        );
        Ok(Box::new(result?))
    }
}

#[async_trait]
impl<D: Dialer> TlsDialer for RustlsDialer<D> {
    async fn dial_tls_context(
        &self,
        ctx: &Context,
        network: &str,
        address: &str,
    ) -> Result<BoxConn> {
        let (host, _port) =
            classify_result(split_host_port(address).map_err(Error::from), "split_host_port", None)?;
        let sni = self.server_name.clone().unwrap_or(host);
        let server_name = classify_result(
            ServerName::try_from(sni.clone()).map_err(Error::other),
            "tls_handshake",
            None,
        )?;

        let connect_ctx = ctx.with_timeout(self.connect_timeout);
        let conn = self.dialer.dial_context(&connect_ctx, network, address).await?;
        self.handshake(ctx, conn, &sni, server_name).await
    }
}

impl<D> fmt::Debug for RustlsDialer<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RustlsDialer")
            .field("server_name", &self.server_name)
            .field("connect_timeout", &self.connect_timeout)
            .field("handshake_timeout", &self.handshake_timeout)
            .finish_non_exhaustive()
    }
}

/// A connection after a successful TLS handshake.
pub struct TlsConn {
    stream: TlsStream<BoxConn>,
    state: TlsConnectionState,
}

impl TlsConn {
    /// Parameters negotiated during the handshake.
    pub fn state(&self) -> &TlsConnectionState {
        &self.state
    }
}

impl fmt::Debug for TlsConn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsConn")
            .field("inner", self.stream.get_ref().0)
            .field("state", &self.state)
            .finish()
    }
}

impl AsyncRead for TlsConn {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut TaskContext<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().stream).poll_read(cx, buf)
    }
}

impl AsyncWrite for TlsConn {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut TaskContext<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().stream).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().stream).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().stream).poll_shutdown(cx)
    }
}

impl Connection for TlsConn {
    fn conn_id(&self) -> Option<i64> {
        self.stream.get_ref().0.conn_id()
    }

    fn set_deadline(&mut self, deadline: Option<Instant>) {
        self.stream.get_mut().0.set_deadline(deadline);
    }

    fn deadline(&self) -> Option<Instant> {
        self.stream.get_ref().0.deadline()
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.stream.get_ref().0.local_addr()
    }

    fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.stream.get_ref().0.peer_addr()
    }
}
