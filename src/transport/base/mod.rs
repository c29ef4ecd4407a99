//! HTTP/1.1 base transport.
//!
//! Obtains connections from the configured dialer (plain) or TLS dialer
//! (`https`), writes the request and parses the response head. The body
//! streams from the connection; finished keep-alive connections are reused.
//! No `Accept-Encoding` is sent, so bodies arrive exactly as the server
//! produced them.

mod codec;
mod pool;
mod reader;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::BytesMut;
use tokio::io::AsyncWriteExt;

use crate::config::{DEFAULT_USER_AGENT, MAX_CONNS_PER_HOST, MAX_RESPONSE_HEAD_SIZE};
use crate::context::Context;
use crate::dialer::{BoxConn, Dialer, TlsDialer};
use crate::error_handling::{Error, HttpError, Result};
use crate::model::MeasurementKind;
use crate::transport::{Body, ClientTrace, GotConnInfo, Request, Response, Transport};

use codec::{body_framing, encode_request_head, read_response_head, ResponseHead, Target};
use pool::ConnPool;
use reader::{BodyReader, Release};

/// HTTP/1.1 client over the dialer chains.
///
/// Emits a round-trip-start and a round-trip-done event per request. At most
/// `max_conns_per_host` connections per host are in use at once; a request
/// holds its connection until the response body is read to the end or
/// dropped.
pub struct HttpTransport<D, T> {
    dialer: D,
    tls_dialer: T,
    user_agent: Option<String>,
    max_head_size: usize,
    pool: Arc<ConnPool>,
}

impl<D, T> HttpTransport<D, T> {
    /// Dials plain connections through `dialer` and TLS connections through
    /// `tls_dialer`.
    pub fn new(dialer: D, tls_dialer: T) -> Self {
        Self {
            dialer,
            tls_dialer,
            user_agent: Some(DEFAULT_USER_AGENT.to_string()),
            max_head_size: MAX_RESPONSE_HEAD_SIZE,
            pool: Arc::new(ConnPool::new(MAX_CONNS_PER_HOST)),
        }
    }

    /// Sets the `User-Agent` sent when a request carries none (`None`
    /// disables it).
    pub fn with_user_agent(mut self, user_agent: Option<String>) -> Self {
        self.user_agent = user_agent;
        self
    }

    /// Sets how many connections per host may be in use at once.
    pub fn with_max_conns_per_host(mut self, max: usize) -> Self {
        self.pool = Arc::new(ConnPool::new(max));
        self
    }

    /// Number of connections currently idle in the pool.
    pub fn idle_connections(&self) -> usize {
        self.pool.idle_count()
    }
}

impl<D: Dialer, T: TlsDialer> HttpTransport<D, T> {
    async fn connect(&self, ctx: &Context, target: &Target) -> Result<BoxConn> {
        if target.tls {
            self.tls_dialer
                .dial_tls_context(ctx, "tcp", &target.address)
                .await
        } else {
            self.dialer.dial_context(ctx, "tcp", &target.address).await
        }
    }

    async fn exchange(&self, req: Request) -> Result<Response> {
        let ctx = req.context().clone();
        let target = Target::from_url(&req.url)?;
        let trace = req.trace().cloned();

        let permit = ctx
            .run(self.pool.permits(&target.key).acquire_owned())
            .await?
            .map_err(|_| HttpError::PoolClosed)?;

        if let Some(trace) = &trace {
            trace.get_conn(&target.address);
        }
        let (conn, reused) = match self.pool.take_idle(&target.key) {
            Some(idle) => (idle, true),
            None => (self.connect(&ctx, &target).await?, false),
        };
        let (conn, head, buf) = self.send(&ctx, conn, reused, &req, trace.as_ref()).await?;

        let conn_id = conn.conn_id();
        let framing = body_framing(&req.method, &head)?;
        let release = Release {
            pool: Arc::clone(&self.pool),
            key: target.key,
            keep_alive: head.keep_alive(),
            permit,
        };
        let body = BodyReader::new(conn, buf, framing, release, ctx);

        Ok(Response {
            status: head.status,
            version: head.version,
            headers: head.headers,
            body: Body::from_reader(body),
            url: req.url,
            conn_id,
        })
    }

    /// Writes `req` on `conn` and reads the response head.
    async fn send(
        &self,
        ctx: &Context,
        mut conn: BoxConn,
        reused: bool,
        req: &Request,
        trace: Option<&Arc<dyn ClientTrace>>,
    ) -> Result<(BoxConn, ResponseHead, BytesMut)> {
        if let Some(trace) = trace {
            trace.got_conn(&GotConnInfo {
                reused,
                conn_id: conn.conn_id(),
                local_addr: conn.local_addr().ok(),
            });
        }

        let head = encode_request_head(req, self.user_agent.as_deref());
        ctx.run(write_all(&mut conn, &head)).await??;
        if let Some(trace) = trace {
            trace.wrote_headers();
        }
        if !req.body.is_empty() {
            ctx.run(write_all(&mut conn, &req.body)).await??;
        }
        if let Some(trace) = trace {
            trace.wrote_request();
        }

        let mut buf = BytesMut::with_capacity(4096);
        let head = ctx
            .run(read_response_head(
                &mut conn,
                &mut buf,
                self.max_head_size,
                trace,
            ))
            .await??;
        Ok((conn, head, buf))
    }
}

async fn write_all(conn: &mut BoxConn, data: &[u8]) -> std::io::Result<()> {
    conn.write_all(data).await?;
    conn.flush().await
}

#[async_trait]
impl<D: Dialer, T: TlsDialer> Transport for HttpTransport<D, T> {
    async fn round_trip(&self, req: Request) -> Result<Response> {
        let root = req.context().root();
        root.emit(
            None,
            MeasurementKind::HttpRoundTripStart {
                method: req.method.to_string(),
                url: req.url.to_string(),
            },
        );
        let result = self.exchange(req).await;
        root.emit(
            result.as_ref().ok().and_then(|resp| resp.conn_id),
            MeasurementKind::HttpRoundTripDone {
                status_code: result.as_ref().ok().map(|resp| resp.status.as_u16()),
                failure: result.as_ref().err().map(Error::failure),
            },
        );
        result
    }

    fn close_idle_connections(&self) {
        let closed = self.pool.close_idle();
        log::debug!("closed {closed} idle connection(s)");
    }
}

impl<D, T> fmt::Debug for HttpTransport<D, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport")
            .field("user_agent", &self.user_agent)
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}
