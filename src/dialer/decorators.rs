//! Dialer decorators.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::context::Context;
use crate::dialer::{BoxConn, Dialer};
use crate::error_handling::{default_table, Failure, FailureTable, Result};
use crate::model::EventBuffer;

/// Classifies dial errors under the `connect` operation.
#[derive(Debug)]
pub struct ErrWrapperDialer<D> {
    inner: D,
    table: Option<Arc<FailureTable>>,
}

impl<D> ErrWrapperDialer<D> {
    /// Wraps `inner` using the default classification table.
    pub fn new(inner: D) -> Self {
        Self { inner, table: None }
    }

    /// Classifies with `table` instead of the default one.
    pub fn with_table(mut self, table: Arc<FailureTable>) -> Self {
        self.table = Some(table);
        self
    }
}

#[async_trait]
impl<D: Dialer> Dialer for ErrWrapperDialer<D> {
    async fn dial_context(&self, ctx: &Context, network: &str, address: &str) -> Result<BoxConn> {
        let table = self.table.as_deref().unwrap_or_else(|| default_table());
        self.inner
            .dial_context(ctx, network, address)
            .await
            .map_err(|err| table.wrap(err, "connect", None))
    }
}

/// One dial observed by [`EventsSaverDialer`].
#[derive(Debug, Clone)]
pub struct DialEvent {
    /// Network name
    pub network: String,
    /// Address dialed
    pub address: String,
    /// Connection id on success
    pub conn_id: Option<i64>,
    /// Error message on failure
    pub error: Option<String>,
    /// Canonical failure on failure
    pub failure: Option<Failure>,
    /// When the dial started
    pub start: Instant,
    /// When the dial finished
    pub end: Instant,
}

/// Records every dial in a drain-once buffer.
#[derive(Debug)]
pub struct EventsSaverDialer<D> {
    inner: D,
    events: EventBuffer<DialEvent>,
}

impl<D> EventsSaverDialer<D> {
    /// Wraps `inner`.
    pub fn new(inner: D) -> Self {
        Self {
            inner,
            events: EventBuffer::new(),
        }
    }

    /// Returns the dials recorded since the last call.
    pub fn read_events(&self) -> Vec<DialEvent> {
        self.events.drain()
    }
}

#[async_trait]
impl<D: Dialer> Dialer for EventsSaverDialer<D> {
    async fn dial_context(&self, ctx: &Context, network: &str, address: &str) -> Result<BoxConn> {
        let start = Instant::now();
        let result = self.inner.dial_context(ctx, network, address).await;
        self.events.push(DialEvent {
            network: network.to_string(),
            address: address.to_string(),
            conn_id: result.as_ref().ok().and_then(|conn| conn.conn_id()),
            error: result.as_ref().err().map(ToString::to_string),
            failure: result.as_ref().err().map(|err| err.failure()),
            start,
            end: Instant::now(),
        });
        result
    }
}

/// Logs the start and outcome of every dial at debug level.
#[derive(Debug)]
pub struct LoggingDialer<D> {
    inner: D,
}

impl<D> LoggingDialer<D> {
    /// Wraps `inner`.
    pub fn new(inner: D) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<D: Dialer> Dialer for LoggingDialer<D> {
    async fn dial_context(&self, ctx: &Context, network: &str, address: &str) -> Result<BoxConn> {
        log::debug!("dial {network}/{address}...");
        let start = Instant::now();
        let result = self.inner.dial_context(ctx, network, address).await;
        match &result {
            Ok(conn) => log::debug!(
                "dial {network}/{address}... ok (conn #{}) in {:?}",
                conn.conn_id().unwrap_or_default(),
                start.elapsed()
            ),
            Err(err) => log::debug!("dial {network}/{address}... {err} in {:?}", start.elapsed()),
        }
        result
    }
}
