//! Resolver decorators.
//!
//! Each decorator owns the next resolver in the chain and forwards every
//! lookup to it, adding one concern on the way.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::context::Context;
use crate::error_handling::{default_table, Failure, FailureTable, Result};
use crate::model::EventBuffer;
use crate::resolver::Resolver;

/// Classifies lookup errors under the `resolve_host` operation.
#[derive(Debug)]
pub struct ErrWrapperResolver<R> {
    inner: R,
    table: Option<Arc<FailureTable>>,
}

impl<R> ErrWrapperResolver<R> {
    /// Wraps `inner` using the default classification table.
    pub fn new(inner: R) -> Self {
        Self { inner, table: None }
    }

    /// Classifies with `table` instead of the default one.
    pub fn with_table(mut self, table: Arc<FailureTable>) -> Self {
        self.table = Some(table);
        self
    }
}

#[async_trait]
impl<R: Resolver> Resolver for ErrWrapperResolver<R> {
    async fn lookup_host(&self, ctx: &Context, hostname: &str) -> Result<Vec<String>> {
        let table = self.table.as_deref().unwrap_or_else(|| default_table());
        self.inner
            .lookup_host(ctx, hostname)
            .await
            .map_err(|err| table.wrap(err, "resolve_host", None))
    }

    fn network(&self) -> &str {
        self.inner.network()
    }

    fn address(&self) -> &str {
        self.inner.address()
    }
}

/// One lookup observed by [`EventsSaverResolver`].
#[derive(Debug, Clone)]
pub struct ResolveEvent {
    /// Hostname looked up
    pub hostname: String,
    /// Addresses returned (empty on failure)
    pub addresses: Vec<String>,
    /// Error message on failure
    pub error: Option<String>,
    /// Canonical failure on failure
    pub failure: Option<Failure>,
    /// When the lookup started
    pub start: Instant,
    /// When the lookup finished
    pub end: Instant,
}

/// Records every lookup in a drain-once buffer.
#[derive(Debug)]
pub struct EventsSaverResolver<R> {
    inner: R,
    events: EventBuffer<ResolveEvent>,
}

impl<R> EventsSaverResolver<R> {
    /// Wraps `inner`.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            events: EventBuffer::new(),
        }
    }

    /// Returns the lookups recorded since the last call.
    pub fn read_events(&self) -> Vec<ResolveEvent> {
        self.events.drain()
    }
}

#[async_trait]
impl<R: Resolver> Resolver for EventsSaverResolver<R> {
    async fn lookup_host(&self, ctx: &Context, hostname: &str) -> Result<Vec<String>> {
        let start = Instant::now();
        let result = self.inner.lookup_host(ctx, hostname).await;
        self.events.push(ResolveEvent {
            hostname: hostname.to_string(),
            addresses: result.as_ref().cloned().unwrap_or_default(),
            error: result.as_ref().err().map(ToString::to_string),
            failure: result.as_ref().err().map(|err| err.failure()),
            start,
            end: Instant::now(),
        });
        result
    }

    fn network(&self) -> &str {
        self.inner.network()
    }

    fn address(&self) -> &str {
        self.inner.address()
    }
}

/// Logs the start and outcome of every lookup at debug level.
#[derive(Debug)]
pub struct LoggingResolver<R> {
    inner: R,
}

impl<R> LoggingResolver<R> {
    /// Wraps `inner`.
    pub fn new(inner: R) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<R: Resolver> Resolver for LoggingResolver<R> {
    async fn lookup_host(&self, ctx: &Context, hostname: &str) -> Result<Vec<String>> {
        log::debug!("resolve {hostname}...");
        let start = Instant::now();
        let result = self.inner.lookup_host(ctx, hostname).await;
        match &result {
            Ok(addrs) => log::debug!(
                "resolve {hostname}... {addrs:?} in {:?}",
                start.elapsed()
            ),
            Err(err) => log::debug!("resolve {hostname}... {err} in {:?}", start.elapsed()),
        }
        result
    }

    fn network(&self) -> &str {
        self.inner.network()
    }

    fn address(&self) -> &str {
        self.inner.address()
    }
}
