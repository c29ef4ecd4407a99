//! Transport decorators.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{HeaderValue, HOST, USER_AGENT};
use tokio::time::Instant;

use crate::error_handling::{default_table, FailureTable, Result};
use crate::transport::{Request, Response, Transport};

/// Logs every round trip at debug level: `> METHOD URL` before, `< status`
/// or `< error` after.
#[derive(Debug)]
pub struct LoggingTransport<T> {
    inner: T,
}

impl<T> LoggingTransport<T> {
    /// Wraps `inner`.
    pub fn new(inner: T) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<T: Transport> Transport for LoggingTransport<T> {
    async fn round_trip(&self, req: Request) -> Result<Response> {
        log::debug!("> {} {}", req.method, req.url);
        let start = Instant::now();
        let result = self.inner.round_trip(req).await;
        match &result {
            Ok(resp) => log::debug!("< {} in {:?}", resp.status.as_u16(), start.elapsed()),
            Err(err) => log::debug!("< {err} in {:?}", start.elapsed()),
        }
        result
    }

    fn close_idle_connections(&self) {
        self.inner.close_idle_connections()
    }
}

/// Classifies round-trip errors under the `http_round_trip` operation.
#[derive(Debug)]
pub struct ErrWrapperTransport<T> {
    inner: T,
    table: Option<Arc<FailureTable>>,
}

impl<T> ErrWrapperTransport<T> {
    /// Wraps `inner` using the default classification table.
    pub fn new(inner: T) -> Self {
        Self { inner, table: None }
    }

    /// Classifies with `table` instead of the default one.
    pub fn with_table(mut self, table: Arc<FailureTable>) -> Self {
        self.table = Some(table);
        self
    }
}

#[async_trait]
impl<T: Transport> Transport for ErrWrapperTransport<T> {
    async fn round_trip(&self, req: Request) -> Result<Response> {
        let table = self.table.as_deref().unwrap_or_else(|| default_table());
        self.inner
            .round_trip(req)
            .await
            .map_err(|err| table.wrap(err, "http_round_trip", None))
    }

    fn close_idle_connections(&self) {
        self.inner.close_idle_connections()
    }
}

/// Normalizes request headers before they reach the base transport.
///
/// A request without a `User-Agent` goes out with none at all, and every
/// request carries an explicit `Host` taken from [`Request::host`] or
/// [`Request::authority`], replacing any `Host` header already set.
#[derive(Debug)]
pub struct HeaderAdderTransport<T> {
    inner: T,
}

impl<T> HeaderAdderTransport<T> {
    /// Wraps `inner`.
    pub fn new(inner: T) -> Self {
        Self { inner }
    }
}

fn normalize_headers(req: &mut Request) {
    let has_user_agent = req
        .headers
        .get(USER_AGENT)
        .is_some_and(|value| !value.is_empty());
    if !has_user_agent {
        req.headers.remove(USER_AGENT);
        req.omit_default_user_agent();
    }

    let Some(host) = req.host.clone().or_else(|| req.authority()) else {
        return;
    };
    match HeaderValue::from_str(&host) {
        Ok(value) => {
            req.headers.insert(HOST, value);
        }
        Err(e) => log::warn!("Not setting invalid Host header {host:?}: {e}"),
    }
}

#[async_trait]
impl<T: Transport> Transport for HeaderAdderTransport<T> {
    async fn round_trip(&self, mut req: Request) -> Result<Response> {
        normalize_headers(&mut req);
        self.inner.round_trip(req).await
    }

    fn close_idle_connections(&self) {
        self.inner.close_idle_connections()
    }
}
