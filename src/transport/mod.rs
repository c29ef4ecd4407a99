//! HTTP round trips.
//!
//! This module provides:
//! - The [`Transport`] capability with its [`Request`] and [`Response`]
//! - [`HttpTransport`], an HTTP/1.1 client dialing through the dialer chains
//! - Decorators: logging, error wrapping, header adding, body snapshots and
//!   round-trip event saving

mod base;
mod body;
mod decorators;
mod events;
mod snapshot;
mod trace;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode, Version};
use url::Url;

use crate::context::Context;
use crate::error_handling::{HttpError, Result};

pub use base::HttpTransport;
pub use body::Body;
pub use decorators::{ErrWrapperTransport, HeaderAdderTransport, LoggingTransport};
pub use events::EventsSaverTransport;
pub use snapshot::{BodySnapshot, SnapshotSaverTransport};
pub use trace::{ClientTrace, GotConnInfo, RoundTripEvents};

/// Performs one HTTP request/response exchange.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends `req` and returns the response once its headers arrived.
    ///
    /// # Errors
    ///
    /// Returns the request context's error when it is cancelled or expires
    /// first.
    async fn round_trip(&self, req: Request) -> Result<Response>;

    /// Closes connections kept alive for reuse.
    fn close_idle_connections(&self) {}
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn round_trip(&self, req: Request) -> Result<Response> {
        (**self).round_trip(req).await
    }

    fn close_idle_connections(&self) {
        (**self).close_idle_connections()
    }
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Box<T> {
    async fn round_trip(&self, req: Request) -> Result<Response> {
        (**self).round_trip(req).await
    }

    fn close_idle_connections(&self) {
        (**self).close_idle_connections()
    }
}

/// An outgoing HTTP request bound to a [`Context`].
pub struct Request {
    /// Request method
    pub method: Method,
    /// Target URL (`http` or `https`)
    pub url: Url,
    /// Request headers
    pub headers: HeaderMap,
    /// Explicit `Host` value, overriding the URL authority
    pub host: Option<String>,
    /// Request body
    pub body: Bytes,
    ctx: Context,
    trace: Option<Arc<dyn ClientTrace>>,
    omit_default_user_agent: bool,
    written_authority: Option<String>,
}

impl Request {
    /// A request with no headers and an empty body, bound to the background
    /// context.
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            host: None,
            body: Bytes::new(),
            ctx: Context::background(),
            trace: None,
            omit_default_user_agent: false,
            written_authority: None,
        }
    }

    /// Parses `url` and builds a request for it.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::InvalidUrl`] when `url` does not parse.
    pub fn parse(method: Method, url: &str) -> Result<Self> {
        let parsed = Url::parse(url).map_err(|e| HttpError::InvalidUrl(format!("{url}: {e}")))?;
        let mut req = Self::new(method, parsed);
        req.written_authority = authority_as_written(url);
        Ok(req)
    }

    /// Binds the request to `ctx`.
    pub fn with_context(mut self, ctx: Context) -> Self {
        self.ctx = ctx;
        self
    }

    /// Adds a header.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Sets the body.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Attaches a trace receiving the round trip's progress.
    pub fn with_trace(mut self, trace: Arc<dyn ClientTrace>) -> Self {
        self.trace = Some(trace);
        self
    }

    /// The context the request runs under.
    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// The attached trace, if any.
    pub fn trace(&self) -> Option<&Arc<dyn ClientTrace>> {
        self.trace.as_ref()
    }

    /// Prevents the base transport from adding its default `User-Agent`.
    pub fn omit_default_user_agent(&mut self) {
        self.omit_default_user_agent = true;
    }

    /// Whether the base transport may add its default `User-Agent`.
    pub fn sends_default_user_agent(&self) -> bool {
        !self.omit_default_user_agent
    }

    /// `host[:port]` of the URL as the caller wrote it, keeping an explicit
    /// default port such as `:443`. Falls back to the normalized URL
    /// authority when the request was not parsed from a string or its URL
    /// changed since.
    pub fn authority(&self) -> Option<String> {
        let normalized = url_authority(&self.url)?;
        let written = self.written_authority.as_ref().filter(|written| {
            Url::parse(&format!("{}://{written}/", self.url.scheme()))
                .ok()
                .and_then(|url| url_authority(&url))
                .as_ref()
                == Some(&normalized)
        });
        Some(written.cloned().unwrap_or(normalized))
    }

    /// The value to send as `Host`: the explicit header, then the `host`
    /// field, then the URL authority.
    pub fn effective_host(&self) -> Option<String> {
        if let Some(value) = self.headers.get(reqwest::header::HOST) {
            if let Ok(value) = value.to_str() {
                return Some(value.to_string());
            }
        }
        self.host.clone().or_else(|| self.authority())
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.method)
            .field("url", &self.url.as_str())
            .field("headers", &self.headers)
            .field("host", &self.host)
            .field("body_len", &self.body.len())
            .finish()
    }
}

/// An HTTP response whose body streams from the connection.
#[derive(Debug)]
pub struct Response {
    /// Status code
    pub status: StatusCode,
    /// Protocol version of the response
    pub version: Version,
    /// Response headers
    pub headers: HeaderMap,
    /// Response body
    pub body: Body,
    /// URL of the request that produced this response
    pub url: Url,
    /// Connection the response arrived on
    pub conn_id: Option<i64>,
}

/// The authority component of `input`, without user info.
fn authority_as_written(input: &str) -> Option<String> {
    let rest = input.split_once("://")?.1;
    let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let authority = &rest[..end];
    let authority = authority.rsplit_once('@').map_or(authority, |(_, host)| host);
    (!authority.is_empty()).then(|| authority.to_string())
}

/// `host[:port]` of `url`, omitting the scheme's default port.
pub(crate) fn url_authority(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HOST;

    #[test]
    fn test_effective_host_precedence() {
        let mut req = Request::parse(Method::GET, "http://example.com:8080/x").unwrap();
        assert_eq!(req.effective_host().as_deref(), Some("example.com:8080"));
        req.host = Some("front.example".into());
        assert_eq!(req.effective_host().as_deref(), Some("front.example"));
        req.headers
            .insert(HOST, HeaderValue::from_static("header.example"));
        assert_eq!(req.effective_host().as_deref(), Some("header.example"));
    }

    #[test]
    fn test_url_authority_omits_default_port() {
        let url = Url::parse("https://example.com:443/").unwrap();
        assert_eq!(url_authority(&url).as_deref(), Some("example.com"));
        let url = Url::parse("http://[::1]:8080/").unwrap();
        assert_eq!(url_authority(&url).as_deref(), Some("[::1]:8080"));
    }

    #[test]
    fn test_authority_keeps_explicit_default_port() {
        let req = Request::parse(Method::GET, "https://user@example.com:443/x?q").unwrap();
        assert_eq!(req.authority().as_deref(), Some("example.com:443"));
        let req = Request::parse(Method::GET, "https://example.com/").unwrap();
        assert_eq!(req.authority().as_deref(), Some("example.com"));

        let mut req = Request::parse(Method::GET, "https://example.com:443/").unwrap();
        req.url = Url::parse("https://other.example/").unwrap();
        assert_eq!(req.authority().as_deref(), Some("other.example"));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Request::parse(Method::GET, "not a url").is_err());
    }
}
