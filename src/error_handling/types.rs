//! Error type definitions.
//!
//! This module defines the crate-wide [`Error`], the [`WrappedError`] produced
//! by the error-wrapping decorators, and the smaller error enums used by
//! individual layers.

use std::error::Error as StdError;
use std::fmt;
use std::io;

use log::SetLoggerError;
use thiserror::Error;

use crate::context::ContextError;
use crate::error_handling::classify::{causes, default_table};
use crate::error_handling::Failure;

/// Boxed error used for foreign failures.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Error types for initialization failures.
#[derive(Error, Debug)]
#[allow(clippy::enum_variant_names)] // All variants end with "Error" by convention
pub enum InitializationError {
    /// Error initializing the logger.
    #[error("Logger initialization error: {0}")]
    LoggerError(#[from] SetLoggerError),

    /// Error building the TLS client configuration.
    #[error("TLS configuration error: {0}")]
    TlsConfigError(#[from] rustls::Error),

    /// Error initializing the DNS resolver.
    #[error("DNS resolver initialization error: {0}")]
    DnsResolverError(String),
}

/// Malformed `host:port` strings.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    /// No `:port` suffix.
    #[error("address {0}: missing port in address")]
    MissingPort(String),
    /// Unbracketed host containing colons.
    #[error("address {0}: too many colons in address")]
    TooManyColons(String),
    /// `[` without a matching `]`.
    #[error("address {0}: missing ']' in address")]
    MissingBracket(String),
}

/// Protocol-level failures of the HTTP/1.1 base transport.
#[derive(Error, Debug)]
pub enum HttpError {
    /// The URL could not be parsed.
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    /// The URL scheme is neither `http` nor `https`.
    #[error("unsupported protocol scheme: {0}")]
    UnsupportedScheme(String),
    /// The URL has no host.
    #[error("missing host in url: {0}")]
    MissingHost(String),
    /// The server closed the connection before sending a response.
    #[error("server closed connection before sending a response")]
    ConnectionClosed,
    /// The response could not be parsed.
    #[error("malformed HTTP response: {0}")]
    MalformedResponse(String),
    /// The response head exceeded the configured limit.
    #[error("response head exceeds {0} bytes")]
    HeadTooLarge(usize),
    /// A request header could not be encoded.
    #[error("invalid header value: {0}")]
    InvalidHeader(String),
    /// A response carried a non-success status where one was required.
    #[error("unexpected status code: {0}")]
    UnexpectedStatus(u16),
    /// The per-host connection limiter was shut down.
    #[error("connection pool closed")]
    PoolClosed,
}

/// Crate-wide error.
///
/// Errors leave the stack either raw (from base layers), as a
/// [`ContextError`] (cancellation and deadlines, never wrapped) or as a
/// [`WrappedError`] once an error-wrapping decorator has classified them.
#[derive(Error, Debug)]
pub enum Error {
    /// Cancellation or deadline expiry.
    #[error(transparent)]
    Context(#[from] ContextError),
    /// An error classified by an error-wrapping decorator.
    #[error(transparent)]
    Wrapped(#[from] WrappedError),
    /// A malformed `host:port`.
    #[error(transparent)]
    Address(#[from] AddressError),
    /// Socket-level failure.
    #[error(transparent)]
    Io(#[from] io::Error),
    /// DNS failure.
    #[error(transparent)]
    Resolve(#[from] hickory_resolver::error::ResolveError),
    /// TLS failure outside of an I/O error.
    #[error(transparent)]
    Tls(#[from] rustls::Error),
    /// HTTP protocol failure.
    #[error(transparent)]
    Http(#[from] HttpError),
    /// Any other failure.
    #[error(transparent)]
    Other(BoxError),
}

impl Error {
    /// Wraps a foreign error.
    pub fn other(err: impl Into<BoxError>) -> Self {
        Error::Other(err.into())
    }

    /// The canonical failure for this error.
    ///
    /// Wrapped errors report the failure they were classified with; context
    /// errors map to `interrupted` and `generic_timeout_error`; anything
    /// else is classified with the default table.
    pub fn failure(&self) -> Failure {
        default_table().classify(self)
    }

    /// The classified error, if this error went through an error wrapper.
    pub fn as_wrapped(&self) -> Option<&WrappedError> {
        match self {
            Error::Wrapped(wrapped) => Some(wrapped),
            _ => None,
        }
    }

    /// The cancellation or deadline error anywhere in the cause chain.
    pub fn context_error(&self) -> Option<ContextError> {
        self.find_cause::<ContextError>().copied()
    }

    /// Whether this error stems from cancellation or deadline expiry.
    pub fn is_cancellation(&self) -> bool {
        self.context_error().is_some()
    }

    /// Finds a cause of type `E` in the chain, including inside I/O errors.
    pub fn find_cause<E: StdError + 'static>(&self) -> Option<&E> {
        causes(self.as_dyn())
            .into_iter()
            .find_map(|cause| cause.downcast_ref::<E>())
    }

    pub(crate) fn as_dyn(&self) -> &(dyn StdError + 'static) {
        match self {
            Error::Context(e) => e,
            Error::Wrapped(e) => e,
            Error::Address(e) => e,
            Error::Io(e) => e,
            Error::Resolve(e) => e,
            Error::Tls(e) => e,
            Error::Http(e) => e,
            Error::Other(e) => e.as_ref(),
        }
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Io(e) => e,
            other => io::Error::other(other),
        }
    }
}

/// An error annotated with the operation that failed, the connection it
/// happened on and its canonical [`Failure`].
///
/// Displays as the failure string; the original error is reachable through
/// [`source`](StdError::source).
#[derive(Debug)]
pub struct WrappedError {
    operation: String,
    conn_id: Option<i64>,
    failure: Failure,
    source: Box<Error>,
}

impl WrappedError {
    /// Annotates `source`.
    pub fn new(
        operation: impl Into<String>,
        conn_id: Option<i64>,
        failure: Failure,
        source: Error,
    ) -> Self {
        Self {
            operation: operation.into(),
            conn_id,
            failure,
            source: Box::new(source),
        }
    }

    /// Operation that failed (`resolve_host`, `connect`, `tls_handshake`,
    /// `http_round_trip`, `split_host_port`).
    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Connection the failure happened on, if known.
    pub fn conn_id(&self) -> Option<i64> {
        self.conn_id
    }

    /// Canonical failure.
    pub fn failure(&self) -> &Failure {
        &self.failure
    }

    /// The error that was classified.
    pub fn underlying(&self) -> &Error {
        &self.source
    }

    /// Consumes the wrapper, returning the classified error.
    pub fn into_underlying(self) -> Error {
        *self.source
    }
}

impl fmt::Display for WrappedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.failure, f)
    }
}

impl StdError for WrappedError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(self.source.as_dyn())
    }
}
