//! Failure classification.
//!
//! Maps arbitrary errors to the canonical [`Failure`] taxonomy. Classification
//! walks the whole cause chain (looking inside `io::Error` payloads too) and
//! asks each rule of a [`FailureTable`] in turn; the first match wins. Errors
//! no rule recognizes become `unknown_error: <sanitized message>`.

use std::error::Error as StdError;
use std::io;

use hickory_resolver::error::{ResolveError, ResolveErrorKind};
use hickory_resolver::proto::op::ResponseCode;
use once_cell::sync::Lazy;
use rustls::CertificateError;

use crate::config::MAX_ERROR_CHAIN_DEPTH;
use crate::context::ContextError;
use crate::error_handling::{Error, Failure, FailureCode, HttpError, Result, WrappedError};
use crate::utils::sanitize::sanitize_failure_detail;

/// A single classification rule.
///
/// Receives one error of the cause chain and returns a code when it
/// recognizes it.
pub type FailureRule =
    Box<dyn Fn(&(dyn StdError + 'static)) -> Option<FailureCode> + Send + Sync>;

/// Ordered set of classification rules.
pub struct FailureTable {
    rules: Vec<FailureRule>,
}

impl FailureTable {
    /// A table without rules: everything classifies as `unknown_error`
    /// except context and already-wrapped errors.
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Appends a rule, consulted after the existing ones.
    pub fn with_rule<F>(mut self, rule: F) -> Self
    where
        F: Fn(&(dyn StdError + 'static)) -> Option<FailureCode> + Send + Sync + 'static,
    {
        self.rules.push(Box::new(rule));
        self
    }

    /// Number of rules in the table.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the table has no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Classifies `err`.
    ///
    /// Wrapped errors keep their failure; context errors map to
    /// `interrupted` or `generic_timeout_error`.
    pub fn classify(&self, err: &Error) -> Failure {
        match err {
            Error::Wrapped(wrapped) => return wrapped.failure().clone(),
            Error::Context(ctx_err) => return context_failure(*ctx_err),
            _ => {}
        }
        for cause in causes(err.as_dyn()) {
            if let Some(ctx_err) = cause.downcast_ref::<ContextError>() {
                return context_failure(*ctx_err);
            }
            if let Some(code) = self.rules.iter().find_map(|rule| rule(cause)) {
                return Failure::new(code);
            }
        }
        Failure::unknown(sanitize_failure_detail(&err.to_string()))
    }

    /// Classifies `err` and annotates it with `operation` and `conn_id`.
    ///
    /// Context errors and errors that are already wrapped pass through
    /// unchanged, so wrapping is idempotent.
    pub fn wrap(&self, err: Error, operation: &str, conn_id: Option<i64>) -> Error {
        match err {
            Error::Wrapped(_) | Error::Context(_) => err,
            other => {
                let failure = self.classify(&other);
                Error::Wrapped(WrappedError::new(operation, conn_id, failure, other))
            }
        }
    }
}

impl Default for FailureTable {
    fn default() -> Self {
        Self::empty()
            .with_rule(io_rule)
            .with_rule(elapsed_rule)
            .with_rule(resolve_rule)
            .with_rule(tls_rule)
            .with_rule(http_rule)
            .with_rule(message_rule)
    }
}

impl std::fmt::Debug for FailureTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FailureTable")
            .field("rules", &self.rules.len())
            .finish()
    }
}

static DEFAULT_TABLE: Lazy<FailureTable> = Lazy::new(FailureTable::default);

/// The table used by [`Error::failure`] and the error-wrapping decorators.
pub fn default_table() -> &'static FailureTable {
    &DEFAULT_TABLE
}

/// Classifies an optional error.
///
/// `None` stays `None`. Otherwise the error is wrapped with the default table
/// (see [`FailureTable::wrap`]).
pub fn classify(err: Option<Error>, operation: &str, conn_id: Option<i64>) -> Option<Error> {
    err.map(|err| default_table().wrap(err, operation, conn_id))
}

/// Wraps the error side of `result`, leaving successes untouched.
pub fn classify_result<T>(result: Result<T>, operation: &str, conn_id: Option<i64>) -> Result<T> {
    result.map_err(|err| default_table().wrap(err, operation, conn_id))
}

fn context_failure(err: ContextError) -> Failure {
    match err {
        ContextError::Canceled => Failure::new(FailureCode::Interrupted),
        ContextError::DeadlineExceeded => Failure::new(FailureCode::GenericTimeoutError),
    }
}

/// Lists `err` and its causes, outermost first.
///
/// `io::Error` hides its payload from `source()`, so the payload is visited
/// explicitly.
pub(crate) fn causes<'a>(err: &'a (dyn StdError + 'static)) -> Vec<&'a (dyn StdError + 'static)> {
    let mut chain = Vec::new();
    let mut current = Some(err);
    while let Some(cause) = current {
        if chain.len() >= MAX_ERROR_CHAIN_DEPTH {
            break;
        }
        chain.push(cause);
        current = match cause.downcast_ref::<io::Error>().and_then(io::Error::get_ref) {
            Some(payload) => Some(payload as &'a (dyn StdError + 'static)),
            None => cause.source(),
        };
    }
    chain
}

fn io_rule(err: &(dyn StdError + 'static)) -> Option<FailureCode> {
    let err = err.downcast_ref::<io::Error>()?;
    match err.kind() {
        io::ErrorKind::ConnectionRefused => Some(FailureCode::ConnectionRefused),
        io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted => {
            Some(FailureCode::ConnectionReset)
        }
        io::ErrorKind::TimedOut => Some(FailureCode::GenericTimeoutError),
        io::ErrorKind::UnexpectedEof => Some(FailureCode::EofError),
        io::ErrorKind::Interrupted => Some(FailureCode::Interrupted),
        _ => None,
    }
}

fn elapsed_rule(err: &(dyn StdError + 'static)) -> Option<FailureCode> {
    err.downcast_ref::<tokio::time::error::Elapsed>()
        .map(|_| FailureCode::GenericTimeoutError)
}

fn resolve_rule(err: &(dyn StdError + 'static)) -> Option<FailureCode> {
    let err = err.downcast_ref::<ResolveError>()?;
    match err.kind() {
        ResolveErrorKind::NoRecordsFound { response_code, .. } => match *response_code {
            ResponseCode::NXDomain => Some(FailureCode::DnsNxdomainError),
            ResponseCode::ServFail | ResponseCode::Refused => {
                Some(FailureCode::DnsServerMisbehaving)
            }
            _ => None,
        },
        ResolveErrorKind::Timeout => Some(FailureCode::GenericTimeoutError),
        _ => None,
    }
}

fn tls_rule(err: &(dyn StdError + 'static)) -> Option<FailureCode> {
    let err = err.downcast_ref::<rustls::Error>()?;
    Some(match err {
        rustls::Error::InvalidCertificate(cert_err) => match cert_err {
            CertificateError::UnknownIssuer => FailureCode::SslUnknownAuthority,
            // Newer rustls releases attach context to the name mismatch.
            other if format!("{other:?}").starts_with("NotValidForName") => {
                FailureCode::SslInvalidHostname
            }
            _ => FailureCode::SslInvalidCertificate,
        },
        _ => FailureCode::TlsHandshakeError,
    })
}

fn http_rule(err: &(dyn StdError + 'static)) -> Option<FailureCode> {
    match err.downcast_ref::<HttpError>()? {
        HttpError::ConnectionClosed => Some(FailureCode::EofError),
        _ => None,
    }
}

fn message_rule(err: &(dyn StdError + 'static)) -> Option<FailureCode> {
    let message = err.to_string().to_lowercase();
    if message.contains("connection refused") {
        Some(FailureCode::ConnectionRefused)
    } else if message.contains("connection reset") {
        Some(FailureCode::ConnectionReset)
    } else if message.contains("timed out") || message.contains("deadline has elapsed") {
        Some(FailureCode::GenericTimeoutError)
    } else {
        None
    }
}
