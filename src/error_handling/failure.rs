//! Canonical failure taxonomy.

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};
use strum_macros::{AsRefStr, EnumIter as EnumIterMacro, EnumString, IntoStaticStr};

/// Canonical failure codes reported for failed operations.
///
/// The string forms are stable and shared with other measurement tools, so
/// they must never change.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    EnumIterMacro,
    AsRefStr,
    EnumString,
    IntoStaticStr,
)]
pub enum FailureCode {
    /// The peer actively refused the connection
    #[strum(serialize = "connection_refused")]
    ConnectionRefused,
    /// The peer reset the connection
    #[strum(serialize = "connection_reset")]
    ConnectionReset,
    /// The name does not exist
    #[strum(serialize = "dns_nxdomain_error")]
    DnsNxdomainError,
    /// The DNS server failed or refused to answer
    #[strum(serialize = "dns_server_misbehaving")]
    DnsServerMisbehaving,
    /// A timeout or deadline expired
    #[strum(serialize = "generic_timeout_error")]
    GenericTimeoutError,
    /// The operation was cancelled
    #[strum(serialize = "interrupted")]
    Interrupted,
    /// The TLS handshake failed for a non-certificate reason
    #[strum(serialize = "tls_handshake_error")]
    TlsHandshakeError,
    /// The certificate is not valid for the requested name
    #[strum(serialize = "ssl_invalid_hostname")]
    SslInvalidHostname,
    /// The certificate chains to an unknown authority
    #[strum(serialize = "ssl_unknown_authority")]
    SslUnknownAuthority,
    /// The certificate is invalid for another reason
    #[strum(serialize = "ssl_invalid_certificate")]
    SslInvalidCertificate,
    /// The peer closed the connection unexpectedly
    #[strum(serialize = "eof_error")]
    EofError,
    /// Anything not covered above
    #[strum(serialize = "unknown_error")]
    UnknownError,
}

impl FailureCode {
    /// The canonical string for this code.
    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

impl fmt::Display for FailureCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified failure: a canonical code plus, for `unknown_error`, a
/// sanitized description of the underlying error.
///
/// Displays as the code string, or `unknown_error: <detail>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Failure {
    code: FailureCode,
    detail: Option<String>,
}

impl Failure {
    /// A failure with a well-known code.
    pub fn new(code: FailureCode) -> Self {
        Self { code, detail: None }
    }

    /// An `unknown_error` carrying `detail`.
    pub fn unknown(detail: impl Into<String>) -> Self {
        Self {
            code: FailureCode::UnknownError,
            detail: Some(detail.into()),
        }
    }

    /// The failure code.
    pub fn code(&self) -> FailureCode {
        self.code
    }

    /// Detail attached to an `unknown_error`.
    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    /// Whether the failure maps to a known code (anything but `unknown_error`).
    pub fn is_meaningful(&self) -> bool {
        self.code != FailureCode::UnknownError
    }
}

impl From<FailureCode> for Failure {
    fn from(code: FailureCode) -> Self {
        Self::new(code)
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.code, &self.detail) {
            (FailureCode::UnknownError, Some(detail)) => write!(f, "unknown_error: {detail}"),
            (code, _) => f.write_str(code.as_str()),
        }
    }
}

impl FromStr for Failure {
    type Err = strum::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(detail) = s.strip_prefix("unknown_error: ") {
            return Ok(Self::unknown(detail));
        }
        FailureCode::from_str(s).map(Self::new)
    }
}

impl Serialize for Failure {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
