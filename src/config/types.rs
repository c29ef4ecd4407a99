//! Configuration types.
//!
//! This module defines the logging options and the [`NetConfig`] struct used to
//! assemble the transport chains.

use std::time::Duration;

use crate::config::constants::{
    DEFAULT_ALPN_PROTOCOL, DEFAULT_SNAPSHOT_SIZE, DEFAULT_USER_AGENT, DNS_ATTEMPTS,
    DNS_TIMEOUT_SECS, MAX_CONNS_PER_HOST, TCP_CONNECT_TIMEOUT, TLS_CONNECT_TIMEOUT,
    TLS_HANDSHAKE_TIMEOUT,
};

/// Logging level for the library.
///
/// Controls the verbosity of log output, from most restrictive (Error) to most
/// verbose (Trace).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogLevel {
    /// Only error messages
    Error,
    /// Error and warning messages
    Warn,
    /// Error, warning, and informational messages
    #[default]
    Info,
    /// All messages except trace
    Debug,
    /// All messages including trace
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(l: LogLevel) -> Self {
        match l {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Log output format.
///
/// - `Plain`: Human-readable format with colors (default)
/// - `Json`: Structured JSON format for machine parsing
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable format with colors (default)
    #[default]
    Plain,
    /// Structured JSON format for machine parsing
    Json,
}

/// Settings used when wiring the resolver, dialer, TLS and transport chains.
///
/// Every field has a sensible default, so callers usually start from
/// `NetConfig::default()` and override what they need.
///
/// # Examples
///
/// ```no_run
/// use probe_netx::config::NetConfig;
/// use std::time::Duration;
///
/// let config = NetConfig {
///     tls_handshake_timeout: Duration::from_secs(5),
///     snapshot_size: 4096,
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct NetConfig {
    /// Timeout for each DNS query
    pub dns_timeout: Duration,
    /// Attempts per DNS query
    pub dns_attempts: usize,
    /// Timeout for a single TCP connect
    pub tcp_connect_timeout: Duration,
    /// Connect timeout applied by the TLS dialer
    pub tls_connect_timeout: Duration,
    /// Upper bound for a TLS handshake
    pub tls_handshake_timeout: Duration,
    /// Overrides the SNI otherwise derived from the dialed address
    pub server_name: Option<String>,
    /// ALPN protocols offered during the handshake. The transport chain
    /// only offers the HTTP/1.x entries; others such as `h2` apply to TLS
    /// dials made directly through a TLS dialer built with
    /// `init_tls_config`.
    pub alpn_protocols: Vec<String>,
    /// User-Agent sent when a request does not carry one (`None` disables it)
    pub user_agent: Option<String>,
    /// Bytes of each response body kept by the snapshot saver
    pub snapshot_size: usize,
    /// Connections allowed per host by the base transport
    pub max_conns_per_host: usize,
    /// Log level
    pub log_level: LogLevel,
    /// Log format
    pub log_format: LogFormat,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            dns_timeout: Duration::from_secs(DNS_TIMEOUT_SECS),
            dns_attempts: DNS_ATTEMPTS,
            tcp_connect_timeout: TCP_CONNECT_TIMEOUT,
            tls_connect_timeout: TLS_CONNECT_TIMEOUT,
            tls_handshake_timeout: TLS_HANDSHAKE_TIMEOUT,
            server_name: None,
            alpn_protocols: vec![DEFAULT_ALPN_PROTOCOL.to_string()],
            user_agent: Some(DEFAULT_USER_AGENT.to_string()),
            snapshot_size: DEFAULT_SNAPSHOT_SIZE,
            max_conns_per_host: MAX_CONNS_PER_HOST,
            log_level: LogLevel::default(),
            log_format: LogFormat::default(),
        }
    }
}
