//! Configuration constants.
//!
//! This module defines the default timeouts, size limits and identifiers used
//! throughout the transport stack.

use std::time::Duration;

// Network operation timeouts
/// DNS query timeout in seconds
pub const DNS_TIMEOUT_SECS: u64 = 3;
/// Number of attempts the DNS resolver makes per query
pub const DNS_ATTEMPTS: usize = 2;
/// TCP connect timeout used by the base dialer
pub const TCP_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
/// Connect timeout applied by the TLS dialer before the handshake starts
pub const TLS_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
/// Upper bound for a single TLS handshake
pub const TLS_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// ALPN protocol advertised by default during TLS handshakes.
pub const DEFAULT_ALPN_PROTOCOL: &str = "http/1.1";

/// Default User-Agent string for HTTP requests.
///
/// Sent by the base transport unless the request sets its own or explicitly
/// opted out of the default.
pub const DEFAULT_USER_AGENT: &str = concat!("probe_netx/", env!("CARGO_PKG_VERSION"));

// Response and body size limits
/// Default number of body bytes kept by the snapshot saver (256 KiB)
pub const DEFAULT_SNAPSHOT_SIZE: usize = 1 << 18;
/// Maximum size of a response status line plus headers
pub const MAX_RESPONSE_HEAD_SIZE: usize = 64 * 1024;
/// Maximum length of a single chunk-size or trailer line
pub const MAX_CHUNK_LINE_LENGTH: usize = 4096;
/// Connections allowed per host by the base transport
pub const MAX_CONNS_PER_HOST: usize = 1;

// Error handling
/// Maximum length of the detail carried by an `unknown_error` failure
pub const MAX_ERROR_MESSAGE_LENGTH: usize = 512;
/// Maximum depth walked when inspecting an error's source chain
pub const MAX_ERROR_CHAIN_DEPTH: usize = 32;

/// Default base URL of the server-discovery service.
pub const DEFAULT_LOCATE_BASE_URL: &str = "https://locate.measurementlab.net/";
/// Default tool name queried on the discovery service.
pub const DEFAULT_LOCATE_TOOL: &str = "ndt7";
