//! DNS resolver initialization.
//!
//! This module provides functions to initialize the hickory resolver backing
//! [`BaseResolver`](crate::resolver::BaseResolver) with proper timeout
//! configuration.

use std::sync::Arc;

use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::TokioAsyncResolver;

use crate::config::NetConfig;
use crate::error_handling::InitializationError;

fn resolver_opts(config: &NetConfig, mut opts: ResolverOpts) -> ResolverOpts {
    opts.timeout = config.dns_timeout;
    opts.attempts = config.dns_attempts;
    // No search-domain appending: measured names are always fully qualified.
    opts.ndots = 0;
    opts
}

/// Initializes a resolver using the default upstream servers (Google DNS).
///
/// Timeouts and attempts come from `config` so a slow or unresponsive server
/// cannot stall a measurement.
///
/// # Errors
///
/// This constructor does not currently fail; the `Result` keeps it
/// interchangeable with [`init_system_resolver`].
pub fn init_resolver(config: &NetConfig) -> Result<Arc<TokioAsyncResolver>, InitializationError> {
    let opts = resolver_opts(config, ResolverOpts::default());
    Ok(Arc::new(TokioAsyncResolver::tokio(
        ResolverConfig::default(),
        opts,
    )))
}

/// Initializes a resolver from the host's system configuration
/// (`/etc/resolv.conf` on Unix), keeping the timeouts from `config`.
///
/// # Errors
///
/// Returns `InitializationError::DnsResolverError` if the system
/// configuration cannot be read.
pub fn init_system_resolver(
    config: &NetConfig,
) -> Result<Arc<TokioAsyncResolver>, InitializationError> {
    let (resolver_config, opts) = hickory_resolver::system_conf::read_system_conf()
        .map_err(|e| InitializationError::DnsResolverError(e.to_string()))?;
    let opts = resolver_opts(config, opts);
    Ok(Arc::new(TokioAsyncResolver::tokio(resolver_config, opts)))
}
