//! Assembly of the standard resolver, dialer, TLS dialer and transport chains.
//!
//! Each builder returns the finished chain together with handles to its
//! drain-once buffers, so callers can collect what happened after running a
//! measurement through it.

use std::sync::Arc;

use rustls::ClientConfig;

use crate::config::NetConfig;
use crate::dialer::{
    BaseDialer, Dialer, ErrWrapperDialer, EventsSaverDialer, LoggingDialer, ResolvingDialer,
    RustlsDialer, TlsDialer,
};
use crate::error_handling::InitializationError;
use crate::initialization::{init_resolver, init_tls_config};
use crate::resolver::{BaseResolver, ErrWrapperResolver, EventsSaverResolver, LoggingResolver, Resolver};
use crate::transport::{
    ErrWrapperTransport, EventsSaverTransport, HeaderAdderTransport, HttpTransport,
    LoggingTransport, SnapshotSaverTransport, Transport,
};

/// Resolver layers whose lookups are recorded.
pub type SavingResolver = EventsSaverResolver<ErrWrapperResolver<BaseResolver>>;

/// Dialer layers whose dials are recorded.
pub type SavingDialer = EventsSaverDialer<ErrWrapperDialer<BaseDialer>>;

/// Base transport over type-erased dialers.
pub type BaseTransport = HttpTransport<Arc<dyn Dialer>, Arc<dyn TlsDialer>>;

/// Transport layers whose round-trip timelines are recorded.
pub type SavingTransport = EventsSaverTransport<BaseTransport>;

/// Transport layers whose response bodies are snapshotted.
pub type SnapshottingTransport =
    SnapshotSaverTransport<HeaderAdderTransport<ErrWrapperTransport<Arc<SavingTransport>>>>;

/// A resolver chain and its event buffer.
#[derive(Clone)]
pub struct ResolverChain {
    /// Entry point: logging over the recorded layers
    pub resolver: Arc<dyn Resolver>,
    /// Lookups seen by the chain
    pub events: Arc<SavingResolver>,
}

/// A dialer chain and its event buffer.
#[derive(Clone)]
pub struct DialerChain {
    /// Entry point: resolves, then dials each address in order
    pub dialer: Arc<dyn Dialer>,
    /// Per-address dials seen by the chain
    pub events: Arc<SavingDialer>,
}

/// A transport chain and its buffers.
#[derive(Clone)]
pub struct TransportChain {
    /// Entry point
    pub transport: Arc<dyn Transport>,
    /// Round-trip timelines
    pub events: Arc<SavingTransport>,
    /// Response body snapshots
    pub snapshots: Arc<SnapshottingTransport>,
}

/// Builds `Logging(EventsSaver(ErrWrapper(Base)))` over a fresh hickory
/// resolver.
///
/// # Errors
///
/// Returns `InitializationError::DnsResolverError` if the resolver cannot be
/// created.
pub fn new_resolver_chain(config: &NetConfig) -> Result<ResolverChain, InitializationError> {
    let base = BaseResolver::new(init_resolver(config)?);
    Ok(resolver_chain_over(base))
}

/// Builds the resolver chain over an existing base resolver.
pub fn resolver_chain_over(base: BaseResolver) -> ResolverChain {
    let events = Arc::new(EventsSaverResolver::new(ErrWrapperResolver::new(base)));
    let resolver = LoggingResolver::new(Arc::clone(&events));
    ResolverChain {
        resolver: Arc::new(resolver),
        events,
    }
}

/// Builds `Logging(Resolving(Logging(EventsSaver(ErrWrapper(Base))), resolver))`.
///
/// Every per-address dial is recorded; the outer logging line covers the
/// whole `host:port` dial.
pub fn new_dialer_chain(config: &NetConfig, resolver: Arc<dyn Resolver>) -> DialerChain {
    let base = BaseDialer::new(config.tcp_connect_timeout);
    let events = Arc::new(EventsSaverDialer::new(ErrWrapperDialer::new(base)));
    let resolving = ResolvingDialer::new(LoggingDialer::new(Arc::clone(&events)), resolver);
    DialerChain {
        dialer: Arc::new(LoggingDialer::new(resolving)),
        events,
    }
}

/// Builds a TLS dialer over `dialer` with the timeouts and SNI override from
/// `config`.
pub fn new_tls_dialer(
    config: &NetConfig,
    dialer: Arc<dyn Dialer>,
    tls_config: Arc<ClientConfig>,
) -> RustlsDialer<Arc<dyn Dialer>> {
    RustlsDialer::new(dialer, tls_config)
        .with_server_name(config.server_name.clone())
        .with_connect_timeout(config.tls_connect_timeout)
        .with_handshake_timeout(config.tls_handshake_timeout)
}

/// Builds
/// `Logging(SnapshotSaver(HeaderAdder(ErrWrapper(EventsSaver(Base)))))`.
pub fn new_transport_chain(
    config: &NetConfig,
    dialer: Arc<dyn Dialer>,
    tls_dialer: Arc<dyn TlsDialer>,
) -> TransportChain {
    let base = HttpTransport::new(dialer, tls_dialer)
        .with_user_agent(config.user_agent.clone())
        .with_max_conns_per_host(config.max_conns_per_host);
    let events = Arc::new(EventsSaverTransport::new(base));
    let snapshots = Arc::new(
        SnapshotSaverTransport::new(HeaderAdderTransport::new(ErrWrapperTransport::new(
            Arc::clone(&events),
        )))
        .with_snapshot_size(config.snapshot_size),
    );
    TransportChain {
        transport: Arc::new(LoggingTransport::new(Arc::clone(&snapshots))),
        events,
        snapshots,
    }
}

/// Every standard chain, wired together.
#[derive(Clone)]
pub struct NetStack {
    /// Resolver chain
    pub resolver: ResolverChain,
    /// Dialer chain, resolving through `resolver`
    pub dialer: DialerChain,
    /// TLS dialer over `dialer`
    pub tls_dialer: Arc<dyn TlsDialer>,
    /// Transport chain over `dialer` and `tls_dialer`
    pub transport: TransportChain,
}

/// ALPN protocols the HTTP/1.1 base transport can speak, in `offered` order.
fn transport_alpn(offered: &[String]) -> Vec<String> {
    offered
        .iter()
        .filter(|proto| {
            let supported = matches!(proto.as_str(), "http/1.1" | "http/1.0");
            if !supported {
                log::warn!("Not offering ALPN {proto:?}: the transport only speaks HTTP/1.x");
            }
            supported
        })
        .cloned()
        .collect()
}

/// Builds the whole stack from `config`, trusting the Mozilla root store.
///
/// Only the HTTP/1.x entries of `config.alpn_protocols` are offered, since
/// the TLS dialer is shared with the HTTP/1.1 transport.
///
/// # Errors
///
/// Returns an `InitializationError` if the resolver or the TLS configuration
/// cannot be created.
pub fn init_net_stack(config: &NetConfig) -> Result<NetStack, InitializationError> {
    let tls_config = init_tls_config(&transport_alpn(&config.alpn_protocols))?;
    init_net_stack_with_tls(config, tls_config)
}

/// Builds the whole stack from `config` using `tls_config`.
///
/// # Errors
///
/// Returns an `InitializationError` if the resolver cannot be created.
pub fn init_net_stack_with_tls(
    config: &NetConfig,
    tls_config: Arc<ClientConfig>,
) -> Result<NetStack, InitializationError> {
    let resolver = new_resolver_chain(config)?;
    let dialer = new_dialer_chain(config, Arc::clone(&resolver.resolver));
    let tls_dialer: Arc<dyn TlsDialer> = Arc::new(new_tls_dialer(
        config,
        Arc::clone(&dialer.dialer),
        tls_config,
    ));
    let transport = new_transport_chain(config, Arc::clone(&dialer.dialer), Arc::clone(&tls_dialer));
    log::debug!("network stack initialized");
    Ok(NetStack {
        resolver,
        dialer,
        tls_dialer,
        transport,
    })
}
