//! Initialization and chain assembly.
//!
//! This module provides functions to initialize shared resources:
//! - Logger
//! - DNS resolver
//! - TLS client configuration
//! - The standard resolver, dialer, TLS dialer and transport chains
//!
//! All initialization functions return proper error types for error handling.

mod chains;
mod logger;
mod resolver;
mod tls;

// Re-export public API
pub use chains::{
    init_net_stack, init_net_stack_with_tls, new_dialer_chain, new_resolver_chain,
    new_tls_dialer, new_transport_chain, resolver_chain_over, BaseTransport, DialerChain,
    NetStack, ResolverChain, SavingDialer, SavingResolver, SavingTransport,
    SnapshottingTransport, TransportChain,
};
pub use logger::{init_logger, init_logger_with};
pub use resolver::{init_resolver, init_system_resolver};
pub use tls::{init_tls_config, init_tls_config_with_roots};
