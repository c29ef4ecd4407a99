//! TLS client configuration.

use std::sync::Arc;

use rustls::crypto::ring::default_provider;
use rustls::{ClientConfig, RootCertStore};

use crate::error_handling::InitializationError;

/// Builds a rustls client configuration trusting the Mozilla root store
/// (`webpki-roots`) and offering `alpn_protocols`.
///
/// # Errors
///
/// Returns `InitializationError::TlsConfigError` if the crypto provider
/// rejects the default protocol versions.
pub fn init_tls_config(alpn_protocols: &[String]) -> Result<Arc<ClientConfig>, InitializationError> {
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    init_tls_config_with_roots(roots, alpn_protocols)
}

/// Builds a rustls client configuration trusting only `roots`.
///
/// # Errors
///
/// Returns `InitializationError::TlsConfigError` if the crypto provider
/// rejects the default protocol versions.
pub fn init_tls_config_with_roots(
    roots: RootCertStore,
    alpn_protocols: &[String],
) -> Result<Arc<ClientConfig>, InitializationError> {
    let mut config = ClientConfig::builder_with_provider(Arc::new(default_provider()))
        .with_safe_default_protocol_versions()?
        .with_root_certificates(roots)
        .with_no_client_auth();
    config.alpn_protocols = alpn_protocols
        .iter()
        .map(|proto| proto.as_bytes().to_vec())
        .collect();
    Ok(Arc::new(config))
}
