//! Extraction of negotiated TLS parameters and certificate details.

use rustls::ClientConnection;
use x509_parser::extensions::{GeneralName, ParsedExtension};

use crate::model::{CertificateSummary, TlsConnectionState};

/// Captures the parameters negotiated on `conn`.
///
/// # Arguments
///
/// * `conn` - A client connection whose handshake completed
///
/// # Returns
///
/// The negotiated version, cipher suite, ALPN protocol and peer chain, plus
/// a summary of the leaf certificate when it parses.
pub(crate) fn connection_state(conn: &ClientConnection) -> TlsConnectionState {
    let peer_certificates: Vec<Vec<u8>> = conn
        .peer_certificates()
        .map(|chain| chain.iter().map(|cert| cert.as_ref().to_vec()).collect())
        .unwrap_or_default();
    let leaf = peer_certificates
        .first()
        .and_then(|der| summarize_certificate(der));

    TlsConnectionState {
        version: conn.protocol_version().map(|v| format!("{v:?}")),
        cipher_suite: conn
            .negotiated_cipher_suite()
            .map(|suite| format!("{:?}", suite.suite())),
        negotiated_protocol: conn
            .alpn_protocol()
            .map(|proto| String::from_utf8_lossy(proto).into_owned()),
        peer_certificates,
        leaf,
    }
}

/// Summarizes a DER-encoded certificate, or `None` if it does not parse.
pub fn summarize_certificate(der: &[u8]) -> Option<CertificateSummary> {
    let (_, cert) = x509_parser::parse_x509_certificate(der).ok()?;
    Some(CertificateSummary {
        subject: cert.subject().to_string(),
        issuer: cert.issuer().to_string(),
        subject_alternative_names: extract_certificate_sans(&cert),
    })
}

/// Extracts Subject Alternative Names (SANs) from an X.509 certificate.
///
/// Only DNS names are extracted (not IP addresses, email addresses, etc.).
///
/// # Arguments
///
/// * `cert` - The parsed X.509 certificate
///
/// # Returns
///
/// A vector of DNS names found in the SAN extension.
pub(crate) fn extract_certificate_sans(
    cert: &x509_parser::certificate::X509Certificate<'_>,
) -> Vec<String> {
    let mut sans = Vec::new();

    for ext in cert.extensions() {
        if let ParsedExtension::SubjectAlternativeName(ref san) = ext.parsed_extension() {
            for general_name in &san.general_names {
                if let GeneralName::DNSName(dns_name) = general_name {
                    sans.push(dns_name.to_string());
                }
            }
        }
    }

    sans
}
