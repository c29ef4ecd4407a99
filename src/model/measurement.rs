//! Measurement events and TLS connection summaries.

use std::time::Duration;

use serde::{Serialize, Serializer};

use crate::error_handling::Failure;

/// One observation emitted by a base layer.
///
/// `elapsed` is measured from the beginning of the [`MeasurementRoot`] the
/// event was emitted against.
///
/// [`MeasurementRoot`]: crate::model::MeasurementRoot
#[derive(Debug, Clone, Serialize)]
pub struct Measurement {
    /// Time since the measurement root began
    #[serde(serialize_with = "serialize_seconds")]
    pub elapsed: Duration,
    /// Connection the event belongs to, when there is one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conn_id: Option<i64>,
    /// What happened
    #[serde(flatten)]
    pub kind: MeasurementKind,
}

/// The event kinds emitted by the resolver, dialer, TLS dialer and transport.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MeasurementKind {
    /// A hostname lookup started
    ResolveStart {
        /// Hostname being resolved
        hostname: String,
    },
    /// A hostname lookup finished
    ResolveDone {
        /// Hostname that was resolved
        hostname: String,
        /// Addresses returned (empty on failure)
        addresses: Vec<String>,
        /// Classified failure, if the lookup failed
        failure: Option<Failure>,
    },
    /// A TCP connect started
    ConnectStart {
        /// Network name (`tcp`, `tcp4`, `tcp6`)
        network: String,
        /// `host:port` being dialed
        address: String,
    },
    /// A TCP connect finished
    ConnectDone {
        /// Network name
        network: String,
        /// `host:port` that was dialed
        address: String,
        /// Classified failure, if the connect failed
        failure: Option<Failure>,
    },
    /// A TLS handshake started
    TlsHandshakeStart {
        /// Server name sent in the ClientHello
        sni: String,
    },
    /// A TLS handshake finished
    TlsHandshakeDone {
        /// Negotiated parameters on success
        state: Option<TlsConnectionState>,
        /// Classified failure, if the handshake failed
        failure: Option<Failure>,
    },
    /// An HTTP round trip started
    HttpRoundTripStart {
        /// Request method
        method: String,
        /// Request URL
        url: String,
    },
    /// An HTTP round trip finished (headers received or failure)
    HttpRoundTripDone {
        /// Response status code on success
        status_code: Option<u16>,
        /// Classified failure, if the round trip failed
        failure: Option<Failure>,
    },
}

/// Parameters negotiated by a successful TLS handshake.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TlsConnectionState {
    /// Protocol version, e.g. `TLSv1_3`
    pub version: Option<String>,
    /// Negotiated cipher suite
    pub cipher_suite: Option<String>,
    /// Protocol selected through ALPN
    pub negotiated_protocol: Option<String>,
    /// DER-encoded peer certificate chain, leaf first
    #[serde(skip)]
    pub peer_certificates: Vec<Vec<u8>>,
    /// Summary of the leaf certificate, when it could be parsed
    pub leaf: Option<CertificateSummary>,
}

/// Human-readable summary of an X.509 certificate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CertificateSummary {
    /// Subject distinguished name
    pub subject: String,
    /// Issuer distinguished name
    pub issuer: String,
    /// DNS names from the Subject Alternative Name extension
    pub subject_alternative_names: Vec<String>,
}

fn serialize_seconds<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(value.as_secs_f64())
}
