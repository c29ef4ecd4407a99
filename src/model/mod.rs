//! Measurement data model.
//!
//! This module provides:
//! - [`Measurement`] events emitted by the base layers
//! - [`MeasurementRoot`], the per-measurement context holding the event sink
//! - Event sinks ([`EventSink`] and its implementations)
//! - [`EventBuffer`], the thread-safe drain-once buffer used by the saver decorators

mod buffer;
mod measurement;
mod root;
mod sink;

pub use buffer::EventBuffer;
pub use measurement::{CertificateSummary, Measurement, MeasurementKind, TlsConnectionState};
pub use root::{default_root, LookupHostFuture, LookupHostOverride, MeasurementRoot};
pub use sink::{EventSink, LoggingSink, NoopSink, SavingSink};
