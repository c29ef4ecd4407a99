//! Event sinks receiving measurements from the base layers.

use crate::model::{EventBuffer, Measurement};

/// Receives every [`Measurement`] emitted under a root.
///
/// Implementations are called from whichever task performs the operation,
/// so they must be cheap and must not block.
pub trait EventSink: Send + Sync {
    /// Handles one measurement.
    fn on_measurement(&self, measurement: Measurement);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn on_measurement(&self, _measurement: Measurement) {}
}

/// Keeps events in memory until they are read.
#[derive(Debug, Default)]
pub struct SavingSink {
    measurements: EventBuffer<Measurement>,
}

impl SavingSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the events received since the last read.
    pub fn read(&self) -> Vec<Measurement> {
        self.measurements.drain()
    }
}

impl EventSink for SavingSink {
    fn on_measurement(&self, measurement: Measurement) {
        self.measurements.push(measurement);
    }
}

/// Writes each event as a JSON line at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingSink;

impl EventSink for LoggingSink {
    fn on_measurement(&self, measurement: Measurement) {
        match serde_json::to_string(&measurement) {
            Ok(line) => log::debug!("measurement: {line}"),
            Err(e) => log::warn!("Failed to serialize measurement: {e}"),
        }
    }
}
