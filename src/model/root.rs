//! The measurement root: beginning instant, event sink and lookup override.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use once_cell::sync::Lazy;
use tokio::time::Instant;

use crate::context::Context;
use crate::error_handling::Error;
use crate::model::{EventSink, Measurement, MeasurementKind, NoopSink};

/// Future returned by a [`LookupHostOverride`].
pub type LookupHostFuture = BoxFuture<'static, Result<Vec<String>, Error>>;

/// Replaces real DNS resolution for every lookup made under a root.
pub type LookupHostOverride = Arc<dyn Fn(Context, String) -> LookupHostFuture + Send + Sync>;

/// Shared state for one measurement.
///
/// Base layers emit their events to `sink`, timestamped relative to
/// `beginning`. A root is attached to a [`Context`] with
/// [`Context::with_root`]; contexts without one fall back to
/// [`default_root`].
pub struct MeasurementRoot {
    /// Instant all event timestamps are relative to
    pub beginning: Instant,
    /// Where base layers deliver their events
    pub sink: Arc<dyn EventSink>,
    /// Optional replacement for DNS resolution
    pub lookup_host: Option<LookupHostOverride>,
}

impl MeasurementRoot {
    /// Creates a root beginning now and delivering events to `sink`.
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self {
            beginning: Instant::now(),
            sink,
            lookup_host: None,
        }
    }

    /// Installs a lookup override used instead of DNS.
    pub fn with_lookup_host<F, Fut>(mut self, lookup: F) -> Self
    where
        F: Fn(Context, String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<String>, Error>> + Send + 'static,
    {
        self.lookup_host = Some(Arc::new(move |ctx, hostname| {
            Box::pin(lookup(ctx, hostname)) as LookupHostFuture
        }));
        self
    }

    /// Time elapsed since `beginning`.
    pub fn elapsed(&self) -> Duration {
        Instant::now().saturating_duration_since(self.beginning)
    }

    /// Timestamps `kind` and hands it to the sink.
    pub fn emit(&self, conn_id: Option<i64>, kind: MeasurementKind) {
        self.sink.on_measurement(Measurement {
            elapsed: self.elapsed(),
            conn_id,
            kind,
        });
    }
}

impl fmt::Debug for MeasurementRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MeasurementRoot")
            .field("beginning", &self.beginning)
            .field("lookup_host", &self.lookup_host.is_some())
            .finish_non_exhaustive()
    }
}

static DEFAULT_ROOT: Lazy<Arc<MeasurementRoot>> =
    Lazy::new(|| Arc::new(MeasurementRoot::new(Arc::new(NoopSink))));

/// The process-wide root used by contexts that carry none.
///
/// Its beginning is the first time it is requested and its sink discards
/// every event.
pub fn default_root() -> Arc<MeasurementRoot> {
    Arc::clone(&DEFAULT_ROOT)
}
