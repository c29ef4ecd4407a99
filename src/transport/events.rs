//! Round-trip timeline capture.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error_handling::Result;
use crate::model::EventBuffer;
use crate::transport::trace::RoundTripTrace;
use crate::transport::{ClientTrace, Request, Response, RoundTripEvents, Transport};

/// Records the timeline of every round trip in a drain-once buffer.
///
/// Each call installs its own trace on the request, replacing any trace the
/// caller attached, and stores one [`RoundTripEvents`] when the inner
/// transport returns.
#[derive(Debug)]
pub struct EventsSaverTransport<T> {
    inner: T,
    events: EventBuffer<RoundTripEvents>,
}

impl<T> EventsSaverTransport<T> {
    /// Wraps `inner`.
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            events: EventBuffer::new(),
        }
    }

    /// Returns the round trips recorded since the last call.
    pub fn read_events(&self) -> Vec<RoundTripEvents> {
        self.events.drain()
    }
}

#[async_trait]
impl<T: Transport> Transport for EventsSaverTransport<T> {
    async fn round_trip(&self, req: Request) -> Result<Response> {
        let trace = Arc::new(RoundTripTrace::new(req.url.to_string()));
        let req = req.with_trace(Arc::clone(&trace) as Arc<dyn ClientTrace>);
        let result = self.inner.round_trip(req).await;
        self.events
            .push(trace.finish(result.as_ref().err().map(ToString::to_string)));
        result
    }

    fn close_idle_connections(&self) {
        self.inner.close_idle_connections()
    }
}
