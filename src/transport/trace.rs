//! Round-trip tracing hooks.

use std::net::SocketAddr;
use std::sync::{Mutex, PoisonError};

use tokio::time::Instant;

/// Connection handed to a round trip.
#[derive(Debug, Clone)]
pub struct GotConnInfo {
    /// Whether the connection was reused from the idle pool
    pub reused: bool,
    /// Connection id
    pub conn_id: Option<i64>,
    /// Local socket address
    pub local_addr: Option<SocketAddr>,
}

/// Observer of a round trip's progress.
///
/// The base transport calls these hooks in order; every hook defaults to
/// doing nothing.
pub trait ClientTrace: Send + Sync {
    /// A connection to `host_port` is about to be obtained.
    fn get_conn(&self, _host_port: &str) {}
    /// A connection was obtained.
    fn got_conn(&self, _info: &GotConnInfo) {}
    /// The request line and headers were written.
    fn wrote_headers(&self) {}
    /// The whole request was written.
    fn wrote_request(&self) {}
    /// The first byte of the response arrived.
    fn got_first_response_byte(&self) {}
}

/// Timeline of one round trip, recorded by
/// [`EventsSaverTransport`](crate::transport::EventsSaverTransport).
#[derive(Debug, Clone)]
pub struct RoundTripEvents {
    /// Request URL
    pub url: String,
    /// When the round trip started
    pub start: Instant,
    /// When a connection was requested, and for which `host:port`
    pub get_conn: Option<(Instant, String)>,
    /// When a connection was obtained
    pub got_conn: Option<(Instant, GotConnInfo)>,
    /// When the headers were written
    pub wrote_headers: Option<Instant>,
    /// When the request was written
    pub wrote_request: Option<Instant>,
    /// When the first response byte arrived
    pub got_first_response_byte: Option<Instant>,
    /// When the round trip returned
    pub end: Option<Instant>,
    /// Error message, if the round trip failed
    pub error: Option<String>,
}

impl RoundTripEvents {
    fn new(url: String) -> Self {
        Self {
            url,
            start: Instant::now(),
            get_conn: None,
            got_conn: None,
            wrote_headers: None,
            wrote_request: None,
            got_first_response_byte: None,
            end: None,
            error: None,
        }
    }
}

/// [`ClientTrace`] filling a [`RoundTripEvents`].
#[derive(Debug)]
pub(crate) struct RoundTripTrace {
    events: Mutex<RoundTripEvents>,
}

impl RoundTripTrace {
    pub(crate) fn new(url: String) -> Self {
        Self {
            events: Mutex::new(RoundTripEvents::new(url)),
        }
    }

    fn record(&self, update: impl FnOnce(&mut RoundTripEvents)) {
        update(&mut self.events.lock().unwrap_or_else(PoisonError::into_inner));
    }

    /// Stamps the end of the round trip and returns the timeline.
    pub(crate) fn finish(&self, error: Option<String>) -> RoundTripEvents {
        self.record(|events| {
            events.end = Some(Instant::now());
            events.error = error;
        });
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ClientTrace for RoundTripTrace {
    fn get_conn(&self, host_port: &str) {
        self.record(|events| events.get_conn = Some((Instant::now(), host_port.to_string())));
    }

    fn got_conn(&self, info: &GotConnInfo) {
        self.record(|events| events.got_conn = Some((Instant::now(), info.clone())));
    }

    fn wrote_headers(&self) {
        self.record(|events| events.wrote_headers = Some(Instant::now()));
    }

    fn wrote_request(&self) {
        self.record(|events| events.wrote_request = Some(Instant::now()));
    }

    fn got_first_response_byte(&self) {
        self.record(|events| events.got_first_response_byte = Some(Instant::now()));
    }
}
