//! probe_netx library: an instrumented network transport stack
//!
//! This library provides composable layers for DNS resolution, TCP dialing,
//! TLS handshaking and HTTP/1.1 round trips. Every layer classifies failures
//! into a portable failure vocabulary (`connection_refused`,
//! `dns_nxdomain_error`, `ssl_unknown_authority`, ...) and emits timestamped
//! measurement events to the sink of the [`MeasurementRoot`] carried by the
//! operation's [`Context`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use probe_netx::initialization::init_net_stack;
//! use probe_netx::model::{MeasurementRoot, SavingSink};
//! use probe_netx::transport::Request;
//! use probe_netx::{Context, NetConfig, Transport};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let stack = init_net_stack(&NetConfig::default())?;
//! let sink = Arc::new(SavingSink::new());
//! let ctx = Context::background().with_root(Arc::new(MeasurementRoot::new(sink.clone())));
//!
//! let req = Request::parse(reqwest::Method::GET, "https://example.com/")?.with_context(ctx);
//! let resp = stack.transport.transport.round_trip(req).await?;
//! println!("{} ({} bytes)", resp.status, resp.body.bytes().await?.len());
//!
//! for measurement in sink.read() {
//!     println!("{}", serde_json::to_string(&measurement)?);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Requirements
//!
//! This library requires a Tokio runtime. Use `#[tokio::main]` in your application
//! or ensure you're calling library functions within an async context.

#![warn(missing_docs)]

pub mod config;
pub mod context;
pub mod dialer;
pub mod error_handling;
pub mod initialization;
pub mod locate;
pub mod model;
pub mod resolver;
pub mod transport;
pub mod utils;

// Re-export public API
pub use config::{LogFormat, LogLevel, NetConfig};
pub use context::{Context, ContextError};
pub use dialer::{Connection, Dialer, TlsDialer};
pub use error_handling::{classify, Error, Failure, FailureCode, Result, WrappedError};
pub use model::{Measurement, MeasurementKind, MeasurementRoot};
pub use resolver::Resolver;
pub use transport::{Request, Response, Transport};
