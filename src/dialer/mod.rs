//! TCP and TLS connection establishment.
//!
//! This module provides:
//! - The [`Dialer`] and [`TlsDialer`] capabilities and the [`Connection`]
//!   they return
//! - [`BaseDialer`], which opens measured TCP connections
//! - [`ResolvingDialer`], which resolves hostnames and tries every address
//! - Decorators: error wrapping, event saving and logging
//! - [`RustlsDialer`], which layers a TLS handshake on top of any dialer

mod base;
mod conn;
mod decorators;
mod resolving;
pub mod tls;

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::Instant;

use crate::context::Context;
use crate::error_handling::Result;

pub use base::BaseDialer;
pub use conn::{next_conn_id, MeasuringConn};
pub use decorators::{DialEvent, ErrWrapperDialer, EventsSaverDialer, LoggingDialer};
pub use resolving::{reduce_errors, ResolvingDialer};
pub use tls::{RustlsDialer, TlsConn};

/// A byte stream produced by a dialer.
///
/// Besides reading and writing, a connection carries the identifier its
/// events were emitted with and an optional I/O deadline: once the deadline
/// passes, reads and writes fail with [`io::ErrorKind::TimedOut`].
pub trait Connection: AsyncRead + AsyncWrite + Send + Unpin + fmt::Debug {
    /// Identifier shared with the events emitted for this connection.
    fn conn_id(&self) -> Option<i64>;

    /// Sets (or with `None`, clears) the I/O deadline.
    fn set_deadline(&mut self, deadline: Option<Instant>);

    /// The current I/O deadline.
    fn deadline(&self) -> Option<Instant>;

    /// Local socket address.
    fn local_addr(&self) -> io::Result<SocketAddr>;

    /// Remote socket address.
    fn peer_addr(&self) -> io::Result<SocketAddr>;
}

/// An owned, type-erased connection.
pub type BoxConn = Box<dyn Connection>;

/// Opens connections to `host:port` addresses.
#[async_trait]
pub trait Dialer: Send + Sync {
    /// Connects to `address` over `network` (`tcp`, `tcp4` or `tcp6`).
    ///
    /// # Errors
    ///
    /// Returns the context error when `ctx` is cancelled or expires first.
    async fn dial_context(&self, ctx: &Context, network: &str, address: &str) -> Result<BoxConn>;
}

/// Opens TLS connections to `host:port` addresses.
#[async_trait]
pub trait TlsDialer: Send + Sync {
    /// Connects to `address` and completes a TLS handshake.
    ///
    /// # Errors
    ///
    /// Returns the context error when `ctx` is cancelled or expires first.
    async fn dial_tls_context(
        &self,
        ctx: &Context,
        network: &str,
        address: &str,
    ) -> Result<BoxConn>;
}

#[async_trait]
impl<D: Dialer + ?Sized> Dialer for Arc<D> {
    async fn dial_context(&self, ctx: &Context, network: &str, address: &str) -> Result<BoxConn> {
        (**self).dial_context(ctx, network, address).await
    }
}

#[async_trait]
impl<D: Dialer + ?Sized> Dialer for Box<D> {
    async fn dial_context(&self, ctx: &Context, network: &str, address: &str) -> Result<BoxConn> {
        (**self).dial_context(ctx, network, address).await
    }
}

#[async_trait]
impl<D: TlsDialer + ?Sized> TlsDialer for Arc<D> {
    async fn dial_tls_context(
        &self,
        ctx: &Context,
        network: &str,
        address: &str,
    ) -> Result<BoxConn> {
        (**self).dial_tls_context(ctx, network, address).await
    }
}
