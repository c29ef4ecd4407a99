//! Hostname resolution.
//!
//! This module provides:
//! - The [`Resolver`] capability
//! - [`BaseResolver`], backed by hickory and emitting resolve events
//! - Decorators: error wrapping, event saving and logging
//! - [`ReqwestResolver`], exposing any resolver chain to `reqwest`

mod base;
mod decorators;
mod reqwest_bridge;

use std::sync::Arc;

use async_trait::async_trait;

use crate::context::Context;
use crate::error_handling::Result;

pub use base::BaseResolver;
pub use decorators::{ErrWrapperResolver, EventsSaverResolver, LoggingResolver, ResolveEvent};
pub use reqwest_bridge::ReqwestResolver;

/// Maps a hostname to textual IP addresses.
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Resolves `hostname`.
    ///
    /// # Errors
    ///
    /// Returns the context error when `ctx` is cancelled or expires first,
    /// otherwise whatever the underlying lookup failed with.
    async fn lookup_host(&self, ctx: &Context, hostname: &str) -> Result<Vec<String>>;

    /// Kind of resolver, e.g. `system`.
    fn network(&self) -> &str {
        "system"
    }

    /// Server address, empty when the resolver has no single server.
    fn address(&self) -> &str {
        ""
    }
}

#[async_trait]
impl<R: Resolver + ?Sized> Resolver for Arc<R> {
    async fn lookup_host(&self, ctx: &Context, hostname: &str) -> Result<Vec<String>> {
        (**self).lookup_host(ctx, hostname).await
    }

    fn network(&self) -> &str {
        (**self).network()
    }

    fn address(&self) -> &str {
        (**self).address()
    }
}

#[async_trait]
impl<R: Resolver + ?Sized> Resolver for Box<R> {
    async fn lookup_host(&self, ctx: &Context, hostname: &str) -> Result<Vec<String>> {
        (**self).lookup_host(ctx, hostname).await
    }

    fn network(&self) -> &str {
        (**self).network()
    }

    fn address(&self) -> &str {
        (**self).address()
    }
}
