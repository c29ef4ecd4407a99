//! Resolver backed by hickory.

use std::net::IpAddr;
use std::sync::Arc;

use async_trait::async_trait;
use hickory_resolver::TokioAsyncResolver;

use crate::context::Context;
use crate::error_handling::{Error, Result};
use crate::model::{MeasurementKind, MeasurementRoot};
use crate::resolver::Resolver;

/// Resolves through hickory unless the measurement root overrides lookups.
///
/// Emits a resolve-start and a resolve-done event to the root for every
/// lookup. IP literals resolve to themselves.
#[derive(Clone)]
pub struct BaseResolver {
    resolver: Arc<TokioAsyncResolver>,
}

impl BaseResolver {
    /// Wraps an initialized hickory resolver (see
    /// [`init_resolver`](crate::initialization::init_resolver)).
    pub fn new(resolver: Arc<TokioAsyncResolver>) -> Self {
        Self { resolver }
    }

    async fn lookup(
        &self,
        ctx: &Context,
        root: &MeasurementRoot,
        hostname: &str,
    ) -> Result<Vec<String>> {
        if let Some(err) = ctx.err() {
            return Err(err.into());
        }
        if let Some(lookup) = &root.lookup_host {
            return ctx.run(lookup(ctx.clone(), hostname.to_string())).await?;
        }
        if let Ok(ip) = hostname.parse::<IpAddr>() {
            return Ok(vec![ip.to_string()]);
        }
        let response = ctx.run(self.resolver.lookup_ip(hostname)).await??;
        Ok(response.iter().map(|ip| ip.to_string()).collect())
    }
}

#[async_trait]
impl Resolver for BaseResolver {
    async fn lookup_host(&self, ctx: &Context, hostname: &str) -> Result<Vec<String>> {
        let root = ctx.root();
        root.emit(
            None,
            MeasurementKind::ResolveStart {
                hostname: hostname.to_string(),
            },
        );
        let result = self.lookup(ctx, &root, hostname).await;
        root.emit(
            None,
            MeasurementKind::ResolveDone {
                hostname: hostname.to_string(),
                addresses: result.as_ref().cloned().unwrap_or_default(),
                failure: result.as_ref().err().map(Error::failure),
            },
        );
        result
    }
}

impl std::fmt::Debug for BaseResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BaseResolver").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextError;
    use crate::initialization::init_resolver;
    use crate::config::NetConfig;
    use crate::model::{MeasurementRoot, SavingSink};
    use std::sync::atomic::{AtomicBool, Ordering};

    fn resolver() -> BaseResolver {
        BaseResolver::new(init_resolver(&NetConfig::default()).unwrap())
    }

    #[tokio::test]
    async fn test_ip_literal_resolves_to_itself() {
        let addrs = resolver()
            .lookup_host(&Context::background(), "::1")
            .await
            .unwrap();
        assert_eq!(addrs, vec!["::1".to_string()]);
    }

    #[tokio::test]
    async fn test_lookup_override_and_events() {
        let sink = Arc::new(SavingSink::new());
        let root = MeasurementRoot::new(sink.clone())
            .with_lookup_host(|_ctx, _host| async { Ok(vec!["10.0.0.1".to_string()]) });
        let ctx = Context::background().with_root(Arc::new(root));
        let addrs = resolver().lookup_host(&ctx, "dns.test").await.unwrap();
        assert_eq!(addrs, vec!["10.0.0.1".to_string()]);

        let events = sink.read();
        assert_eq!(events.len(), 2);
        assert!(matches!(
            &events[0].kind,
            MeasurementKind::ResolveStart { hostname } if hostname == "dns.test"
        ));
        match &events[1].kind {
            MeasurementKind::ResolveDone {
                addresses, failure, ..
            } => {
                assert_eq!(addresses, &vec!["10.0.0.1".to_string()]);
                assert!(failure.is_none());
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_cancelled_context_skips_lookup() {
        let sink = Arc::new(SavingSink::new());
        let called = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&called);
        let root = MeasurementRoot::new(sink.clone()).with_lookup_host(move |_ctx, _host| {
            flag.store(true, Ordering::SeqCst);
            async { Ok(Vec::new()) }
        });
        let ctx = Context::background().with_root(Arc::new(root));
        ctx.cancel();
        let err = resolver().lookup_host(&ctx, "dns.test").await.unwrap_err();
        assert!(matches!(err, Error::Context(ContextError::Canceled)));
        assert!(!called.load(Ordering::SeqCst));
        let events = sink.read();
        match &events[1].kind {
            MeasurementKind::ResolveDone { failure, .. } => {
                assert_eq!(failure.as_ref().unwrap().to_string(), "interrupted");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn test_real_lookup() {
        let addrs = resolver()
            .lookup_host(&Context::background(), "dns.google")
            .await
            .unwrap();
        assert!(!addrs.is_empty());
    }
}
