//! Exposes a resolver chain to `reqwest`.
//!
//! Implements `reqwest::dns::Resolve` by delegating to any [`Resolver`], so a
//! `reqwest::Client` built with [`ClientBuilder::dns_resolver`] goes through
//! the same lookup override, events and error classification as the rest of
//! the stack.
//!
//! [`ClientBuilder::dns_resolver`]: reqwest::ClientBuilder::dns_resolver

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use reqwest::dns::{Addrs, Name, Resolve, Resolving};

use crate::context::Context;
use crate::resolver::Resolver;

/// Adapter from [`Resolver`] to `reqwest::dns::Resolve`.
///
/// Every lookup runs under the context given at construction. Returned
/// socket addresses carry port 0; reqwest substitutes the URL port.
pub struct ReqwestResolver<R: ?Sized> {
    resolver: Arc<R>,
    ctx: Context,
}

impl<R: Resolver + ?Sized> ReqwestResolver<R> {
    /// Adapts `resolver`, running lookups under `ctx`.
    pub fn new(resolver: Arc<R>, ctx: Context) -> Self {
        Self { resolver, ctx }
    }
}

impl<R: Resolver + ?Sized + 'static> Resolve for ReqwestResolver<R> {
    fn resolve(&self, name: Name) -> Resolving {
        let resolver = Arc::clone(&self.resolver);
        let ctx = self.ctx.clone();
        Box::pin(async move {
            let addrs = resolver
                .lookup_host(&ctx, name.as_str())
                .await
                .map_err(|e| -> Box<dyn std::error::Error + Send + Sync> { Box::new(e) })?;

            let socket_addrs: Vec<SocketAddr> = addrs
                .iter()
                .filter_map(|addr| addr.parse::<IpAddr>().ok())
                .map(|ip| SocketAddr::new(ip, 0))
                .collect();

            let addrs: Addrs = Box::new(socket_addrs.into_iter());
            Ok(addrs)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_handling::{Error, Result};
    use async_trait::async_trait;
    use httptest::{matchers::*, responders::*, Expectation, Server};

    struct StaticResolver;

    #[async_trait]
    impl Resolver for StaticResolver {
        async fn lookup_host(&self, _ctx: &Context, hostname: &str) -> Result<Vec<String>> {
            match hostname {
                "probe.test" => Ok(vec!["127.0.0.1".to_string()]),
                _ => Err(Error::other("no such host")),
            }
        }
    }

    #[tokio::test]
    async fn test_reqwest_uses_resolver_chain() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/hello"))
                .respond_with(status_code(200).body("hi")),
        );
        let port = server.addr().port();

        let bridge = ReqwestResolver::new(Arc::new(StaticResolver), Context::background());
        let client = reqwest::Client::builder()
            .no_proxy()
            .dns_resolver(Arc::new(bridge))
            .build()
            .unwrap();
        let response = client
            .get(format!("http://probe.test:{port}/hello"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(response.text().await.unwrap(), "hi");
    }

    #[tokio::test]
    async fn test_resolution_failure_surfaces() {
        let bridge = ReqwestResolver::new(Arc::new(StaticResolver), Context::background());
        let client = reqwest::Client::builder()
            .no_proxy()
            .dns_resolver(Arc::new(bridge))
            .build()
            .unwrap();
        let err = client
            .get("http://missing.test:1/")
            .send()
            .await
            .unwrap_err();
        assert!(err.is_connect() || err.is_request());
    }
}
