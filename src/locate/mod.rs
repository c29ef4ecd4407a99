//! Server discovery through the locate service.
//!
//! Throughput experiments ask the locate service which server to measure
//! against. The query normally lets the service geolocate the caller from the
//! connection; behind an explicit proxy that address belongs to the proxy, so
//! the probe's own IP is sent as `ip=<probe ip>` instead.

use reqwest::header::{HeaderValue, USER_AGENT};
use reqwest::Method;
use serde::Deserialize;
use url::Url;

use crate::config::{DEFAULT_LOCATE_BASE_URL, DEFAULT_LOCATE_TOOL, DEFAULT_USER_AGENT};
use crate::context::Context;
use crate::error_handling::{Error, HttpError, Result};
use crate::transport::{Request, Transport};

/// Parameters of a locate query.
#[derive(Debug, Clone)]
pub struct LocateConfig {
    /// Base URL of the locate service
    pub base_url: String,
    /// Tool path appended to the base URL, e.g. `ndt7`
    pub tool: String,
    /// `User-Agent` sent with the query (empty sends none)
    pub user_agent: String,
    /// Whether traffic leaves through an explicitly configured proxy
    pub explicit_proxy: bool,
    /// The probe's public IP, when known
    pub probe_ip: Option<String>,
}

impl Default for LocateConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_LOCATE_BASE_URL.to_string(),
            tool: DEFAULT_LOCATE_TOOL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            explicit_proxy: false,
            probe_ip: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct LocateReply {
    fqdn: String,
}

/// Builds the locate query URL for `config`.
///
/// The query string is empty unless an explicit proxy is in use and the probe
/// IP is known, in which case it is exactly `ip=<probe ip>`.
///
/// # Errors
///
/// Returns [`HttpError::InvalidUrl`] when the base URL or tool path do not
/// form a valid URL.
pub fn build_locate_url(config: &LocateConfig) -> Result<Url> {
    let base = Url::parse(&config.base_url)
        .map_err(|e| HttpError::InvalidUrl(format!("{}: {e}", config.base_url)))?;
    let mut url = base
        .join(&config.tool)
        .map_err(|e| HttpError::InvalidUrl(format!("{}: {e}", config.tool)))?;
    url.set_query(None);

    let probe_ip = config.probe_ip.as_deref().filter(|ip| !ip.is_empty());
    if let (true, Some(ip)) = (config.explicit_proxy, probe_ip) {
        url.query_pairs_mut().append_pair("ip", ip);
    }
    Ok(url)
}

/// Asks the locate service for a server and returns its FQDN.
///
/// # Errors
///
/// Returns whatever `transport` fails with (cancellation unchanged),
/// [`HttpError::UnexpectedStatus`] for a non-2xx reply, and an error when
/// the reply is not the expected JSON or names no server.
pub async fn discover<T: Transport + ?Sized>(
    ctx: &Context,
    transport: &T,
    config: &LocateConfig,
) -> Result<String> {
    let url = build_locate_url(config)?;
    let mut req = Request::new(Method::GET, url).with_context(ctx.clone());
    if !config.user_agent.is_empty() {
        let value = HeaderValue::from_str(&config.user_agent)
            .map_err(|e| HttpError::InvalidHeader(e.to_string()))?;
        req.headers.insert(USER_AGENT, value);
    }

    let resp = transport.round_trip(req).await?;
    if !resp.status.is_success() {
        return Err(HttpError::UnexpectedStatus(resp.status.as_u16()).into());
    }
    let body = ctx.run(resp.body.bytes()).await??;
    let reply: LocateReply = serde_json::from_slice(&body).map_err(Error::other)?;
    if reply.fqdn.is_empty() {
        return Err(HttpError::MalformedResponse("locate reply names no server".into()).into());
    }
    log::debug!("locate: using {}", reply.fqdn);
    Ok(reply.fqdn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextError;
    use crate::transport::{Body, Response};
    use async_trait::async_trait;
    use reqwest::{StatusCode, Version};
    use std::sync::Mutex;

    /// Records the request URL and answers with a fixed status and body.
    struct MockLocate {
        status: StatusCode,
        body: &'static str,
        seen: Mutex<Vec<(Url, Option<String>)>>,
    }

    impl MockLocate {
        fn new(status: StatusCode, body: &'static str) -> Self {
            Self {
                status,
                body,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Transport for MockLocate {
        async fn round_trip(&self, req: Request) -> Result<Response> {
            let user_agent = req
                .headers
                .get(USER_AGENT)
                .map(|v| v.to_str().unwrap().to_string());
            self.seen.lock().unwrap().push((req.url.clone(), user_agent));
            Ok(Response {
                status: self.status,
                version: Version::HTTP_11,
                headers: Default::default(),
                body: Body::from_bytes(self.body),
                url: req.url,
                conn_id: None,
            })
        }
    }

    /// Fails every request unless its query is exactly `ip=1.2.3.4`.
    struct VerifyQuery;

    #[async_trait]
    impl Transport for VerifyQuery {
        async fn round_trip(&self, req: Request) -> Result<Response> {
            if req.url.query() != Some("ip=1.2.3.4") {
                return Err(Error::other("invalid query"));
            }
            Err(Error::other("expected error"))
        }
    }

    #[test]
    fn test_default_url_has_no_query() {
        let url = build_locate_url(&LocateConfig::default()).unwrap();
        assert_eq!(url.as_str(), "https://locate.measurementlab.net/ndt7");
    }

    #[test]
    fn test_probe_ip_ignored_without_proxy() {
        let config = LocateConfig {
            probe_ip: Some("1.2.3.4".into()),
            ..Default::default()
        };
        assert_eq!(build_locate_url(&config).unwrap().query(), None);
    }

    #[test]
    fn test_explicit_proxy_sends_probe_ip() {
        let config = LocateConfig {
            explicit_proxy: true,
            probe_ip: Some("1.2.3.4".into()),
            ..Default::default()
        };
        assert_eq!(build_locate_url(&config).unwrap().query(), Some("ip=1.2.3.4"));
    }

    #[test]
    fn test_explicit_proxy_without_probe_ip() {
        let config = LocateConfig {
            explicit_proxy: true,
            probe_ip: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(build_locate_url(&config).unwrap().query(), None);
    }

    #[tokio::test]
    async fn test_discover_with_explicit_proxy() {
        let config = LocateConfig {
            explicit_proxy: true,
            probe_ip: Some("1.2.3.4".into()),
            ..Default::default()
        };
        let ctx = Context::background();
        ctx.cancel();
        let err = discover(&ctx, &VerifyQuery, &config).await.unwrap_err();
        assert_eq!(err.to_string(), "expected error");
    }

    #[tokio::test]
    async fn test_discover_parses_fqdn() {
        let mock = MockLocate::new(
            StatusCode::OK,
            r#"{"fqdn": "ndt-iupui-mlab1-mil04.measurement-lab.org"}"#,
        );
        let config = LocateConfig {
            user_agent: "miniooni/0.1.0-dev".into(),
            ..Default::default()
        };
        let fqdn = discover(&Context::background(), &mock, &config)
            .await
            .unwrap();
        assert_eq!(fqdn, "ndt-iupui-mlab1-mil04.measurement-lab.org");

        let seen = mock.seen.lock().unwrap();
        assert_eq!(seen[0].0.path(), "/ndt7");
        assert_eq!(seen[0].1.as_deref(), Some("miniooni/0.1.0-dev"));
    }

    #[tokio::test]
    async fn test_discover_rejects_bad_replies() {
        let ctx = Context::background();
        let config = LocateConfig::default();

        let mock = MockLocate::new(StatusCode::NO_CONTENT, "");
        let err = discover(&ctx, &mock, &config).await.unwrap_err();
        assert!(matches!(err, Error::Http(HttpError::UnexpectedStatus(204))));

        let mock = MockLocate::new(StatusCode::OK, "not json");
        assert!(discover(&ctx, &mock, &config).await.is_err());

        let mock = MockLocate::new(StatusCode::OK, r#"{"fqdn": ""}"#);
        let err = discover(&ctx, &mock, &config).await.unwrap_err();
        assert!(matches!(err, Error::Http(HttpError::MalformedResponse(_))));
    }

    #[tokio::test]
    async fn test_discover_surfaces_cancellation() {
        struct Cancelled;

        #[async_trait]
        impl Transport for Cancelled {
            async fn round_trip(&self, req: Request) -> Result<Response> {
                Err(req.context().err().unwrap().into())
            }
        }

        let ctx = Context::background();
        ctx.cancel();
        let err = discover(&ctx, &Cancelled, &LocateConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Context(ContextError::Canceled)));
        assert!(err.is_cancellation());
    }
}
