//! Dialer resolving hostnames and trying each returned address.

use std::io;
use std::net::IpAddr;

use async_trait::async_trait;

use crate::context::Context;
use crate::dialer::{BoxConn, Dialer};
use crate::error_handling::{classify_result, Error, Result};
use crate::resolver::Resolver;
use crate::utils::{join_host_port, split_host_port};

/// Splits `host:port`, resolves the host and dials each address in order.
///
/// The first successful connection wins. When every attempt fails, the
/// attempt errors are reduced to a single one with [`reduce_errors`].
/// Cancellation stops the sequence and is returned as is.
#[derive(Debug)]
pub struct ResolvingDialer<D, R> {
    dialer: D,
    resolver: R,
}

impl<D, R> ResolvingDialer<D, R> {
    /// Dials through `dialer` the addresses `resolver` returns.
    pub fn new(dialer: D, resolver: R) -> Self {
        Self { dialer, resolver }
    }
}

#[async_trait]
impl<D: Dialer, R: Resolver> Dialer for ResolvingDialer<D, R> {
    async fn dial_context(&self, ctx: &Context, network: &str, address: &str) -> Result<BoxConn> {
        let (host, port) =
            classify_result(split_host_port(address).map_err(Error::from), "split_host_port", None)?;
        let addrs = if host.parse::<IpAddr>().is_ok() {
            vec![host.clone()]
        } else {
            self.resolver.lookup_host(ctx, &host).await?
        };

        let mut errors = Vec::with_capacity(addrs.len());
        for addr in &addrs {
            if let Some(err) = ctx.err() {
                return Err(err.into());
            }
            match self
                .dialer
                .dial_context(ctx, network, &join_host_port(addr, &port))
                .await
            {
                Ok(conn) => return Ok(conn),
                Err(err) if err.is_cancellation() => return Err(err),
                Err(err) => errors.push(err),
            }
        }
        Err(reduce_errors(errors).unwrap_or_else(|| {
            Error::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{host}: no addresses to dial"),
            ))
        }))
    }
}

/// Reduces the errors of a multi-address dial to the most informative one.
///
/// - No errors: `None`.
/// - One error: that error.
/// - Several: the first classified error whose failure is meaningful (not
///   `unknown_error`), otherwise the first error.
pub fn reduce_errors(mut errors: Vec<Error>) -> Option<Error> {
    if errors.len() <= 1 {
        return errors.pop();
    }
    let index = errors
        .iter()
        .position(|err| {
            err.as_wrapped()
                .is_some_and(|wrapped| wrapped.failure().is_meaningful())
        })
        .unwrap_or(0);
    Some(errors.swap_remove(index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextError;
    use crate::dialer::BaseDialer;
    use crate::error_handling::{Failure, FailureCode, WrappedError};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::net::TcpListener;

    fn classified(code: FailureCode, message: &str) -> Error {
        Error::Wrapped(WrappedError::new(
            "connect",
            None,
            Failure::new(code),
            Error::other(message.to_string()),
        ))
    }

    fn unknown(message: &str) -> Error {
        Error::Wrapped(WrappedError::new(
            "connect",
            None,
            Failure::unknown(message),
            Error::other(message.to_string()),
        ))
    }

    #[test]
    fn test_reduce_errors_empty() {
        assert!(reduce_errors(Vec::new()).is_none());
    }

    #[test]
    fn test_reduce_errors_single() {
        let err = reduce_errors(vec![Error::other("mocked error #1")]).unwrap();
        assert_eq!(err.to_string(), "mocked error #1");
    }

    #[test]
    fn test_reduce_errors_plain_errors_keep_first() {
        let err = reduce_errors(vec![
            Error::other("mocked error #1"),
            Error::other("mocked error #2"),
        ])
        .unwrap();
        assert_eq!(err.to_string(), "mocked error #1");
    }

    #[test]
    fn test_reduce_errors_prefers_meaningful_failure() {
        let err = reduce_errors(vec![
            unknown("mocked error #1"),
            classified(FailureCode::ConnectionRefused, "refused"),
            Error::other("mocked error #3"),
        ])
        .unwrap();
        assert_eq!(err.to_string(), "connection_refused");
    }

    #[test]
    fn test_reduce_errors_refused_wins_over_plain_and_unknown() {
        let err = reduce_errors(vec![
            Error::other("plain error #1"),
            unknown("antani"),
            classified(FailureCode::ConnectionRefused, "refused"),
            Error::other("plain error #2"),
        ])
        .unwrap();
        assert_eq!(err.to_string(), "connection_refused");
        assert_eq!(err.failure().code(), FailureCode::ConnectionRefused);
    }

    #[test]
    fn test_reduce_errors_unknown_only_keeps_first() {
        let err = reduce_errors(vec![unknown("first"), unknown("second")]).unwrap();
        assert_eq!(err.to_string(), "unknown_error: first");
    }

    struct ScriptedResolver(Vec<String>);

    #[async_trait]
    impl Resolver for ScriptedResolver {
        async fn lookup_host(&self, _ctx: &Context, _hostname: &str) -> Result<Vec<String>> {
            Ok(self.0.clone())
        }
    }

    #[derive(Default)]
    struct RecordingDialer {
        attempts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Dialer for RecordingDialer {
        async fn dial_context(
            &self,
            _ctx: &Context,
            _network: &str,
            address: &str,
        ) -> Result<BoxConn> {
            self.attempts.lock().unwrap().push(address.to_string());
            Err(classified(FailureCode::ConnectionRefused, address))
        }
    }

    #[tokio::test]
    async fn test_malformed_address_is_classified() {
        let dialer = ResolvingDialer::new(
            RecordingDialer::default(),
            ScriptedResolver(vec!["127.0.0.1".into()]),
        );
        let err = dialer
            .dial_context(&Context::background(), "tcp", "antani")
            .await
            .unwrap_err();
        let wrapped = err.as_wrapped().unwrap();
        assert_eq!(wrapped.operation(), "split_host_port");
        assert!(dialer.dialer.attempts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_tries_every_address_in_order() {
        let dialer = ResolvingDialer::new(
            RecordingDialer::default(),
            ScriptedResolver(vec!["10.0.0.1".into(), "::1".into()]),
        );
        let err = dialer
            .dial_context(&Context::background(), "tcp", "dual.test:443")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "connection_refused");
        assert_eq!(
            *dialer.dialer.attempts.lock().unwrap(),
            vec!["10.0.0.1:443".to_string(), "[::1]:443".to_string()]
        );
    }

    #[tokio::test]
    async fn test_ip_literal_skips_resolution() {
        struct CountingResolver(AtomicUsize);

        #[async_trait]
        impl Resolver for CountingResolver {
            async fn lookup_host(&self, _ctx: &Context, _hostname: &str) -> Result<Vec<String>> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Ok(Vec::new())
            }
        }

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let dialer = ResolvingDialer::new(BaseDialer::default(), CountingResolver(AtomicUsize::new(0)));
        let conn = dialer
            .dial_context(&Context::background(), "tcp", &address)
            .await
            .unwrap();
        assert!(conn.conn_id().is_some());
        assert_eq!(dialer.resolver.0.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_resolution_is_an_error() {
        let dialer = ResolvingDialer::new(RecordingDialer::default(), ScriptedResolver(Vec::new()));
        let err = dialer
            .dial_context(&Context::background(), "tcp", "empty.test:80")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no addresses to dial"));
    }

    #[tokio::test]
    async fn test_cancellation_stops_the_sequence() {
        let dialer = ResolvingDialer::new(
            RecordingDialer::default(),
            ScriptedResolver(vec!["10.0.0.1".into(), "10.0.0.2".into()]),
        );
        let ctx = Context::background();
        ctx.cancel();
        let err = dialer
            .dial_context(&ctx, "tcp", "dual.test:443")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Context(ContextError::Canceled)));
        assert!(dialer.dialer.attempts.lock().unwrap().is_empty());
    }
}
