//! Cancellation Test Suite
//!
//! **Purpose:** Verify that a cancelled context stops every layer before any
//! network activity, that cancelling or expiring it mid-flight interrupts
//! stalled reads, and that the context error reaches the caller verbatim.
//!
//! **Regressions Prevented:**
//! - Cancellation reported as `unknown_error` or a timeout instead of `context canceled`
//! - Partial results (addresses, connections) returned alongside a cancellation
//! - Body reads and snapshot captures hanging on a server that stops sending

mod helpers;

use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use tokio::time::{timeout, Instant};

use probe_netx::config::NetConfig;
use probe_netx::initialization::{init_net_stack_with_tls, NetStack};
use probe_netx::locate::{discover, LocateConfig};
use probe_netx::transport::Request;
use probe_netx::{Context, ContextError, Dialer, Error, Resolver, TlsDialer, Transport};

use helpers::{spawn_raw_http_server, trusting_client_config};

fn stack() -> NetStack {
    init_net_stack_with_tls(&NetConfig::default(), trusting_client_config())
        .expect("Failed to build stack")
}

fn cancelled() -> Context {
    let ctx = Context::background();
    ctx.cancel();
    ctx
}

/// Announces 100 bytes, sends two and then keeps the connection open.
const STALLED_RESPONSE: &[u8] = b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\n\r\nab";

fn cancel_after(ctx: &Context, delay: Duration) {
    let canceller = ctx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        canceller.cancel();
    });
}

#[tokio::test]
async fn test_dial_with_cancelled_context() {
    let stack = stack();
    let result = stack
        .dialer
        .dialer
        .dial_context(&cancelled(), "tcp", "host.name:80")
        .await;
    let err = result.expect_err("a cancelled dial must not return a connection");
    assert!(err.to_string().ends_with("context canceled"));
    assert!(stack.dialer.events.read_events().is_empty());
}

#[tokio::test]
async fn test_resolve_with_cancelled_context() {
    let stack = stack();
    let err = stack
        .resolver
        .resolver
        .lookup_host(&cancelled(), "example.com")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Context(ContextError::Canceled)));

    let events = stack.resolver.events.read_events();
    assert_eq!(events.len(), 1);
    assert!(events[0].addresses.is_empty());
    assert_eq!(events[0].failure.as_ref().unwrap().to_string(), "interrupted");
}

#[tokio::test]
async fn test_tls_dial_with_cancelled_context() {
    let stack = stack();
    let err = stack
        .tls_dialer
        .dial_tls_context(&cancelled(), "tcp", "host.name:443")
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "context canceled");
}

#[tokio::test]
async fn test_round_trip_with_cancelled_context() {
    let stack = stack();
    let req = Request::parse(Method::GET, "http://host.name/")
        .unwrap()
        .with_context(cancelled());
    let err = stack.transport.transport.round_trip(req).await.unwrap_err();
    assert_eq!(err.to_string(), "context canceled");
    assert!(err.is_cancellation());
    assert_eq!(stack.transport.events.read_events().len(), 1);
}

#[tokio::test]
async fn test_locate_with_cancelled_context() {
    let stack = stack();
    let err = discover(
        &cancelled(),
        stack.transport.transport.as_ref(),
        &LocateConfig::default(),
    )
    .await
    .unwrap_err();
    assert!(err.is_cancellation());
}

#[tokio::test]
async fn test_cancel_during_lookup() {
    let sink = Arc::new(probe_netx::model::SavingSink::new());
    let root = probe_netx::MeasurementRoot::new(sink).with_lookup_host(|_ctx, _host| async {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(vec!["127.0.0.1".to_string()])
    });
    let ctx = Context::background().with_root(Arc::new(root));
    let stack = stack();

    let canceller = ctx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });

    let start = Instant::now();
    let err = timeout(
        Duration::from_secs(5),
        stack.dialer.dialer.dial_context(&ctx, "tcp", "slow.example:80"),
    )
    .await
    .expect("cancellation must interrupt the lookup")
    .unwrap_err();
    assert!(start.elapsed() < Duration::from_secs(5));
    assert_eq!(err.to_string(), "context canceled");
}

#[tokio::test]
async fn test_cancel_during_snapshot_capture() {
    let server = spawn_raw_http_server(vec![STALLED_RESPONSE]).await;
    let stack = stack();
    let ctx = Context::background();
    cancel_after(&ctx, Duration::from_millis(200));

    let req = Request::parse(Method::GET, &server.url("/"))
        .unwrap()
        .with_context(ctx);
    let start = Instant::now();
    let err = timeout(Duration::from_secs(5), stack.transport.transport.round_trip(req))
        .await
        .expect("cancellation must interrupt the capture")
        .unwrap_err();
    assert!(start.elapsed() < Duration::from_secs(5));
    assert_eq!(err.to_string(), "context canceled");
    assert!(err.is_cancellation());
    assert!(stack.transport.snapshots.snapshots().is_empty());
}

#[tokio::test]
async fn test_cancel_during_body_read() {
    let server = spawn_raw_http_server(vec![STALLED_RESPONSE]).await;
    let stack = stack();
    let ctx = Context::background();

    let req = Request::parse(Method::GET, &server.url("/"))
        .unwrap()
        .with_context(ctx.clone());
    let resp = stack.transport.events.round_trip(req).await.unwrap();
    cancel_after(&ctx, Duration::from_millis(200));

    let err = timeout(Duration::from_secs(5), resp.body.text())
        .await
        .expect("cancellation must interrupt the body read")
        .unwrap_err();
    assert!(err.to_string().contains("context canceled"));
}

#[tokio::test]
async fn test_deadline_during_body_read() {
    let server = spawn_raw_http_server(vec![STALLED_RESPONSE]).await;
    let stack = stack();
    let ctx = Context::background().with_timeout(Duration::from_millis(300));

    let req = Request::parse(Method::GET, &server.url("/"))
        .unwrap()
        .with_context(ctx);
    let resp = stack.transport.events.round_trip(req).await.unwrap();

    let err = timeout(Duration::from_secs(5), resp.body.text())
        .await
        .expect("the deadline must interrupt the body read")
        .unwrap_err();
    assert!(err.to_string().contains("context deadline exceeded"));
}
