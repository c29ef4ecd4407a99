// Shared test helpers: local TLS and HTTP servers, client configurations and
// measurement roots.
//
// This module provides common utilities used across multiple test files to reduce duplication.
#![allow(dead_code)] // Each test file uses a different subset

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use rustls::crypto::ring::default_provider;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::{ClientConfig, RootCertStore, ServerConfig};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;

use probe_netx::initialization::init_tls_config_with_roots;
use probe_netx::model::{MeasurementRoot, SavingSink};
use probe_netx::Context;

/// Self-signed certificate for `localhost` (EC P-256, valid until 2120).
pub const CERT_DER: &[u8] = include_bytes!("data/localhost.cert.der");
/// PKCS#8 private key matching [`CERT_DER`].
pub const KEY_DER: &[u8] = include_bytes!("data/localhost.key.der");

/// Server configuration presenting the embedded certificate.
pub fn server_config(alpn: &[&[u8]]) -> Arc<ServerConfig> {
    let mut config = ServerConfig::builder_with_provider(Arc::new(default_provider()))
        .with_safe_default_protocol_versions()
        .expect("Failed to select protocol versions")
        .with_no_client_auth()
        .with_single_cert(
            vec![CertificateDer::from(CERT_DER.to_vec())],
            PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(KEY_DER.to_vec())),
        )
        .expect("Failed to load test certificate");
    config.alpn_protocols = alpn.iter().map(|proto| proto.to_vec()).collect();
    Arc::new(config)
}

/// Client configuration trusting only the embedded certificate.
pub fn trusting_client_config() -> Arc<ClientConfig> {
    let mut roots = RootCertStore::empty();
    roots
        .add(CertificateDer::from(CERT_DER.to_vec()))
        .expect("Failed to trust test certificate");
    init_tls_config_with_roots(roots, &["http/1.1".to_string()])
        .expect("Failed to build client config")
}

/// Context whose root collects measurements into the returned sink.
pub fn saving_context() -> (Context, Arc<SavingSink>) {
    let sink = Arc::new(SavingSink::new());
    let root = MeasurementRoot::new(sink.clone());
    (Context::background().with_root(Arc::new(root)), sink)
}

/// Context whose root resolves every hostname to `127.0.0.1`.
pub fn loopback_context() -> (Context, Arc<SavingSink>) {
    let sink = Arc::new(SavingSink::new());
    let root = MeasurementRoot::new(sink.clone())
        .with_lookup_host(|_ctx, _host| async { Ok(vec!["127.0.0.1".to_string()]) });
    (Context::background().with_root(Arc::new(root)), sink)
}

/// Reads one request head (up to the blank line), or `None` on EOF.
pub async fn read_request_head<S: AsyncRead + Unpin>(stream: &mut S) -> Option<String> {
    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        match stream.read(&mut byte).await {
            Ok(0) | Err(_) => return None,
            Ok(_) => head.push(byte[0]),
        }
        if head.ends_with(b"\r\n\r\n") {
            return Some(String::from_utf8_lossy(&head).into_owned());
        }
    }
}

/// A local server answering from a fixed script of raw responses.
pub struct RawServer {
    /// Listening address
    pub addr: SocketAddr,
    /// Connections accepted so far
    pub accepted: Arc<AtomicUsize>,
    /// Request heads received, in order
    pub requests: Arc<Mutex<Vec<String>>>,
}

impl RawServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }
}

async fn serve_script<S: AsyncRead + AsyncWrite + Unpin>(
    mut stream: S,
    script: Arc<Mutex<VecDeque<&'static [u8]>>>,
    requests: Arc<Mutex<Vec<String>>>,
    one_per_connection: bool,
) {
    while let Some(head) = read_request_head(&mut stream).await {
        requests.lock().unwrap().push(head);
        let next = script.lock().unwrap().pop_front();
        let Some(response) = next else {
            return;
        };
        if stream.write_all(response).await.is_err() {
            return;
        }
        let closing = String::from_utf8_lossy(response).contains("Connection: close");
        if closing || one_per_connection {
            let _ = stream.shutdown().await;
            return;
        }
    }
}

/// Spawns a plain HTTP server that answers the n-th request with
/// `responses[n]`, closing the connection when the script runs out or a
/// response carries `Connection: close`.
pub async fn spawn_raw_http_server(responses: Vec<&'static [u8]>) -> RawServer {
    spawn_http_server(responses, false).await
}

/// Like [`spawn_raw_http_server`], but closes every connection right after
/// its first response without announcing it, as servers with a short
/// keep-alive timeout do.
pub async fn spawn_closing_http_server(responses: Vec<&'static [u8]>) -> RawServer {
    spawn_http_server(responses, true).await
}

async fn spawn_http_server(responses: Vec<&'static [u8]>, one_per_connection: bool) -> RawServer {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().expect("Failed to read local address");
    let accepted = Arc::new(AtomicUsize::new(0));
    let requests = Arc::new(Mutex::new(Vec::new()));
    let script = Arc::new(Mutex::new(VecDeque::from(responses)));

    let counter = Arc::clone(&accepted);
    let seen = Arc::clone(&requests);
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(serve_script(
                stream,
                Arc::clone(&script),
                Arc::clone(&seen),
                one_per_connection,
            ));
        }
    });

    RawServer {
        addr,
        accepted,
        requests,
    }
}

/// Spawns a TLS server with the embedded certificate that answers from a
/// script like [`spawn_raw_http_server`].
pub async fn spawn_https_server(responses: Vec<&'static [u8]>) -> RawServer {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().expect("Failed to read local address");
    let accepted = Arc::new(AtomicUsize::new(0));
    let requests = Arc::new(Mutex::new(Vec::new()));
    let script = Arc::new(Mutex::new(VecDeque::from(responses)));
    let acceptor = TlsAcceptor::from(server_config(&[b"http/1.1"]));

    let counter = Arc::clone(&accepted);
    let seen = Arc::clone(&requests);
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            let acceptor = acceptor.clone();
            let script = Arc::clone(&script);
            let seen = Arc::clone(&seen);
            tokio::spawn(async move {
                if let Ok(tls) = acceptor.accept(stream).await {
                    serve_script(tls, script, seen, false).await;
                }
            });
        }
    });

    RawServer {
        addr,
        accepted,
        requests,
    }
}

/// Spawns a TLS server that echoes application data back.
pub async fn spawn_tls_echo_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().expect("Failed to read local address");
    let acceptor = TlsAcceptor::from(server_config(&[b"http/1.1"]));
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let acceptor = acceptor.clone();
            tokio::spawn(async move {
                if let Ok(tls) = acceptor.accept(stream).await {
                    let (mut reader, mut writer) = tokio::io::split(tls);
                    let _ = tokio::io::copy(&mut reader, &mut writer).await;
                }
            });
        }
    });
    addr
}
