//! Integration tests for the sample HTTP service.
//!
//! Each test starts a real server on an ephemeral loopback port and talks to
//! it over HTTP.
//!
//! Run with: cargo test --test integration

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use pretty_assertions::assert_eq;
use sample_app::api::handlers::{GreetResponse, HealthResponse, InfoResponse, StatusResponse};
use sample_app::api::{create_router, AppState};
use sample_app::config::Config;
use sample_app::server::{self, ServerSettings};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// A server running in the background for the duration of a test.
struct TestServer {
    addr: SocketAddr,
    state: AppState,
    stop: Option<oneshot::Sender<()>>,
    handle: JoinHandle<sample_app::Result<()>>,
}

impl TestServer {
    async fn start(config: Config) -> Self {
        let settings = ServerSettings {
            addr: SocketAddr::new(config.host, 0),
            ..ServerSettings::from_config(&config)
        };
        let state = AppState::new(config.app_version.as_str());

        let listener = server::bind(&settings).await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (stop, stopped) = oneshot::channel::<()>();
        let router = create_router(state.clone());
        let handle = tokio::spawn(async move {
            server::serve(listener, router, &settings, async {
                stopped.await.ok();
            })
            .await
        });

        Self {
            addr,
            state,
            stop: Some(stop),
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> T {
        let response = reqwest::get(self.url(path)).await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        response.json().await.unwrap()
    }

    async fn shutdown(mut self) {
        if let Some(stop) = self.stop.take() {
            stop.send(()).ok();
        }
        tokio::time::timeout(Duration::from_secs(5), self.handle)
            .await
            .expect("server did not stop")
            .unwrap()
            .unwrap();
    }
}

fn config_with(pairs: &[(&str, &str)]) -> Config {
    Config::from_pairs(
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string())),
    )
    .unwrap()
}

/// Read one HTTP/1.1 response (headers plus `content-length` body) off `stream`.
async fn read_response(stream: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];

    loop {
        if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..end]).to_lowercase();
            let length = head
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .map(|value| value.trim().parse::<usize>().unwrap())
                .unwrap_or(0);
            if buf.len() >= end + 4 + length {
                return String::from_utf8_lossy(&buf).into_owned();
            }
        }

        let n = stream.read(&mut chunk).await.unwrap();
        assert_ne!(n, 0, "connection closed before a full response arrived");
        buf.extend_from_slice(&chunk[..n]);
    }
}

/// Wait for the peer to close `stream`, returning whatever it sent first.
async fn wait_for_close(stream: &mut TcpStream, limit: Duration) -> Option<Vec<u8>> {
    let mut rest = Vec::new();
    match tokio::time::timeout(limit, stream.read_to_end(&mut rest)).await {
        Ok(_) => Some(rest),
        Err(_) => None,
    }
}

#[tokio::test]
async fn health_over_http() {
    let server = TestServer::start(Config::default()).await;

    let response = reqwest::get(server.url("/health")).await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(
        response.headers()[reqwest::header::CONTENT_TYPE],
        "application/json"
    );

    let body: HealthResponse = response.json().await.unwrap();
    assert_eq!(body.status, "ok");
    assert_eq!(body.version, "0.1.0");

    server.shutdown().await;
}

#[tokio::test]
async fn greet_over_http() {
    let server = TestServer::start(Config::default()).await;

    let named: GreetResponse = server.get("/api/greet?name=Alice").await;
    let anonymous: GreetResponse = server.get("/api/greet").await;

    assert_eq!(named.message, "Hello, Alice!");
    assert_eq!(anonymous.message, "Hello, World!");

    server.shutdown().await;
}

#[tokio::test]
async fn configured_version_reaches_every_endpoint() {
    let server = TestServer::start(config_with(&[("APP_VERSION", "9.9.9")])).await;

    let health: HealthResponse = server.get("/health").await;
    let info: InfoResponse = server.get("/api/info").await;
    let status: StatusResponse = server.get("/api/status").await;

    assert_eq!(health.version, "9.9.9");
    assert_eq!(info.version, "9.9.9");
    assert_eq!(info.app, "sample-app-go");
    assert!(!info.runtime_version.is_empty());
    assert_eq!(status.version, "9.9.9");

    server.shutdown().await;
}

#[tokio::test]
async fn status_reflects_prior_requests() {
    const REQUESTS: u64 = 5;

    let server = TestServer::start(Config::default()).await;

    for _ in 0..REQUESTS {
        let _: HealthResponse = server.get("/health").await;
    }

    let status: StatusResponse = server.get("/api/status").await;
    assert!(status.request_count >= REQUESTS + 1);

    server.shutdown().await;
}

#[tokio::test]
async fn concurrent_clients_lose_no_updates() {
    const REQUESTS: usize = 64;

    let server = TestServer::start(Config::default()).await;
    let client = reqwest::Client::new();

    let requests = (0..REQUESTS).map(|i| {
        let client = client.clone();
        let url = server.url(&format!("/api/greet?name=client{i}"));
        async move { client.get(url).send().await.unwrap().status() }
    });

    for status in futures::future::join_all(requests).await {
        assert_eq!(status, reqwest::StatusCode::OK);
    }

    assert_eq!(server.state.request_count(), REQUESTS as u64);

    server.shutdown().await;
}

#[tokio::test]
async fn unknown_route_is_404() {
    let server = TestServer::start(Config::default()).await;

    let response = reqwest::get(server.url("/does-not-exist")).await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);

    server.shutdown().await;
}

#[tokio::test]
async fn port_setting_controls_bind_address() {
    let config = config_with(&[("PORT", "9090")]);
    let settings = ServerSettings::from_config(&config);

    assert_eq!(settings.addr.port(), 9090);
    assert_eq!(settings.addr.to_string(), "127.0.0.1:9090");
}

#[tokio::test]
async fn busy_keep_alive_connection_outlives_idle_timeout() {
    let server = TestServer::start(config_with(&[("IDLE_TIMEOUT_SECS", "1")])).await;
    let mut stream = TcpStream::connect(server.addr).await.unwrap();

    let started = Instant::now();
    let mut served = 0;
    while started.elapsed() < Duration::from_millis(2500) {
        stream
            .write_all(b"GET /health HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .await
            .unwrap();
        let response = read_response(&mut stream).await;
        assert!(response.starts_with("HTTP/1.1 200"), "{response}");
        served += 1;
        tokio::time::sleep(Duration::from_millis(300)).await;
    }
    assert!(served >= 6);

    // Once the client goes quiet the connection is closed.
    let closed = wait_for_close(&mut stream, Duration::from_secs(5)).await;
    assert!(closed.is_some(), "idle connection was left open");

    server.shutdown().await;
}

#[tokio::test]
async fn partial_headers_are_cut_off_after_read_timeout() {
    let server = TestServer::start(config_with(&[("READ_TIMEOUT_SECS", "1")])).await;
    let mut stream = TcpStream::connect(server.addr).await.unwrap();

    stream
        .write_all(b"GET /health HTTP/1.1\r\nHost: loc")
        .await
        .unwrap();
    let started = Instant::now();

    let sent = wait_for_close(&mut stream, Duration::from_secs(5))
        .await
        .expect("connection with unfinished headers was left open");

    assert!(started.elapsed() >= Duration::from_millis(500));
    assert!(!String::from_utf8_lossy(&sent).contains("200 OK"));

    server.shutdown().await;
}
