//! HTTP server runtime: binding, per-connection timeouts and graceful shutdown.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::{service_fn, Service};
use hyper::Request;
use hyper_util::rt::{TokioIo, TokioTimer};
use hyper_util::service::TowerToHyperService;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::api::with_server_layers;
use crate::config::Config;
use crate::error::Result;

/// Resolved settings the server runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerSettings {
    /// Address to bind.
    pub addr: SocketAddr,
    /// Time allowed for a client to send request headers.
    pub read_timeout: Duration,
    /// Deadline for producing a response; late requests get 408.
    pub write_timeout: Duration,
    /// How long a connection may sit without requests before it is closed.
    pub idle_timeout: Duration,
}

impl ServerSettings {
    /// Build settings from configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            addr: config.listen_addr(),
            read_timeout: config.read_timeout(),
            write_timeout: config.write_timeout(),
            idle_timeout: config.idle_timeout(),
        }
    }
}

/// Bind the listener for `settings`.
pub async fn bind(settings: &ServerSettings) -> Result<TcpListener> {
    let listener = TcpListener::bind(settings.addr).await?;
    info!("HTTP server listening on {}", listener.local_addr()?);
    Ok(listener)
}

/// Serve `router` on `listener` until `shutdown` resolves.
///
/// Connections already accepted keep running after shutdown until they
/// complete or hit their idle timeout.
pub async fn serve<F>(
    listener: TcpListener,
    router: Router,
    settings: &ServerSettings,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send,
{
    let router = with_server_layers(router, settings.write_timeout);

    let mut http = http1::Builder::new();
    http.timer(TokioTimer::new())
        .header_read_timeout(settings.read_timeout);

    let idle_timeout = settings.idle_timeout;
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!("Failed to accept connection: {}", e);
                        continue;
                    }
                };

                let inner = TowerToHyperService::new(router.clone());
                let activity = ConnectionActivity::new();
                let tracked = activity.clone();
                let service = service_fn(move |request: Request<Incoming>| {
                    let active = tracked.begin();
                    let response = inner.call(request);
                    async move {
                        let response = response.await;
                        drop(active);
                        response
                    }
                });
                let http = http.clone();

                tokio::spawn(async move {
                    let conn = http.serve_connection(TokioIo::new(stream), service);
                    tokio::pin!(conn);

                    let expiry = tokio::time::sleep(idle_timeout);
                    tokio::pin!(expiry);
                    let mut closing = false;

                    loop {
                        tokio::select! {
                            result = conn.as_mut() => {
                                if let Err(e) = result {
                                    debug!(%peer, "Connection closed with error: {}", e);
                                }
                                break;
                            }
                            _ = &mut expiry, if !closing => {
                                match activity.idle_deadline(idle_timeout) {
                                    Some(deadline) if deadline <= Instant::now() => {
                                        debug!(%peer, "Idle timeout reached, closing connection");
                                        conn.as_mut().graceful_shutdown();
                                        closing = true;
                                    }
                                    Some(deadline) => {
                                        expiry.as_mut().reset(tokio::time::Instant::from_std(deadline));
                                    }
                                    None => {
                                        expiry.as_mut().reset(tokio::time::Instant::now() + idle_timeout);
                                    }
                                }
                            }
                        }
                    }
                });
            }
            _ = &mut shutdown => {
                info!("Shutdown requested, no longer accepting connections");
                break;
            }
        }
    }

    Ok(())
}

/// Request activity on one connection, shared between its service and its
/// idle timer.
#[derive(Debug, Clone)]
struct ConnectionActivity {
    inner: Arc<ActivityState>,
}

#[derive(Debug)]
struct ActivityState {
    opened_at: Instant,
    in_flight: AtomicUsize,
    /// Milliseconds after `opened_at` at which the last request finished.
    last_active_ms: AtomicU64,
}

/// Marks a request as in flight until dropped.
#[derive(Debug)]
struct ActiveRequest {
    activity: ConnectionActivity,
}

impl ConnectionActivity {
    fn new() -> Self {
        Self {
            inner: Arc::new(ActivityState {
                opened_at: Instant::now(),
                in_flight: AtomicUsize::new(0),
                last_active_ms: AtomicU64::new(0),
            }),
        }
    }

    fn begin(&self) -> ActiveRequest {
        self.inner.in_flight.fetch_add(1, Ordering::SeqCst);
        ActiveRequest {
            activity: self.clone(),
        }
    }

    fn touch(&self) {
        let elapsed = self.inner.opened_at.elapsed().as_millis() as u64;
        self.inner.last_active_ms.fetch_max(elapsed, Ordering::SeqCst);
    }

    /// When the connection becomes idle for `idle_timeout`, or `None` while a
    /// request is being served.
    fn idle_deadline(&self, idle_timeout: Duration) -> Option<Instant> {
        if self.inner.in_flight.load(Ordering::SeqCst) > 0 {
            return None;
        }
        let last = Duration::from_millis(self.inner.last_active_ms.load(Ordering::SeqCst));
        Some(self.inner.opened_at + last + idle_timeout)
    }
}

impl Drop for ActiveRequest {
    fn drop(&mut self) {
        self.activity.touch();
        self.activity.inner.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}
