//! Prometheus metrics for request counting and latency tracking.

use std::time::{Duration, Instant};

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::Result;

// === Metric Name Constants ===

/// HTTP requests counter metric name.
pub const METRIC_HTTP_REQUESTS: &str = "http_requests_total";
/// HTTP request latency metric name.
pub const METRIC_HTTP_REQUEST_LATENCY: &str = "http_request_latency_ms";

/// How often histogram samples are drained into their summaries.
pub const UPKEEP_INTERVAL: Duration = Duration::from_secs(5);

/// Install the global Prometheus recorder and register metric descriptions.
///
/// Call this once at startup, from inside the runtime. The returned handle
/// renders the exposition text served on `/metrics`; its upkeep task is
/// already running.
pub fn init_metrics() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    describe_counter!(METRIC_HTTP_REQUESTS, "Total number of HTTP requests received");
    describe_histogram!(
        METRIC_HTTP_REQUEST_LATENCY,
        "HTTP request latency in milliseconds"
    );

    spawn_upkeep(handle.clone(), UPKEEP_INTERVAL);

    debug!("Metrics initialized");
    Ok(handle)
}

/// Periodically run upkeep on `handle` so histogram buffers stay bounded
/// between scrapes.
pub fn spawn_upkeep(handle: PrometheusHandle, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            handle.run_upkeep();
        }
    })
}

/// Increment the HTTP request counter.
pub fn inc_http_requests(endpoint: &str) {
    counter!(METRIC_HTTP_REQUESTS, "endpoint" => endpoint.to_string()).increment(1);
}

/// Record HTTP request latency.
pub fn record_http_latency(start: Instant, endpoint: &str) {
    let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
    histogram!(METRIC_HTTP_REQUEST_LATENCY, "endpoint" => endpoint.to_string()).record(latency_ms);
}
