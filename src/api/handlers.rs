//! HTTP API handlers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{RawQuery, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, OpenApi, ToSchema};

use crate::error::ApiError;
use crate::utils::{format_uptime, RUNTIME_VERSION};

/// Application name reported by `/api/info`.
pub const APP_NAME: &str = "sample-app-go";

/// Application state shared with handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Version reported by every endpoint.
    pub version: Arc<str>,
    /// When the state (and so the server) was created.
    pub started_at: Instant,
    /// Requests seen by the counting middleware.
    pub request_count: Arc<AtomicU64>,
    /// Prometheus render handle, when a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Create new app state.
    pub fn new(version: impl Into<Arc<str>>) -> Self {
        Self {
            version: version.into(),
            started_at: Instant::now(),
            request_count: Arc::new(AtomicU64::new(0)),
            metrics: None,
        }
    }

    /// Attach a Prometheus handle so `/metrics` is served.
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Record one request, returning the new total.
    pub fn record_request(&self) -> u64 {
        self.request_count.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Current request total.
    pub fn request_count(&self) -> u64 {
        self.request_count.load(Ordering::SeqCst)
    }
}

/// Health check response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Status: "ok".
    pub status: String,
    /// Application version.
    pub version: String,
}

/// Greeting response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct GreetResponse {
    /// The greeting, e.g. "Hello, World!".
    pub message: String,
}

/// Application info response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct InfoResponse {
    /// Application name.
    pub app: String,
    /// Application version.
    pub version: String,
    /// Compiler version the binary was built with.
    pub runtime_version: String,
}

/// Status response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StatusResponse {
    /// Time since start, rounded to the second (e.g. "1h2m3s").
    pub uptime: String,
    /// Application version.
    pub version: String,
    /// Requests served so far, including this one.
    pub request_count: u64,
    /// Compiler version the binary was built with.
    pub runtime_version: String,
}

/// Query parameters accepted by the greet endpoint.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct GreetParams {
    /// Who to greet; defaults to "World".
    pub name: Option<String>,
}

/// Encode `value` as an `application/json` response.
pub fn json_response<T: Serialize>(value: &T) -> Result<Response, ApiError> {
    let body = serde_json::to_vec(value)?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        body,
    )
        .into_response())
}

/// Health check handler - always returns 200.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health(State(state): State<AppState>) -> Result<Response, ApiError> {
    json_response(&HealthResponse {
        status: "ok".to_string(),
        version: state.version.to_string(),
    })
}

/// Greet handler - says hello to `name`, or to the world.
#[utoipa::path(
    get,
    path = "/api/greet",
    params(GreetParams),
    responses((status = 200, description = "Greeting", body = GreetResponse))
)]
pub async fn greet(RawQuery(query): RawQuery) -> Result<Response, ApiError> {
    let name = query
        .as_deref()
        .and_then(|q| {
            url::form_urlencoded::parse(q.as_bytes())
                .find(|(key, _)| key == "name")
                .map(|(_, value)| value.into_owned())
        })
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "World".to_string());

    json_response(&GreetResponse {
        message: format!("Hello, {}!", name),
    })
}

/// Info handler - returns application metadata.
#[utoipa::path(
    get,
    path = "/api/info",
    responses((status = 200, description = "Application metadata", body = InfoResponse))
)]
pub async fn info(State(state): State<AppState>) -> Result<Response, ApiError> {
    json_response(&InfoResponse {
        app: APP_NAME.to_string(),
        version: state.version.to_string(),
        runtime_version: RUNTIME_VERSION.to_string(),
    })
}

/// Status handler - returns uptime and the request counter.
#[utoipa::path(
    get,
    path = "/api/status",
    responses((status = 200, description = "Uptime and request count", body = StatusResponse))
)]
pub async fn status(State(state): State<AppState>) -> Result<Response, ApiError> {
    json_response(&StatusResponse {
        uptime: format_uptime(state.started_at.elapsed()),
        version: state.version.to_string(),
        request_count: state.request_count(),
        runtime_version: RUNTIME_VERSION.to_string(),
    })
}

/// Prometheus exposition handler. Only routed when a recorder is installed.
pub async fn metrics(State(state): State<AppState>) -> Response {
    match state.metrics {
        Some(handle) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// OpenAPI description of the JSON endpoints.
#[derive(OpenApi)]
#[openapi(
    paths(health, greet, info, status),
    components(schemas(HealthResponse, GreetResponse, InfoResponse, StatusResponse))
)]
pub struct ApiDoc;

/// OpenAPI document handler.
pub async fn openapi() -> Result<Response, ApiError> {
    json_response(&ApiDoc::openapi())
}
