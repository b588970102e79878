//! HTTP API route definitions.

use std::time::Duration;

use axum::{http::StatusCode, middleware, routing::get, Router};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use super::handlers::{greet, health, info, metrics, openapi, status, AppState};
use super::middleware::count_requests;

/// Create the API router.
///
/// Every route, including `/metrics` and the OpenAPI document, passes
/// through the counting middleware.
pub fn create_router(state: AppState) -> Router {
    let mut router = Router::new()
        // Health endpoint
        .route("/health", get(health))
        // Application endpoints
        .route("/api/greet", get(greet))
        .route("/api/info", get(info))
        .route("/api/status", get(status))
        .route("/api-docs/openapi.json", get(openapi));

    if state.metrics.is_some() {
        router = router.route("/metrics", get(metrics));
    }

    router
        .layer(middleware::from_fn_with_state(state.clone(), count_requests))
        .with_state(state)
}

/// Wrap a router with request tracing and a per-request deadline.
pub fn with_server_layers(router: Router, write_timeout: Duration) -> Router {
    router
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            write_timeout,
        ))
        .layer(TraceLayer::new_for_http())
}
