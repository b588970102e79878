//! Request-counting middleware.

use std::time::Instant;

use axum::{
    extract::{MatchedPath, Request, State},
    middleware::Next,
    response::Response,
};
use tracing::trace;

use super::handlers::AppState;
use crate::metrics;

/// Label used for requests that matched no route.
const UNMATCHED_ENDPOINT: &str = "unmatched";

/// Count every request before handing it to the wrapped route.
pub async fn count_requests(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let total = state.record_request();

    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_owned())
        .unwrap_or_else(|| UNMATCHED_ENDPOINT.to_owned());

    trace!(endpoint = %endpoint, total, "Request counted");
    metrics::inc_http_requests(&endpoint);

    let start = Instant::now();
    let response = next.run(request).await;
    metrics::record_http_latency(start, &endpoint);

    response
}
