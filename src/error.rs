//! Unified error types for the service.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Errors raised while starting or running the server.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration loading error.
    #[error("configuration error: {0}")]
    Config(#[from] envy::Error),

    /// Configuration loaded but failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Prometheus recorder could not be installed.
    #[error("metrics error: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    /// IO error (bind, accept).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors a request handler can return.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Response body could not be encoded as JSON.
    #[error("json error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self, "Failed to build response");

        (
            StatusCode::INTERNAL_SERVER_ERROR,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.to_string(),
        )
            .into_response()
    }
}

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, AppError>;
