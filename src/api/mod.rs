//! HTTP API module for health, greeting, info and status endpoints.

pub mod handlers;
pub mod middleware;
pub mod routes;

pub use handlers::AppState;
pub use routes::{create_router, with_server_layers};
