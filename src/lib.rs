//! Sample JSON HTTP service used to exercise CI/CD pipelines.
//!
//! The service answers a handful of GET endpoints and counts every request
//! it sees:
//!
//! ```text
//! GET /health       {"status":"ok","version":"0.1.0"}
//! GET /api/greet    {"message":"Hello, World!"}
//! GET /api/info     {"app":"sample-app-go","version":"0.1.0","runtime_version":"rustc ..."}
//! GET /api/status   {"uptime":"1m4s","version":"0.1.0","request_count":42,"runtime_version":"rustc ..."}
//! ```
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from environment
//! - [`error`]: Unified error types
//! - [`api`]: Handlers, routes and the request-counting middleware
//! - [`server`]: Listener, connection timeouts and graceful shutdown
//! - [`metrics`]: Prometheus counters and latency histograms
//! - [`utils`]: Utility functions

pub mod api;
pub mod config;
pub mod error;
pub mod metrics;
pub mod server;
pub mod utils;

pub use config::Config;
pub use error::{AppError, Result};
