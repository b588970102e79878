//! Small helpers shared by the binary and the API.

use std::time::Duration;

use tracing::info;

/// Compiler version the binary was built with, e.g. `rustc 1.83.0 (90b35a623 2024-11-26)`.
pub const RUNTIME_VERSION: &str = env!("SAMPLE_APP_RUSTC_VERSION");

/// Format a duration rounded to the nearest second, e.g. `1h2m3s`.
///
/// Zero renders as `0s`; leading zero units are omitted but inner ones are
/// kept (`1h0m5s`).
pub fn format_uptime(elapsed: Duration) -> String {
    let mut secs = elapsed.as_secs();
    if elapsed.subsec_millis() >= 500 {
        secs += 1;
    }

    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;

    if hours > 0 {
        format!("{hours}h{minutes}m{seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m{seconds}s")
    } else {
        format!("{seconds}s")
    }
}

/// Resolve when the process receives Ctrl-C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl-C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
