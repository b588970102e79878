//! Sample HTTP service entry point.

use std::net::IpAddr;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use sample_app::api::{create_router, AppState};
use sample_app::config::Config;
use sample_app::metrics;
use sample_app::server::{self, ServerSettings};
use sample_app::utils::{shutdown_signal, RUNTIME_VERSION};
use sample_app::AppError;

/// Sample JSON HTTP service.
#[derive(Parser, Debug)]
#[command(name = "sample-app")]
#[command(about = "Health, greeting, info and status endpoints over JSON")]
#[command(version)]
struct Args {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Listen port (overrides PORT).
    #[arg(short, long, global = true)]
    port: Option<u16>,

    /// Listen address (overrides HOST).
    #[arg(long, global = true)]
    host: Option<IpAddr>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default).
    Serve,

    /// Load and validate configuration, then exit.
    CheckConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Load configuration first so RUST_LOG from .env reaches the filter
    let config = load_config(&args);

    // Initialize logging
    let filter = if args.verbose {
        EnvFilter::new("sample_app=debug,info")
    } else {
        let level = config.as_ref().map_or("info", |c| c.rust_log.as_str());
        EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let config = config.map_err(|e| {
        error!("{}", e);
        e
    })?;

    match args.command {
        Some(Command::CheckConfig) => cmd_check_config(&config),
        Some(Command::Serve) | None => cmd_serve(config).await,
    }
}

/// Load configuration from the environment and apply CLI overrides.
fn load_config(args: &Args) -> Result<Config, AppError> {
    let mut config = Config::load()?;

    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(host) = args.host {
        config.host = host;
    }

    config.validate().map_err(AppError::InvalidConfig)?;
    Ok(config)
}

/// Print the effective configuration.
fn cmd_check_config(config: &Config) -> anyhow::Result<()> {
    println!("======================================================================");
    println!("SAMPLE APP - CONFIGURATION CHECK");
    println!("======================================================================");
    println!("  Version:        {}", config.app_version);
    println!("  Listen Address: {}", config.listen_addr());
    println!("  Read Timeout:   {}s", config.read_timeout_secs);
    println!("  Write Timeout:  {}s", config.write_timeout_secs);
    println!("  Idle Timeout:   {}s", config.idle_timeout_secs);
    println!("  Metrics:        {}", if config.metrics_enabled { "Enabled" } else { "Disabled" });
    println!("  Runtime:        {}", RUNTIME_VERSION);
    println!("======================================================================");
    println!("CONFIGURATION CHECK PASSED");
    println!("======================================================================");

    Ok(())
}

/// Run the HTTP server until a shutdown signal arrives.
async fn cmd_serve(config: Config) -> anyhow::Result<()> {
    info!("Starting sample-app {} ({})", config.app_version, RUNTIME_VERSION);

    let mut app_state = AppState::new(config.app_version.as_str());
    if config.metrics_enabled {
        app_state = app_state.with_metrics(metrics::init_metrics()?);
    }

    let settings = ServerSettings::from_config(&config);
    let listener = server::bind(&settings).await.map_err(|e| {
        error!("Failed to bind {}: {}", settings.addr, e);
        e
    })?;

    let router = create_router(app_state);
    server::serve(listener, router, &settings, shutdown_signal()).await?;

    info!("Server stopped");
    Ok(())
}
