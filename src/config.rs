//! Application configuration loaded from environment variables.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use serde::Deserialize;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // === Application ===
    /// Version string reported by every endpoint.
    #[serde(default = "default_app_version")]
    pub app_version: String,

    // === Server Configuration ===
    /// Address the HTTP server binds to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// HTTP server port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Seconds allowed for a client to send request headers.
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,

    /// Seconds allowed to produce a response.
    #[serde(default = "default_write_timeout")]
    pub write_timeout_secs: u64,

    /// Seconds after which a kept-alive connection is recycled.
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    // === Observability ===
    /// Install the Prometheus recorder and expose `/metrics`.
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,

    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub rust_log: String,
}

fn default_app_version() -> String {
    "0.1.0".to_string()
}

fn default_host() -> IpAddr {
    IpAddr::from([127, 0, 0, 1])
}

fn default_port() -> u16 {
    8080
}

fn default_read_timeout() -> u64 {
    15
}

fn default_write_timeout() -> u64 {
    15
}

fn default_idle_timeout() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_version: default_app_version(),
            host: default_host(),
            port: default_port(),
            read_timeout_secs: default_read_timeout(),
            write_timeout_secs: default_write_timeout(),
            idle_timeout_secs: default_idle_timeout(),
            metrics_enabled: default_true(),
            rust_log: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from environment, reading .env file first.
    pub fn load() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    /// Load configuration from an explicit set of key/value pairs.
    ///
    /// Keys use the same upper-case names as the process environment.
    pub fn from_pairs<I>(pairs: I) -> Result<Self, envy::Error>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        envy::from_iter(pairs)
    }

    /// Check if the configuration is valid.
    pub fn validate(&self) -> Result<(), String> {
        if self.app_version.trim().is_empty() {
            return Err("APP_VERSION must not be empty".to_string());
        }

        if self.read_timeout_secs == 0 {
            return Err("READ_TIMEOUT_SECS must be greater than 0".to_string());
        }

        if self.write_timeout_secs == 0 {
            return Err("WRITE_TIMEOUT_SECS must be greater than 0".to_string());
        }

        if self.idle_timeout_secs == 0 {
            return Err("IDLE_TIMEOUT_SECS must be greater than 0".to_string());
        }

        Ok(())
    }

    /// Socket address the server listens on.
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Header read timeout.
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    /// Per-request response deadline.
    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }

    /// Connection recycling interval.
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}
