//! Gateway configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`). Numeric settings that are missing or
//! unparsable fall back to their defaults.

use std::net::SocketAddr;
use std::time::Duration;

/// Output format of the process log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines.
    Text,
    /// One JSON object per line.
    Json,
}

/// Top-level gateway configuration.
///
/// Loaded once at startup via [`GatewayConfig::from_env`].
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Socket address to bind the HTTP server to (e.g. `0.0.0.0:3000`).
    pub listen_addr: SocketAddr,

    /// Number of dedicated traffic-log worker threads.
    pub log_workers: usize,

    /// Capacity of the bounded traffic-log queue.
    pub log_queue_capacity: usize,

    /// Capacity of the serialized subscribe queue.
    pub subscribe_queue_capacity: usize,

    /// Per-connection outbound message buffer.
    pub outbound_buffer: usize,

    /// Timeout applied to plain HTTP requests.
    pub request_timeout: Duration,

    /// Process log output format.
    pub log_format: LogFormat,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            log_workers: 4,
            log_queue_capacity: 1024,
            subscribe_queue_capacity: 1024,
            outbound_buffer: 256,
            request_timeout: Duration::from_secs(30),
            log_format: LogFormat::Text,
        }
    }
}

impl GatewayConfig {
    /// Loads configuration from environment variables.
    ///
    /// Falls back to sensible defaults when a variable is not set.
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns an error if `LISTEN_ADDR` is set but cannot be parsed as
    /// a [`SocketAddr`].
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if `LISTEN_ADDR` is present but not a valid socket
    /// address.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let defaults = Self::default();

        let listen_addr: SocketAddr = match lookup("LISTEN_ADDR") {
            Some(addr) => addr.parse()?,
            None => defaults.listen_addr,
        };

        let log_workers = parse_var(&lookup, "LOG_WORKERS", defaults.log_workers);
        let log_queue_capacity =
            parse_var(&lookup, "LOG_QUEUE_CAPACITY", defaults.log_queue_capacity);
        let subscribe_queue_capacity = parse_var(
            &lookup,
            "SUBSCRIBE_QUEUE_CAPACITY",
            defaults.subscribe_queue_capacity,
        );
        let outbound_buffer = parse_var(&lookup, "OUTBOUND_BUFFER", defaults.outbound_buffer);
        let request_timeout = Duration::from_secs(parse_var(
            &lookup,
            "REQUEST_TIMEOUT_SECS",
            defaults.request_timeout.as_secs(),
        ));

        let log_format = match lookup("LOG_FORMAT").as_deref() {
            Some("json") | Some("JSON") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        Ok(Self {
            listen_addr,
            log_workers,
            log_queue_capacity,
            subscribe_queue_capacity,
            outbound_buffer,
            request_timeout,
            log_format,
        })
    }
}

/// Parses a variable as `T`, returning `default` on missing or invalid
/// values.
fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> T {
    lookup(key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
