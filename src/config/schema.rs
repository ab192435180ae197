//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! Values are produced by `loader.rs` from an `Environment` snapshot.

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

use serde::Serialize;

/// Root configuration for the core service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    /// Which service to build and what to call it.
    pub service: ServiceConfig,

    /// Listener configuration (bind address, connection bound).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Status endpoint protection.
    pub admin: AdminConfig,
}

/// Service selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub kind: ServiceKind,
    pub name: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            kind: ServiceKind::Http,
            name: "core-service".to_string(),
        }
    }
}

/// Concrete service implementations the factory can assemble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
    /// HTTP health/status service.
    Http,
    /// Bounded TCP echo service.
    Echo,
}

impl ServiceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceKind::Http => "http",
            ServiceKind::Echo => "echo",
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "http" => Ok(ServiceKind::Http),
            "echo" => Ok(ServiceKind::Echo),
            other => Err(format!("unknown service kind `{}` (expected http or echo)", other)),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080"). No default.
    pub bind_address: SocketAddr,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,
}

impl ListenerConfig {
    pub fn new(bind_address: SocketAddr) -> Self {
        Self {
            bind_address,
            max_connections: 10_000,
        }
    }
}

/// Timeout configuration, all in seconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeoutConfig {
    /// Total time allowed for one HTTP request.
    pub request_secs: u64,

    /// Idle time after which an echo connection is closed.
    pub idle_secs: u64,

    /// Time allowed for draining in-flight work after shutdown.
    pub shutdown_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            idle_secs: 60,
            shutdown_secs: 10,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format `{}` (expected pretty or json)", other)),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Human-readable or JSON log lines.
    pub log_format: LogFormat,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: SocketAddr,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: SocketAddr::from(([0, 0, 0, 0], 9090)),
        }
    }
}

/// Status endpoint protection.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct AdminConfig {
    /// Bearer token required by `/status` when set.
    pub api_key: Option<String>,
}

// Keeps the key out of logs.
impl fmt::Debug for AdminConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}
