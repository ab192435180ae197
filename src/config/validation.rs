//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (parsing handles syntactic)
//! - Validate value ranges (timeouts > 0, connection bounds)
//! - Detect conflicting listeners
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: CoreConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is handed to the factory

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::loader::{
    IDLE_TIMEOUT_SECS, LOG_LEVEL, MAX_CONNECTIONS, METRICS_ADDRESS, REQUEST_TIMEOUT_SECS,
    SERVICE_NAME, SHUTDOWN_TIMEOUT_SECS,
};
use crate::config::schema::CoreConfig;

/// Upper bound for `max_connections`.
pub const MAX_CONNECTIONS_LIMIT: usize = 1_000_000;

/// Levels accepted by `CORE_LOG_LEVEL`.
pub const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    /// Environment key the problem belongs to.
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Check a parsed configuration, collecting every problem.
pub fn validate_config(config: &CoreConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.service.name.chars().any(char::is_control) {
        errors.push(ValidationError::new(
            SERVICE_NAME,
            "must not contain control characters",
        ));
    }

    let max = config.listener.max_connections;
    if max == 0 || max > MAX_CONNECTIONS_LIMIT {
        errors.push(ValidationError::new(
            MAX_CONNECTIONS,
            format!("must be between 1 and {}, got {}", MAX_CONNECTIONS_LIMIT, max),
        ));
    }

    for (field, value) in [
        (REQUEST_TIMEOUT_SECS, config.timeouts.request_secs),
        (IDLE_TIMEOUT_SECS, config.timeouts.idle_secs),
        (SHUTDOWN_TIMEOUT_SECS, config.timeouts.shutdown_secs),
    ] {
        if value == 0 {
            errors.push(ValidationError::new(field, "must be greater than 0"));
        }
    }

    if !LOG_LEVELS.contains(&config.observability.log_level.as_str()) {
        errors.push(ValidationError::new(
            LOG_LEVEL,
            format!(
                "unknown level `{}` (expected one of {})",
                config.observability.log_level,
                LOG_LEVELS.join(", ")
            ),
        ));
    }

    if config.observability.metrics_enabled
        && addresses_overlap(config.observability.metrics_address, config.listener.bind_address)
    {
        errors.push(ValidationError::new(
            METRICS_ADDRESS,
            format!(
                "{} overlaps CORE_BIND_ADDRESS {}",
                config.observability.metrics_address, config.listener.bind_address
            ),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Whether two listeners would compete for the same socket.
///
/// Port 0 never conflicts. An unspecified IP binds every interface, so it
/// overlaps any address on the same port.
fn addresses_overlap(a: SocketAddr, b: SocketAddr) -> bool {
    if a.port() == 0 || a.port() != b.port() {
        return false;
    }
    a.ip() == b.ip() || a.ip().is_unspecified() || b.ip().is_unspecified()
}
