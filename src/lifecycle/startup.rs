//! Startup orchestration.
//!
//! # Responsibilities
//! - Ask the factory for the service, once
//! - Run it, once, only after construction succeeded
//! - Hand the terminal outcome back to the process boundary
//!
//! # Design Decisions
//! - Fail fast: any construction or run error is fatal
//! - No retries and no recovery at this layer

use std::fmt;

use thiserror::Error;

use crate::config::{ConfigError, Environment};
use crate::factory;
use crate::service::{Service, ServiceError};

/// Terminal failure of the process.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("service error: {0}")]
    Service(#[from] ServiceError),
}

/// Entry point phases.
///
/// ```text
/// Start → Constructing → Running → Terminated
///               └──────────────────→ Terminated   (factory failed)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Start,
    Constructing,
    Running,
    Terminated,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Start => "start",
            Phase::Constructing => "constructing",
            Phase::Running => "running",
            Phase::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// Construct a service with `create` and run it to completion.
pub async fn bootstrap<F>(create: F) -> Result<(), BootstrapError>
where
    F: FnOnce() -> Result<Box<dyn Service>, ConfigError>,
{
    tracing::debug!(phase = %Phase::Start, "core-service v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::debug!(phase = %Phase::Constructing, "Constructing service");
    let service = match create() {
        Ok(service) => service,
        Err(e) => {
            tracing::error!(phase = %Phase::Terminated, error = %e, "Service construction failed");
            return Err(e.into());
        }
    };

    tracing::info!(phase = %Phase::Running, service = %service.name(), "Service constructed");
    let outcome = service.run().await;

    tracing::debug!(phase = %Phase::Terminated, ok = outcome.is_ok(), "Entry point finished");
    outcome.map_err(BootstrapError::from)
}

/// Construct the service described by `env` and run it.
pub async fn launch(env: &Environment) -> Result<(), BootstrapError> {
    bootstrap(|| factory::create_service(env)).await
}
