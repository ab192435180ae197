//! Service factory.
//!
//! # Responsibilities
//! - Turn environment configuration into exactly one runnable service
//! - Keep construction total: parse and validate everything first
//!
//! # Design Decisions
//! - Construction has no side effects beyond reading the environment
//!   snapshot; sockets, signal handlers and the metrics exporter belong to `run`
//! - Callers receive a trait object and never see the concrete type

use crate::config::{ConfigError, CoreConfig, Environment, ServiceKind};
use crate::lifecycle::Shutdown;
use crate::service::{EchoService, HttpService, Instrumented, Service};

/// Build the service described by the current process environment.
pub fn create_service_from_environment() -> Result<Box<dyn Service>, ConfigError> {
    create_service(&Environment::capture())
}

/// Build the service described by `env`.
pub fn create_service(env: &Environment) -> Result<Box<dyn Service>, ConfigError> {
    let config = CoreConfig::from_env(env)?;
    Ok(assemble(config))
}

/// Wire a validated configuration into its service.
pub fn assemble(config: CoreConfig) -> Box<dyn Service> {
    let shutdown = Shutdown::new();
    let kind = config.service.kind;

    let inner: Box<dyn Service> = match kind {
        ServiceKind::Http => Box::new(HttpService::new(&config, shutdown)),
        ServiceKind::Echo => Box::new(EchoService::new(&config, shutdown)),
    };

    let metrics_address = config
        .observability
        .metrics_enabled
        .then_some(config.observability.metrics_address);

    tracing::debug!(
        service = %config.service.name,
        kind = %kind,
        bind_address = %config.listener.bind_address,
        metrics = metrics_address.is_some(),
        "Service assembled"
    );

    Box::new(Instrumented::new(inner, kind, metrics_address))
}
