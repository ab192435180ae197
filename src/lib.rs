//! Environment-configured service bootstrap.
//!
//! # Architecture Overview
//!
//! ```text
//!   process env ──▶ config::Environment ──▶ CoreConfig (validated)
//!                                               │
//!                                               ▼
//!                                    factory::assemble
//!                                               │
//!                         ┌─────────────────────┴─────────────────────┐
//!                         ▼                                           ▼
//!                 service::HttpService                       service::EchoService
//!                         └─────────────────────┬─────────────────────┘
//!                                               ▼
//!                                   service::Instrumented
//!                                               │
//!                                               ▼
//!                         lifecycle::bootstrap: run() exactly once
//!
//!   Cross-cutting: observability (logging, metrics), net (bounded listener),
//!                  lifecycle (shutdown, signals)
//! ```

// Core
pub mod config;
pub mod factory;
pub mod service;

// Cross-cutting concerns
pub mod lifecycle;
pub mod net;
pub mod observability;

pub use config::{ConfigError, CoreConfig, Environment};
pub use factory::{create_service, create_service_from_environment};
pub use lifecycle::{bootstrap, BootstrapError, Shutdown};
pub use service::{Service, ServiceError};
