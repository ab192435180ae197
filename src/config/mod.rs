//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! process environment
//!     → env.rs (snapshot, captured once)
//!     → loader.rs (parse CORE_* keys into typed values)
//!     → validation.rs (semantic checks)
//!     → CoreConfig (validated, immutable)
//!     → handed by value to the factory
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no reload path
//! - Everything except the bind address has a default
//! - Validation separates syntactic (parsing) from semantic checks

pub mod env;
pub mod loader;
pub mod schema;
pub mod validation;

pub use env::Environment;
pub use loader::ConfigError;
pub use schema::{
    AdminConfig, CoreConfig, ListenerConfig, LogFormat, ObservabilityConfig, ServiceConfig,
    ServiceKind, TimeoutConfig,
};
pub use validation::ValidationError;
