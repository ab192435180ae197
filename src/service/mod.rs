//! Service capability and the concrete services the factory can build.
//!
//! # Data Flow
//! ```text
//! factory::assemble(CoreConfig)
//!     → http.rs (HttpService) | echo.rs (EchoService)
//!     → instrumented.rs (lifecycle logs, service gauge, metrics exporter)
//!     → Box<dyn Service>
//!     → run().await, exactly once
//! ```
//!
//! # Design Decisions
//! - `run` consumes the boxed service; calling it twice does not compile
//! - `run` returns only once the service has terminated
//! - No sockets are bound and no tasks spawned before `run`

pub mod echo;
pub mod http;
pub mod instrumented;

use async_trait::async_trait;
use thiserror::Error;

use crate::net::listener::ListenerError;

pub use echo::EchoService;
pub use http::HttpService;
pub use instrumented::Instrumented;

/// Failure raised while a service runs.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("failed to start metrics exporter: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A long-lived unit of work with a single blocking lifecycle method.
#[async_trait]
pub trait Service: Send {
    /// Name used in logs and status output.
    fn name(&self) -> &str;

    /// Run until the service terminates.
    ///
    /// Returns `Ok(())` after an orderly stop (e.g. a shutdown signal) and
    /// an error when the service cannot continue.
    async fn run(self: Box<Self>) -> Result<(), ServiceError>;
}
