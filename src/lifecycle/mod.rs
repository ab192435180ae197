//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Factory → Service constructed → run() once → terminal Result
//!
//! Shutdown (shutdown.rs):
//!     Trigger → service stops accepting → drains within deadline → run() returns
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then service, then listeners inside run()
//! - Ordered shutdown: stop accept, drain, close
//! - Shutdown has timeout: run() returns after the deadline even if work remains

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{bootstrap, launch, BootstrapError, Phase};
