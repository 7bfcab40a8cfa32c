//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Validated config → EventBus → data service → query relay
//!     → HTTP server → accept traffic
//!
//! Shutdown (shutdown.rs):
//!     Signal received → stop accepting → drain in-flight requests
//!     → stop sweeper, relay, socket bridges → close data service
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then core, then listeners
//! - Ordered shutdown: stop accept, drain, close
//! - The data service connection is process-wide, opened once and closed once

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use signals::{shutdown_signal, spawn_signal_handler};
pub use startup::{run, Gateway, StartupError};
