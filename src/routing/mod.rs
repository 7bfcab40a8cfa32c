//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (method, path)
//!     → router.rs (route lookup in registration order)
//!     → matcher.rs (evaluate method + path conditions)
//!     → Return: matched Route or NoMatch (→ 404)
//!
//! Route Registration (at startup):
//!     GatewayConfig mount points
//!     → /status, static prefix, bus prefix, socket bridge prefix
//!     → overlap check against earlier routes
//!     → Freeze as immutable GatewayRouter
//! ```
//!
//! # Design Decisions
//! - Routes registered at startup, immutable at runtime
//! - No regex in hot path (exact and prefix matching only)
//! - Deterministic: same input always matches same route
//! - First match wins, and registration refuses ambiguous routes

pub mod matcher;
pub mod router;

pub use matcher::{PathPattern, RouteMatcher};
pub use router::{GatewayRouter, Route, RouteTarget, RoutingError};

/// Path of the liveness probe.
pub const STATUS_PATH: &str = "/status";
