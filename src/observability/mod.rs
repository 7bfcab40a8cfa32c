//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout via tracing-subscriber fmt layer
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Structured fields (request id, address, session prefix) on every event
//! - Metric updates are no-ops until an exporter is installed
//! - RUST_LOG overrides the configured level

pub mod logging;
pub mod metrics;
