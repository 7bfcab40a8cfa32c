//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by route, status
//! - `gateway_request_duration_seconds` (histogram): latency by route
//! - `gateway_bus_requests_total` (counter): bridged round trips by address, outcome
//! - `gateway_sessions_active` (gauge): stored sessions
//! - `gateway_notifications_dropped_total` (counter): undeliverable failure notices

use ::metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(route: &'static str, status: u16, start: Instant) {
    counter!("gateway_requests_total", "route" => route, "status" => status.to_string())
        .increment(1);
    histogram!("gateway_request_duration_seconds", "route" => route)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_bus_request(address: &str, outcome: &'static str) {
    counter!(
        "gateway_bus_requests_total",
        "address" => address.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_sessions_active(count: usize) {
    gauge!("gateway_sessions_active").set(count as f64);
}

pub fn record_notification_dropped() {
    counter!("gateway_notifications_dropped_total").increment(1);
}
