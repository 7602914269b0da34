//! Metrics collection and exposition.
//!
//! # Metrics
//! - `task_relay_requests_total` (counter): requests by method, route, status
//! - `task_relay_request_duration_seconds` (histogram): latency distribution
//! - `task_relay_relay_total` (counter): outbound relay calls by outcome
//! - `task_relay_store_persist_total` (counter): persists by outcome
//! - `task_relay_tasks` (gauge): tasks in the committed collection
//!
//! All recorders are no-ops until [`init_metrics`] installs an exporter.

use std::net::SocketAddr;
use std::time::Instant;

use ::metrics::{counter, gauge, histogram, Label};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with an HTTP scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one handled request.
pub fn record_request(method: &str, route: &str, status: u16, start: Instant) {
    let labels = vec![
        Label::new("method", method.to_string()),
        Label::new("route", route.to_string()),
        Label::new("status", status.to_string()),
    ];
    counter!("task_relay_requests_total", labels.clone()).increment(1);
    histogram!("task_relay_request_duration_seconds", labels)
        .record(start.elapsed().as_secs_f64());
}

/// Record the outcome of an outbound relay call ("json", "raw", "error", "rejected").
pub fn record_relay(outcome: &'static str) {
    counter!("task_relay_relay_total", "outcome" => outcome).increment(1);
}

/// Record a store persist ("ok" or "error").
pub fn record_persist(outcome: &'static str) {
    counter!("task_relay_store_persist_total", "outcome" => outcome).increment(1);
}

/// Record the size of the committed collection.
pub fn record_task_count(count: usize) {
    gauge!("task_relay_tasks").set(count as f64);
}
