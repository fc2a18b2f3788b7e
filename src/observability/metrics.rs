//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by route and status
//! - `gateway_request_duration_seconds` (histogram): handler latency
//! - `gateway_upstream_outcomes_total` (counter): classified detection outcomes
//! - `gateway_circuit_state` (gauge): 0=closed, 1=open, 2=half-open
//! - `gateway_rate_limited_total` (counter): requests refused by the limiter
//! - `gateway_store_failures_total` (counter): detections that failed to persist
//!
//! Without an installed recorder every call here is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::resilience::CircuitState;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(route: &'static str, status: u16, start: Instant) {
    metrics::counter!(
        "gateway_requests_total",
        "route" => route,
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("gateway_request_duration_seconds", "route" => route)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_outcome(outcome: &'static str) {
    metrics::counter!("gateway_upstream_outcomes_total", "outcome" => outcome).increment(1);
}

pub fn record_circuit_state(state: CircuitState) {
    metrics::gauge!("gateway_circuit_state").set(state.as_gauge());
}

pub fn record_rate_limited() {
    metrics::counter!("gateway_rate_limited_total").increment(1);
}

pub fn record_store_failure() {
    metrics::counter!("gateway_store_failures_total").increment(1);
}
