//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define client metrics (requests, refreshes, poll probes, breaker resets)
//! - Optionally expose a Prometheus-compatible endpoint for long-running watches
//!
//! # Metrics
//! - `docflow_requests_total` (counter): outbound calls by method, status
//! - `docflow_request_duration_seconds` (histogram): call latency
//! - `docflow_token_refresh_total` (counter): refresh episodes by outcome
//! - `docflow_session_terminated_total` (counter): forced logouts
//! - `docflow_poll_probes_total` (counter): probes by resource, outcome
//! - `docflow_breaker_resets_total` (counter): reset commands acknowledged
//!
//! # Design Decisions
//! - Facade calls are no-ops until a recorder is installed
//! - Status is recorded as a class ("2xx", "4xx", "error") to bound cardinality

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus exporter on `addr`. Must run inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Map an HTTP status (or its absence) to a low-cardinality label.
pub fn status_class(status: Option<u16>) -> &'static str {
    match status {
        Some(200..=299) => "2xx",
        Some(300..=399) => "3xx",
        Some(401) => "401",
        Some(400..=499) => "4xx",
        Some(_) => "5xx",
        None => "error",
    }
}

pub fn record_request(method: &str, status: Option<u16>, started: Instant) {
    counter!(
        "docflow_requests_total",
        "method" => method.to_string(),
        "status" => status_class(status)
    )
    .increment(1);
    histogram!("docflow_request_duration_seconds").record(started.elapsed().as_secs_f64());
}

pub fn record_refresh(success: bool) {
    let outcome = if success { "success" } else { "failure" };
    counter!("docflow_token_refresh_total", "outcome" => outcome).increment(1);
}

pub fn record_session_terminated() {
    counter!("docflow_session_terminated_total").increment(1);
}

pub fn record_probe(resource: &'static str, success: bool) {
    let outcome = if success { "success" } else { "failure" };
    counter!("docflow_poll_probes_total", "resource" => resource, "outcome" => outcome)
        .increment(1);
}

pub fn record_breaker_reset() {
    counter!("docflow_breaker_resets_total").increment(1);
}
