//! Metrics collection and exposition.
//!
//! # Metrics
//! - `pollgate_requests_total` (counter): requests by method, status
//! - `pollgate_request_duration_seconds` (histogram): latency distribution
//! - `pollgate_rate_limited_total` (counter): rejections by scope (client, vote)
//! - `pollgate_origin_rejected_total` (counter)
//! - `pollgate_authz_decisions_total` (counter): by operation, outcome
//! - `pollgate_votes_total` (counter): by outcome
//! - `pollgate_audit_failures_total` (counter)
//! - `pollgate_role_lookup_failures_total` (counter)
//! - `pollgate_rate_limit_keys` (gauge): tracked client windows

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Start the Prometheus scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    counter!("pollgate_requests_total", "method" => method.to_string(), "status" => status.to_string())
        .increment(1);
    histogram!("pollgate_request_duration_seconds", "method" => method.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_rate_limited(scope: &'static str) {
    counter!("pollgate_rate_limited_total", "scope" => scope).increment(1);
}

pub fn record_origin_rejected() {
    counter!("pollgate_origin_rejected_total").increment(1);
}

pub fn record_authz_decision(operation: &'static str, allowed: bool) {
    let outcome = if allowed { "allow" } else { "deny" };
    counter!("pollgate_authz_decisions_total", "operation" => operation, "outcome" => outcome)
        .increment(1);
}

pub fn record_vote(outcome: &'static str) {
    counter!("pollgate_votes_total", "outcome" => outcome).increment(1);
}

pub fn record_audit_failure() {
    counter!("pollgate_audit_failures_total").increment(1);
}

pub fn record_role_lookup_failure() {
    counter!("pollgate_role_lookup_failures_total").increment(1);
}

pub fn record_rate_limit_keys(count: usize) {
    gauge!("pollgate_rate_limit_keys").set(count as f64);
}
