//! Metrics collection and exposition.
//!
//! # Metrics
//! - `webhook_requests_total` (counter): requests by dispatch outcome
//! - `webhook_request_duration_seconds` (histogram): dispatch latency
//! - `webhook_key_refresh_total` (counter): key fetches by result
//! - `webhook_keys_cached` (gauge): keys in the current snapshot

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a finished webhook call.
pub fn record_request(outcome: &'static str, start: Instant) {
    counter!("webhook_requests_total", "outcome" => outcome).increment(1);
    histogram!("webhook_request_duration_seconds", "outcome" => outcome)
        .record(start.elapsed().as_secs_f64());
}

/// Record a key fetch attempt (`success` or `failure`).
pub fn record_key_refresh(result: &'static str) {
    counter!("webhook_key_refresh_total", "result" => result).increment(1);
}

pub fn record_keys_cached(count: usize) {
    gauge!("webhook_keys_cached").set(count as f64);
}

/// Record a handler that panicked and was treated as a decline.
pub fn record_handler_panic(intent: &str) {
    counter!("webhook_handler_panics_total", "intent" => intent.to_string()).increment(1);
}
