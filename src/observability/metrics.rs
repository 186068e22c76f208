//! Metrics collection and exposition.
//!
//! # Metrics
//! - `presence_batches_total` (counter): provider batch calls
//! - `presence_batch_size` (histogram): names per batch
//! - `presence_batch_duration_seconds` (histogram): provider call latency
//! - `presence_queries_total` (counter): per-name outcomes by `outcome`
//! - `presence_cache_lookups_total` (counter): lookups by `result`
//! - `presence_cache_entries` (gauge): entries currently cached
//! - `presence_pending_queries` (gauge): names waiting for a batch
//! - `presence_cooldowns_total` (counter): entities put into cooldown
//! - `presence_transitions_total` (counter): transitions by new `status`
//! - `presence_notifications_total` (counter): deliveries by `outcome`
//! - `presence_health_warnings_total` (counter): system degradation alerts
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed
//! - The Prometheus exporter is opt-in through configuration

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Duration;

/// Install the Prometheus recorder with its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_batch(size: usize, duration: Duration) {
    counter!("presence_batches_total").increment(1);
    histogram!("presence_batch_size").record(size as f64);
    histogram!("presence_batch_duration_seconds").record(duration.as_secs_f64());
}

/// `outcome` is one of `success`, `missing`, `rejected`, `provider_error`.
pub fn record_query_outcome(outcome: &'static str) {
    counter!("presence_queries_total", "outcome" => outcome).increment(1);
}

pub fn record_cache_lookup(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    counter!("presence_cache_lookups_total", "result" => result).increment(1);
}

pub fn record_cache_size(entries: usize) {
    gauge!("presence_cache_entries").set(entries as f64);
}

pub fn record_pending(pending: usize) {
    gauge!("presence_pending_queries").set(pending as f64);
}

pub fn record_cooldown() {
    counter!("presence_cooldowns_total").increment(1);
}

pub fn record_transition(status: &'static str) {
    counter!("presence_transitions_total", "status" => status).increment(1);
}

pub fn record_notification(delivered: bool) {
    let outcome = if delivered { "delivered" } else { "failed" };
    counter!("presence_notifications_total", "outcome" => outcome).increment(1);
}

pub fn record_health_warning() {
    counter!("presence_health_warnings_total").increment(1);
}
