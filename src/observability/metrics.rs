//! Metrics collection and exposition.
//!
//! # Metrics
//! - `telemetry_events_total` (counter): emitted events by level
//! - `telemetry_observer_failures_total` (counter): swallowed observer failures
//! - `telemetry_rate_limit_violations_total` (counter)
//! - `telemetry_security_threats_total` (counter): by signature category
//! - `telemetry_request_duration_seconds` (histogram): observed latency
//! - `telemetry_rate_window_keys` (gauge): tracked (client, window) pairs

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::events::Level;

/// Start the Prometheus scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_event(level: Level) {
    counter!("telemetry_events_total", "level" => level.as_str()).increment(1);
}

pub fn record_observer_failure(observer: &'static str) {
    counter!("telemetry_observer_failures_total", "observer" => observer).increment(1);
}

pub fn record_rate_limit_violation() {
    counter!("telemetry_rate_limit_violations_total").increment(1);
}

pub fn record_security_threat(category: &'static str) {
    counter!("telemetry_security_threats_total", "category" => category).increment(1);
}

pub fn record_request_duration(status: u16, duration: Duration) {
    histogram!("telemetry_request_duration_seconds", "status" => status.to_string())
        .record(duration.as_secs_f64());
}

pub fn record_rate_window_keys(count: usize) {
    gauge!("telemetry_rate_window_keys").set(count as f64);
}
