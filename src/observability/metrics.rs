//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by service, status
//! - `gateway_request_duration_seconds` (histogram): dispatch latency
//! - `gateway_active_connections` (gauge): current connection count
//! - `gateway_protocol_errors_total` (counter): framing/size violations by kind
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade (no-op without a recorder)
//! - Prometheus exporter is opt-in via config

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its HTTP listener.
///
/// Must run inside a Tokio runtime context.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(service: &str, status: u16, start: Instant) {
    let service = service.to_string();
    let status = status.to_string();
    metrics::counter!(
        "gateway_requests_total",
        "service" => service.clone(),
        "status" => status.clone()
    )
    .increment(1);
    metrics::histogram!(
        "gateway_request_duration_seconds",
        "service" => service,
        "status" => status
    )
    .record(start.elapsed().as_secs_f64());
}

pub fn record_protocol_error(kind: &'static str) {
    metrics::counter!("gateway_protocol_errors_total", "kind" => kind).increment(1);
}

pub fn connection_opened() {
    metrics::gauge!("gateway_active_connections").increment(1.0);
}

pub fn connection_closed() {
    metrics::gauge!("gateway_active_connections").decrement(1.0);
}
