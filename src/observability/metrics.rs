//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define service metrics (requests, latency, connections, liveness)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `core_service_up` (gauge): 1 while `run` is executing, 0 after
//! - `core_requests_total` (counter): HTTP requests by method, status
//! - `core_request_duration_seconds` (histogram): HTTP latency distribution
//! - `core_active_connections` (gauge): open echo connections
//! - `core_echo_bytes_total` (counter): bytes echoed back to clients
//!
//! # Design Decisions
//! - Recording is a no-op until an exporter is installed
//! - Exporter is installed by the running service, never by the factory

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus exporter with an HTTP scrape listener on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Mark the service as running (`true`) or stopped (`false`).
pub fn set_service_up(service: &str, kind: &'static str, up: bool) {
    gauge!("core_service_up", "service" => service.to_string(), "kind" => kind)
        .set(if up { 1.0 } else { 0.0 });
}

/// Record one completed HTTP request.
pub fn record_request(method: &str, status: u16, start: Instant) {
    counter!(
        "core_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("core_request_duration_seconds", "method" => method.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn connection_opened() {
    gauge!("core_active_connections").increment(1.0);
}

pub fn connection_closed() {
    gauge!("core_active_connections").decrement(1.0);
}

pub fn record_echo_bytes(bytes: u64) {
    counter!("core_echo_bytes_total").increment(bytes);
}
