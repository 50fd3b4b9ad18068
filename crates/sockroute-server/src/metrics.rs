//! Metrics collection and export for sockroute.
//!
//! Uses the `metrics` crate for instrumentation and exports
//! to Prometheus format.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use sockroute_core::Delivery;
use std::net::SocketAddr;
use tracing::info;

/// Metric names.
pub mod names {
    pub const CONNECTIONS_TOTAL: &str = "sockroute_connections_total";
    pub const CONNECTIONS_ACTIVE: &str = "sockroute_connections_active";
    pub const CONNECTIONS_REJECTED: &str = "sockroute_connections_rejected_total";
    pub const MESSAGES_TOTAL: &str = "sockroute_messages_total";
    pub const MESSAGES_BYTES: &str = "sockroute_messages_bytes";
    pub const RESPONSES_TOTAL: &str = "sockroute_responses_total";
    pub const DISPATCH_SECONDS: &str = "sockroute_dispatch_seconds";
    pub const ERRORS_TOTAL: &str = "sockroute_errors_total";
}

/// Initialize the metrics system.
pub fn init_metrics() {
    metrics::describe_counter!(
        names::CONNECTIONS_TOTAL,
        "Total number of connections since server start"
    );
    metrics::describe_gauge!(
        names::CONNECTIONS_ACTIVE,
        "Current number of active connections"
    );
    metrics::describe_counter!(
        names::CONNECTIONS_REJECTED,
        "Connections refused because the server was full"
    );
    metrics::describe_counter!(names::MESSAGES_TOTAL, "Total number of messages processed");
    metrics::describe_counter!(names::MESSAGES_BYTES, "Total bytes of messages processed");
    metrics::describe_counter!(names::RESPONSES_TOTAL, "Responses sent, by status");
    metrics::describe_histogram!(
        names::DISPATCH_SECONDS,
        "Time from frame receipt to response hand-off in seconds"
    );
    metrics::describe_counter!(names::ERRORS_TOTAL, "Total number of errors");

    info!("Metrics initialized");
}

/// Start the Prometheus metrics server.
///
/// # Errors
///
/// Returns an error if the server cannot be started.
pub fn start_metrics_server(port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    info!("Metrics server listening on {}", addr);
    Ok(())
}

/// Record a new connection.
pub fn record_connection() {
    counter!(names::CONNECTIONS_TOTAL).increment(1);
    gauge!(names::CONNECTIONS_ACTIVE).increment(1.0);
}

/// Record a disconnection.
pub fn record_disconnection() {
    gauge!(names::CONNECTIONS_ACTIVE).decrement(1.0);
}

/// Record a connection refused at the limit.
pub fn record_rejected_connection() {
    counter!(names::CONNECTIONS_REJECTED).increment(1);
}

/// Record a message.
pub fn record_message(bytes: usize, direction: &str) {
    counter!(names::MESSAGES_TOTAL, "direction" => direction.to_string()).increment(1);
    counter!(names::MESSAGES_BYTES, "direction" => direction.to_string()).increment(bytes as u64);
}

/// Record what happened to a dispatched message.
pub fn record_delivery(delivery: Delivery) {
    let status = match delivery {
        Delivery::Heartbeat => "pong".to_string(),
        Delivery::Response(status) => status.as_u16().to_string(),
        Delivery::Dropped => "dropped".to_string(),
    };
    counter!(names::RESPONSES_TOTAL, "status" => status).increment(1);
}

/// Record dispatch latency.
pub fn record_latency(seconds: f64) {
    histogram!(names::DISPATCH_SECONDS).record(seconds);
}

/// Record an error.
pub fn record_error(error_type: &str) {
    counter!(names::ERRORS_TOTAL, "type" => error_type.to_string()).increment(1);
}

/// Metrics guard that records disconnection on drop.
pub struct ConnectionMetricsGuard;

impl ConnectionMetricsGuard {
    /// Create a new metrics guard, recording a connection.
    #[must_use]
    pub fn new() -> Self {
        record_connection();
        Self
    }
}

impl Default for ConnectionMetricsGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ConnectionMetricsGuard {
    fn drop(&mut self) {
        record_disconnection();
    }
}
