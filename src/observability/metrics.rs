//! Metrics collection and exposition.
//!
//! # Metrics
//! - `adapter_requests_total` (counter): requests by method, status, tier
//! - `adapter_request_duration_seconds` (histogram): latency by tier
//! - `adapter_websocket_connections` (gauge): live upgraded connections
//!
//! Updates are no-ops until a recorder is installed, so the exporter stays
//! optional.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder};

const REQUESTS_TOTAL: &str = "adapter_requests_total";
const REQUEST_DURATION: &str = "adapter_request_duration_seconds";
const WEBSOCKET_CONNECTIONS: &str = "adapter_websocket_connections";

const REQUEST_DURATION_BUCKETS: &[f64] = &[
    0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Install the Prometheus recorder and serve `/metrics` on `address`.
pub fn init_metrics(address: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(address)
        .set_buckets_for_metric(
            Matcher::Full(REQUEST_DURATION.to_string()),
            REQUEST_DURATION_BUCKETS,
        )?
        .install()?;

    metrics::describe_counter!(REQUESTS_TOTAL, "HTTP requests answered, by dispatch tier");
    metrics::describe_histogram!(REQUEST_DURATION, "Time to produce response headers");
    metrics::describe_gauge!(WEBSOCKET_CONNECTIONS, "Live WebSocket connections");

    tracing::info!(address = %address, "Prometheus exporter listening");
    Ok(())
}

/// Record one answered request. `tier` names the responder that answered.
pub fn record_request(method: &str, status: u16, tier: &'static str, start: Instant) {
    metrics::counter!(
        REQUESTS_TOTAL,
        "method" => method.to_string(),
        "status" => status.to_string(),
        "tier" => tier
    )
    .increment(1);
    metrics::histogram!(REQUEST_DURATION, "tier" => tier).record(start.elapsed().as_secs_f64());
}

pub fn websocket_opened() {
    metrics::gauge!(WEBSOCKET_CONNECTIONS).increment(1.0);
}

pub fn websocket_closed() {
    metrics::gauge!(WEBSOCKET_CONNECTIONS).decrement(1.0);
}
