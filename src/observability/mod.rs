//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatch chain, WebSocket bridge, lifecycle:
//!     → logging.rs (tracing events, pretty or JSON)
//!     → metrics.rs (counters, histograms, gauges)
//!
//! Consumers:
//!     → stdout
//!     → Prometheus scrape on METRICS_ADDRESS
//! ```
//!
//! # Design Decisions
//! - Request ID flows through every log line via the request-id layers
//! - The exporter is only started when an address is configured

pub mod logging;
pub mod metrics;
