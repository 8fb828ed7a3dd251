//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing)
//!     → [WebSocket bridge or dispatch chain]
//!     → request.rs (effective origin, client address)
//!     → response.rs (cookie fan-out, status text)
//!     → Send to client
//! ```
//!
//! `files.rs` holds the path sanitizing and file streaming shared by the
//! static and prerendered tiers.

pub mod files;
pub mod request;
pub mod response;
pub mod server;

pub use request::{NormalizedRequest, RequestNormalizer, X_REQUEST_ID};
pub use response::{RenderedResponse, ResponseNormalizer};
pub use server::HttpServer;
