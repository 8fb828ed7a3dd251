//! WebSocket upgrade bridge.
//!
//! # Data Flow
//! ```text
//! Upgrade request
//!     → bridge.rs (decision, upgrade, per-connection event loop)
//!     → handler.rs (application callbacks)
//!     → connection.rs (connection handle, send queue, tracking)
//! ```
//!
//! # Design Decisions
//! - Inactive unless enabled in configuration and a handler set is loaded
//! - The handler set is resolved once and shared by all connections
//! - No state is shared between connections

pub mod bridge;
pub mod connection;
pub mod handler;

pub use bridge::{is_upgrade_request, WebSocketBridge, GOING_AWAY};
pub use connection::{ConnectionId, ConnectionTracker, SendStatus, WsConnection};
pub use handler::{UpgradeDecision, WebSocketHandler, WsMessage};
