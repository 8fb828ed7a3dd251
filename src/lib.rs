//! Standalone HTTP + WebSocket server for a web framework's build output.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌──────────────────────────────────────────────────┐
//!                         │                   SITE ADAPTER                    │
//!                         │                                                   │
//!     Client Request      │  ┌──────────┐   ┌────────────┐                    │
//!     ────────────────────┼─▶│   http   │──▶│ websocket  │── Upgrade ──▶ hooks│
//!                         │  │  server  │   │   bridge   │                    │
//!                         │  └──────────┘   └─────┬──────┘                    │
//!                         │                       │ declined                  │
//!                         │                       ▼                           │
//!                         │  ┌──────────────────────────────────────────────┐ │
//!                         │  │               dispatch chain                  │ │
//!                         │  │  static assets → prerendered → dynamic render │ │
//!                         │  └──────────────────────────────────────────────┘ │
//!     Client Response     │                       │                           │
//!     ◀───────────────────┼───────────────────────┘                           │
//!                         │                                                   │
//!                         │  ┌─────────┐ ┌────────┐ ┌──────────┐ ┌──────────┐ │
//!                         │  │ config  │ │ bundle │ │observa-  │ │lifecycle │ │
//!                         │  │         │ │manifest│ │ bility   │ │          │ │
//!                         │  └─────────┘ └────────┘ └──────────┘ └──────────┘ │
//!                         └──────────────────────────────────────────────────┘
//! ```

// Core subsystems
pub mod bundle;
pub mod config;
pub mod dispatch;
pub mod http;
pub mod render;
pub mod websocket;

// Cross-cutting concerns
pub mod error;
pub mod lifecycle;
pub mod observability;

pub use config::AdapterConfig;
pub use error::AdapterError;
pub use http::HttpServer;
pub use lifecycle::{bootstrap, Application, Shutdown};
pub use render::{DynamicRenderer, NotFoundRenderer, RenderContext};
pub use websocket::{WebSocketHandler, WsConnection};
