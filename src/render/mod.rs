//! Framework renderer capability.
//!
//! The framework's server-side logic is external to the adapter. It is held
//! as an `Arc<dyn DynamicRenderer>` and only ever called through this narrow
//! contract: `init` once at startup, `respond` once per dynamic request.

use std::collections::HashMap;

use async_trait::async_trait;
use axum::http::StatusCode;
use axum::BoxError;

use crate::config::AdapterConfig;
use crate::http::request::NormalizedRequest;
use crate::http::response::RenderedResponse;

/// Capabilities the hosting platform advertises to the renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    /// Name of the hosting runtime.
    pub runtime: &'static str,
    /// WebSocket upgrades can reach application hooks.
    pub websocket: bool,
    pub development: bool,
}

impl Platform {
    pub fn from_config(config: &AdapterConfig, websocket_handler: bool) -> Self {
        Self {
            runtime: env!("CARGO_PKG_NAME"),
            websocket: config.websocket.enabled && websocket_handler,
            development: config.development,
        }
    }
}

/// Per-request context handed to the renderer next to the request.
#[derive(Debug, Clone)]
pub struct RenderContext {
    client_address: String,
    platform: Platform,
}

impl RenderContext {
    pub fn new(client_address: impl Into<String>, platform: Platform) -> Self {
        Self {
            client_address: client_address.into(),
            platform,
        }
    }

    /// The client's address after proxy-header resolution.
    pub fn client_address(&self) -> &str {
        &self.client_address
    }

    pub fn platform(&self) -> &Platform {
        &self.platform
    }
}

/// The framework's request handler.
#[async_trait]
pub trait DynamicRenderer: Send + Sync + 'static {
    /// Called once before the server accepts traffic. An error aborts startup.
    async fn init(&self, _env: &HashMap<String, String>) -> Result<(), BoxError> {
        Ok(())
    }

    /// Produce the response for a request no earlier tier could answer,
    /// including the framework's own 404 for unknown routes.
    async fn respond(
        &self,
        request: NormalizedRequest,
        context: RenderContext,
    ) -> Result<RenderedResponse, BoxError>;
}

/// Renderer for bundles without server-side logic: every dynamic request
/// is a plain 404.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotFoundRenderer;

#[async_trait]
impl DynamicRenderer for NotFoundRenderer {
    async fn respond(
        &self,
        request: NormalizedRequest,
        _context: RenderContext,
    ) -> Result<RenderedResponse, BoxError> {
        tracing::debug!(path = %request.url.path(), "No dynamic route");
        Ok(RenderedResponse::new(StatusCode::NOT_FOUND, "Not Found").with_header(
            "content-type",
            axum::http::HeaderValue::from_static("text/plain"),
        ))
    }
}
