//! Application-supplied WebSocket callbacks.

use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::request::Parts;
use axum::BoxError;
use serde_json::Value;

use crate::websocket::connection::WsConnection;

/// A data frame received from the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WsMessage {
    Text(String),
    Binary(Bytes),
}

impl WsMessage {
    pub fn len(&self) -> usize {
        match self {
            WsMessage::Text(text) => text.len(),
            WsMessage::Binary(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            WsMessage::Text(text) => Some(text),
            WsMessage::Binary(_) => None,
        }
    }
}

/// Verdict of an upgrade decision callback.
#[derive(Debug, Clone, PartialEq)]
pub enum UpgradeDecision {
    /// Upgrade, optionally attaching data to the connection.
    Accept(Option<Value>),
    /// Fall through to ordinary HTTP dispatch.
    Reject,
}

/// Lifecycle callbacks for upgraded connections.
///
/// Every callback is optional. The handler set is resolved once at startup
/// and shared by all connections.
#[async_trait]
pub trait WebSocketHandler: Send + Sync + 'static {
    /// Decide whether to upgrade. `None` means this handler set has no
    /// decision callback and the configured default policy applies.
    async fn upgrade(&self, _request: &Parts) -> Option<UpgradeDecision> {
        None
    }

    async fn open(&self, _conn: &WsConnection) -> Result<(), BoxError> {
        Ok(())
    }

    async fn message(&self, _conn: &WsConnection, _message: WsMessage) -> Result<(), BoxError> {
        Ok(())
    }

    /// Runs exactly once per connection; the handle is closed by then.
    async fn close(&self, _conn: &WsConnection, _code: u16, _reason: &str) -> Result<(), BoxError> {
        Ok(())
    }

    /// The outbound buffer was flushed after reporting backpressure.
    async fn drain(&self, _conn: &WsConnection) -> Result<(), BoxError> {
        Ok(())
    }
}
