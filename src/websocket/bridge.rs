//! Upgrade interception and per-connection event loop.
//!
//! # Data Flow
//! ```text
//! Request (Upgrade: websocket)
//!     → upgrade decision (handler callback or default policy)
//!     → Reject: request handed back to the dispatch chain
//!     → Accept: 101 response, connection task spawned
//!         → open → message* / drain* → close
//! ```
//!
//! # Design Decisions
//! - Events for one connection are dispatched sequentially from one task
//! - A failing or panicking callback is logged and the connection stays up
//! - Shutdown closes every live connection with 1001 (going away)

use std::future::Future;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::header::UPGRADE;
use axum::http::Request;
use axum::BoxError;
use futures_util::{FutureExt, SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::config::WebSocketConfig;
use crate::dispatch::Outcome;
use crate::http::request::RequestNormalizer;
use crate::lifecycle::shutdown::Shutdown;
use crate::websocket::connection::{ConnectionTracker, Outbound, WsConnection};
use crate::websocket::handler::{UpgradeDecision, WebSocketHandler, WsMessage};

/// Close code sent to clients when the server shuts down.
pub const GOING_AWAY: u16 = 1001;
/// Reported to `close` when the peer sent no status code.
pub const NO_STATUS: u16 = 1005;
/// Reported to `close` when the socket dropped without a close frame.
pub const ABNORMAL: u16 = 1006;

const SHUTDOWN_REASON: &str = "server shutting down";

/// Routes upgrade requests to the application's handler set.
pub struct WebSocketBridge {
    config: WebSocketConfig,
    handler: Option<Arc<dyn WebSocketHandler>>,
    normalizer: RequestNormalizer,
    shutdown: Shutdown,
    tracker: ConnectionTracker,
}

impl WebSocketBridge {
    pub fn new(
        config: &WebSocketConfig,
        handler: Option<Arc<dyn WebSocketHandler>>,
        normalizer: RequestNormalizer,
        shutdown: Shutdown,
    ) -> Self {
        if config.enabled && handler.is_none() {
            tracing::warn!("WebSocket support enabled but no handler set loaded; upgrades will fall through");
        }
        if config.enabled && config.compression {
            tracing::debug!("permessage-deflate is not negotiated; frames are sent uncompressed");
        }
        Self {
            config: config.clone(),
            handler,
            normalizer,
            shutdown,
            tracker: ConnectionTracker::new(),
        }
    }

    /// Upgrades are only attempted when enabled and a handler set exists.
    pub fn is_active(&self) -> bool {
        self.config.enabled && self.handler.is_some()
    }

    /// Live connection tracker, used to wait for teardown on shutdown.
    pub fn connections(&self) -> ConnectionTracker {
        self.tracker.clone()
    }

    /// Whether this request should be offered to the handler set.
    pub fn wants(&self, request: &Request<Body>) -> bool {
        if !self.is_active() || !is_upgrade_request(request) {
            return false;
        }
        match &self.config.path {
            Some(path) => request.uri().path() == path,
            None => true,
        }
    }

    /// Upgrade the request or hand it back for ordinary dispatch.
    pub async fn try_upgrade(&self, request: Request<Body>) -> Outcome {
        let handler = match &self.handler {
            Some(handler) if self.wants(&request) => Arc::clone(handler),
            _ => return Outcome::Declined(request),
        };

        let (mut parts, body) = request.into_parts();
        let path = parts.uri.path().to_string();

        let decision = match AssertUnwindSafe(handler.upgrade(&parts)).catch_unwind().await {
            Ok(Some(decision)) => decision,
            Ok(None) if self.config.accept_without_decision => UpgradeDecision::Accept(None),
            Ok(None) => {
                tracing::debug!(path = %path, "No upgrade decision callback; rejecting");
                UpgradeDecision::Reject
            }
            Err(_) => {
                tracing::error!(path = %path, "Upgrade decision panicked; rejecting");
                UpgradeDecision::Reject
            }
        };

        let data = match decision {
            UpgradeDecision::Accept(data) => data,
            UpgradeDecision::Reject => {
                tracing::debug!(path = %path, "Upgrade rejected");
                return Outcome::Declined(Request::from_parts(parts, body));
            }
        };

        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        let remote_address = self.normalizer.client_address(&parts.headers, peer);

        let upgrade = match WebSocketUpgrade::from_request_parts(&mut parts, &()).await {
            Ok(upgrade) => upgrade,
            Err(rejection) => {
                tracing::debug!(path = %path, error = %rejection, "Request is not upgradable");
                return Outcome::Declined(Request::from_parts(parts, body));
            }
        };

        let session = Session {
            handler,
            path,
            data,
            remote_address,
            max_backpressure: self.config.max_backpressure,
            shutdown: self.shutdown.subscribe(),
            tracker: self.tracker.clone(),
        };

        let response = upgrade
            .max_message_size(self.config.max_compressed_size)
            .on_failed_upgrade(|e| tracing::warn!(error = %e, "WebSocket upgrade failed"))
            .on_upgrade(move |socket| run_connection(socket, session));
        Outcome::Handled(response)
    }
}

/// `Upgrade` header naming websocket, case-insensitively.
pub fn is_upgrade_request<B>(request: &Request<B>) -> bool {
    request
        .headers()
        .get_all(UPGRADE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|token| token.trim().eq_ignore_ascii_case("websocket"))
}

/// Everything a connection task needs, captured at upgrade time.
struct Session {
    handler: Arc<dyn WebSocketHandler>,
    path: String,
    data: Option<Value>,
    remote_address: String,
    max_backpressure: usize,
    shutdown: broadcast::Receiver<()>,
    tracker: ConnectionTracker,
}

async fn run_connection(socket: WebSocket, session: Session) {
    let Session {
        handler,
        path,
        data,
        remote_address,
        max_backpressure,
        mut shutdown,
        tracker,
    } = session;

    let guard = tracker.track();
    let (conn, mut outbound) = WsConnection::new(guard.id(), path, data, remote_address, max_backpressure);
    let (mut sink, mut stream) = socket.split();

    tracing::info!(
        connection_id = %conn.id(),
        path = %conn.path(),
        remote = %conn.remote_address(),
        "WebSocket opened"
    );
    dispatch(&conn, "open", handler.open(&conn)).await;

    let mut listening = true;
    let (code, reason) = loop {
        tokio::select! {
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    let message = WsMessage::Text(text.as_str().to_owned());
                    dispatch(&conn, "message", handler.message(&conn, message)).await;
                }
                Some(Ok(Message::Binary(bytes))) => {
                    dispatch(&conn, "message", handler.message(&conn, WsMessage::Binary(bytes))).await;
                }
                Some(Ok(Message::Close(frame))) => {
                    break frame
                        .map(|f| (f.code, f.reason.as_str().to_owned()))
                        .unwrap_or((NO_STATUS, String::new()));
                }
                // Ping and pong are answered by the transport.
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!(connection_id = %conn.id(), error = %e, "WebSocket read failed");
                    break (ABNORMAL, String::new());
                }
                None => break (ABNORMAL, String::new()),
            },
            Some(out) = outbound.recv() => match out {
                Outbound::Message(message, len) => {
                    if let Err(e) = sink.send(message).await {
                        tracing::debug!(connection_id = %conn.id(), error = %e, "WebSocket write failed");
                        break (ABNORMAL, String::new());
                    }
                    if conn.release(len) {
                        dispatch(&conn, "drain", handler.drain(&conn)).await;
                    }
                }
                Outbound::Close(code, reason) => {
                    let frame = CloseFrame { code, reason: reason.clone().into() };
                    let _ = sink.send(Message::Close(Some(frame))).await;
                    break (code, reason);
                }
            },
            signal = shutdown.recv(), if listening => match signal {
                Ok(()) | Err(RecvError::Lagged(_)) => {
                    let frame = CloseFrame { code: GOING_AWAY, reason: SHUTDOWN_REASON.into() };
                    let _ = sink.send(Message::Close(Some(frame))).await;
                    break (GOING_AWAY, SHUTDOWN_REASON.to_string());
                }
                Err(RecvError::Closed) => listening = false,
            },
        }
    };

    conn.mark_closed();
    let _ = sink.close().await;
    dispatch(&conn, "close", handler.close(&conn, code, &reason)).await;

    tracing::info!(connection_id = %conn.id(), code, reason = %reason, "WebSocket closed");
    drop(guard);
}

async fn dispatch<F>(conn: &WsConnection, event: &'static str, callback: F)
where
    F: Future<Output = Result<(), BoxError>>,
{
    match AssertUnwindSafe(callback).catch_unwind().await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            tracing::warn!(connection_id = %conn.id(), event, error = %e, "WebSocket handler failed");
        }
        Err(_) => {
            tracing::error!(connection_id = %conn.id(), event, "WebSocket handler panicked");
        }
    }
}
