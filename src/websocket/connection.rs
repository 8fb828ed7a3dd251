//! Connection records and lifecycle tracking.
//!
//! # Responsibilities
//! - Generate unique connection IDs for tracing
//! - Count live connections so shutdown can wait for them
//! - Expose the per-connection send handle with backpressure accounting

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::ws::Message;
use serde_json::Value;
use tokio::sync::{mpsc, watch};

use crate::observability::metrics;

static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a WebSocket connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ws-{}", self.0)
    }
}

/// Tracks live connections for graceful shutdown.
///
/// The count lives in a watch channel so waiters wake on every change.
#[derive(Debug, Clone)]
pub struct ConnectionTracker {
    active: Arc<watch::Sender<usize>>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(0);
        Self {
            active: Arc::new(tx),
        }
    }

    /// Record a new live connection. The guard releases it on drop.
    pub fn track(&self) -> ConnectionGuard {
        self.active.send_modify(|n| *n += 1);
        metrics::websocket_opened();
        ConnectionGuard {
            active: Arc::clone(&self.active),
            id: ConnectionId::new(),
        }
    }

    pub fn active_count(&self) -> usize {
        *self.active.borrow()
    }

    /// Resolve once no connection is live.
    pub async fn wait_for_shutdown(&self) {
        let mut rx = self.active.subscribe();
        // The sender is owned by `self`, so the channel cannot close here.
        let _ = rx.wait_for(|n| *n == 0).await;
    }
}

impl Default for ConnectionTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Keeps a connection counted for as long as it lives.
#[derive(Debug)]
pub struct ConnectionGuard {
    active: Arc<watch::Sender<usize>>,
    id: ConnectionId,
}

impl ConnectionGuard {
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.active.send_modify(|n| *n = n.saturating_sub(1));
        metrics::websocket_closed();
        tracing::trace!(connection_id = %self.id, "Connection released");
    }
}

/// Result of queueing an outbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStatus {
    /// Queued below the backpressure limit.
    Sent,
    /// Queued, but the buffer is now over the limit. `drain` fires once it
    /// has been flushed.
    Backpressure,
    /// Not queued: the connection is closed or already over the limit.
    Dropped,
}

#[derive(Debug)]
pub(crate) enum Outbound {
    Message(Message, usize),
    Close(u16, String),
}

#[derive(Debug)]
struct Shared {
    id: ConnectionId,
    path: String,
    data: Option<Value>,
    remote_address: String,
    outbound: mpsc::UnboundedSender<Outbound>,
    buffered: AtomicUsize,
    closed: AtomicBool,
    needs_drain: AtomicBool,
    max_backpressure: usize,
}

/// Handle to one upgraded connection, passed to every callback.
///
/// Cheap to clone; clones may be moved into spawned tasks and used to send
/// after the callback returns.
#[derive(Debug, Clone)]
pub struct WsConnection {
    shared: Arc<Shared>,
}

impl WsConnection {
    pub(crate) fn new(
        id: ConnectionId,
        path: String,
        data: Option<Value>,
        remote_address: String,
        max_backpressure: usize,
    ) -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Shared {
            id,
            path,
            data,
            remote_address,
            outbound: tx,
            buffered: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
            needs_drain: AtomicBool::new(false),
            max_backpressure,
        };
        (
            Self {
                shared: Arc::new(shared),
            },
            rx,
        )
    }

    pub fn id(&self) -> ConnectionId {
        self.shared.id
    }

    /// Request path the connection was upgraded on.
    pub fn path(&self) -> &str {
        &self.shared.path
    }

    /// Data attached by the upgrade decision.
    pub fn data(&self) -> Option<&Value> {
        self.shared.data.as_ref()
    }

    pub fn remote_address(&self) -> &str {
        &self.shared.remote_address
    }

    /// Bytes queued but not yet written to the socket.
    pub fn buffered_amount(&self) -> usize {
        self.shared.buffered.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    pub fn send_text(&self, text: impl Into<String>) -> SendStatus {
        let text = text.into();
        let len = text.len();
        self.enqueue(Message::Text(text.into()), len)
    }

    pub fn send_binary(&self, bytes: impl Into<Bytes>) -> SendStatus {
        let bytes = bytes.into();
        let len = bytes.len();
        self.enqueue(Message::Binary(bytes), len)
    }

    pub fn send(&self, message: crate::websocket::WsMessage) -> SendStatus {
        match message {
            crate::websocket::WsMessage::Text(text) => self.send_text(text),
            crate::websocket::WsMessage::Binary(bytes) => self.send_binary(bytes),
        }
    }

    /// Start a close handshake. Later sends are dropped.
    pub fn close(&self, code: u16, reason: impl Into<String>) {
        if self.shared.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.shared.outbound.send(Outbound::Close(code, reason.into()));
    }

    fn enqueue(&self, message: Message, len: usize) -> SendStatus {
        if self.is_closed() {
            return SendStatus::Dropped;
        }
        let max = self.shared.max_backpressure;
        if self.buffered_amount() > max {
            return SendStatus::Dropped;
        }

        let buffered = self.shared.buffered.fetch_add(len, Ordering::SeqCst) + len;
        if self.shared.outbound.send(Outbound::Message(message, len)).is_err() {
            self.shared.buffered.fetch_sub(len, Ordering::SeqCst);
            return SendStatus::Dropped;
        }

        if buffered > max {
            self.shared.needs_drain.store(true, Ordering::SeqCst);
            SendStatus::Backpressure
        } else {
            SendStatus::Sent
        }
    }

    /// Account for `len` bytes written to the socket. Returns `true` when a
    /// `drain` event is due.
    pub(crate) fn release(&self, len: usize) -> bool {
        let remaining = self.shared.buffered.fetch_sub(len, Ordering::SeqCst) - len;
        remaining == 0 && self.shared.needs_drain.swap(false, Ordering::SeqCst)
    }

    pub(crate) fn mark_closed(&self) {
        self.shared.closed.store(true, Ordering::SeqCst);
    }
}
