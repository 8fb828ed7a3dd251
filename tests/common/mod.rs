//! Shared fixtures for integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::http::{HeaderValue, StatusCode};
use axum::BoxError;
use tempfile::TempDir;
use tokio::task::JoinHandle;

use site_adapter::bundle::RouteManifest;
use site_adapter::config::{AdapterConfig, EnvResolver};
use site_adapter::http::{HttpServer, NormalizedRequest, RenderedResponse};
use site_adapter::lifecycle::Shutdown;
use site_adapter::websocket::{SendStatus, UpgradeDecision, WebSocketHandler, WsConnection, WsMessage};
use site_adapter::{bootstrap, AdapterError, DynamicRenderer, RenderContext};

pub const IMMUTABLE_JS: &str = "export const answer = 42;";

/// Write a build directory with assets, prerendered pages and a manifest
/// listing `/`, `/about` and `/blog/`. `/` has no prerendered file.
pub fn bundle() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();

    std::fs::create_dir_all(root.join("client/_app/immutable")).unwrap();
    std::fs::write(root.join("client/_app/immutable/app.js"), IMMUTABLE_JS).unwrap();
    std::fs::write(root.join("client/_app/version.json"), r#"{"version":"1"}"#).unwrap();
    std::fs::write(root.join("client/robots.txt"), "User-agent: *\n").unwrap();

    std::fs::create_dir_all(root.join("prerendered/blog")).unwrap();
    std::fs::write(root.join("prerendered/about.html"), "<h1>About</h1>").unwrap();
    std::fs::write(root.join("prerendered/blog/index.html"), "<h1>Blog</h1>").unwrap();

    std::fs::write(
        root.join("manifest.json"),
        r#"{"prerendered": ["/", "/about", "/blog/"]}"#,
    )
    .unwrap();

    dir
}

/// What the renderer saw on its latest call.
#[derive(Debug, Clone)]
pub struct Seen {
    pub url: String,
    pub client_address: String,
    pub forwarded_for: Option<String>,
    pub websocket: bool,
}

/// Renderer that records its calls.
///
/// `/boom` fails, `/panic` panics, `/cookies` sets two cookies, anything
/// else answers `200 dynamic:{path}`.
#[derive(Debug, Default)]
pub struct RecordingRenderer {
    calls: AtomicUsize,
    seen: Mutex<Option<Seen>>,
}

impl RecordingRenderer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Option<Seen> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl DynamicRenderer for RecordingRenderer {
    async fn respond(
        &self,
        request: NormalizedRequest,
        context: RenderContext,
    ) -> Result<RenderedResponse, BoxError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.seen.lock().unwrap() = Some(Seen {
            url: request.url.to_string(),
            client_address: context.client_address().to_string(),
            forwarded_for: request
                .headers
                .get("x-forwarded-for")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
            websocket: context.platform().websocket,
        });

        match request.url.path() {
            "/boom" => Err("renderer exploded".into()),
            "/panic" => panic!("renderer panicked"),
            "/cookies" => Ok(RenderedResponse::new(StatusCode::OK, "cookies")
                .with_header(
                    "set-cookie",
                    HeaderValue::from_static("session=abc; Path=/, theme=dark; Path=/"),
                )
                .with_cookies(["session=abc; Path=/", "theme=dark; Path=/"])),
            path => Ok(RenderedResponse::new(StatusCode::OK, format!("dynamic:{path}"))
                .with_header("content-type", HeaderValue::from_static("text/plain"))),
        }
    }
}

/// Build a server over `root` for `oneshot` requests.
pub fn server(
    config: AdapterConfig,
    root: &Path,
    renderer: Arc<dyn DynamicRenderer>,
    websocket: Option<Arc<dyn WebSocketHandler>>,
) -> HttpServer {
    let manifest = RouteManifest::load(root).unwrap();
    HttpServer::new(config, manifest, renderer, websocket, &Shutdown::new())
}

/// A server bound to an ephemeral localhost port.
pub struct Running {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<Result<(), AdapterError>>,
}

pub async fn start(
    mut config: AdapterConfig,
    root: &Path,
    renderer: Arc<dyn DynamicRenderer>,
    websocket: Option<Arc<dyn WebSocketHandler>>,
) -> Running {
    config.listener.host = "127.0.0.1".to_string();
    config.listener.port = 0;
    config.timeouts.shutdown_secs = 2;

    let env = EnvResolver::from_map("", HashMap::new());
    let app = bootstrap(config, root, &env, renderer, websocket).await.unwrap();
    let addr = app.local_addr().unwrap();
    let shutdown = app.shutdown_handle();
    let handle = tokio::spawn(app.run());

    Running {
        addr,
        shutdown,
        handle,
    }
}

pub fn websocket_config(f: impl FnOnce(&mut AdapterConfig)) -> AdapterConfig {
    let mut config = AdapterConfig::default();
    config.websocket.enabled = true;
    f(&mut config);
    config
}

/// Echo handler: rejects `/other`, fails on `fail`, panics on `panic`,
/// echoes everything else. Close codes are recorded.
#[derive(Debug, Default)]
pub struct EchoHandler {
    closes: Mutex<Vec<u16>>,
    closed: tokio::sync::Notify,
}

impl EchoHandler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn closes(&self) -> Vec<u16> {
        self.closes.lock().unwrap().clone()
    }

    /// Resolve once a `close` callback has run.
    pub async fn wait_closed(&self) {
        loop {
            let notified = self.closed.notified();
            if !self.closes().is_empty() {
                return;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl WebSocketHandler for EchoHandler {
    async fn upgrade(&self, request: &axum::http::request::Parts) -> Option<UpgradeDecision> {
        let path = request.uri.path();
        if path == "/other" {
            return Some(UpgradeDecision::Reject);
        }
        Some(UpgradeDecision::Accept(Some(serde_json::json!({ "path": path }))))
    }

    async fn open(&self, conn: &WsConnection) -> Result<(), BoxError> {
        let path = conn
            .data()
            .and_then(|data| data.get("path"))
            .and_then(|path| path.as_str())
            .unwrap_or_default();
        conn.send_text(format!("welcome:{path}"));
        Ok(())
    }

    async fn message(&self, conn: &WsConnection, message: WsMessage) -> Result<(), BoxError> {
        match message.as_text() {
            Some("fail") => Err("handler failed".into()),
            Some("panic") => panic!("handler panicked"),
            Some(text) => {
                conn.send_text(format!("echo:{text}"));
                Ok(())
            }
            None => {
                conn.send(message);
                Ok(())
            }
        }
    }

    async fn close(&self, _conn: &WsConnection, code: u16, _reason: &str) -> Result<(), BoxError> {
        self.closes.lock().unwrap().push(code);
        self.closed.notify_waiters();
        Ok(())
    }
}

/// Handler set without an upgrade decision callback.
#[derive(Debug, Default)]
pub struct SilentHandler;

impl WebSocketHandler for SilentHandler {}

/// Sends `payload` on open and answers every `drain` with `drained`.
#[derive(Debug)]
pub struct FloodHandler {
    payload: String,
    open_status: Mutex<Option<SendStatus>>,
    drains: AtomicUsize,
}

impl FloodHandler {
    pub fn new(payload_len: usize) -> Arc<Self> {
        Arc::new(Self {
            payload: "x".repeat(payload_len),
            open_status: Mutex::new(None),
            drains: AtomicUsize::new(0),
        })
    }

    pub fn open_status(&self) -> Option<SendStatus> {
        *self.open_status.lock().unwrap()
    }

    pub fn drains(&self) -> usize {
        self.drains.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WebSocketHandler for FloodHandler {
    async fn upgrade(&self, _request: &axum::http::request::Parts) -> Option<UpgradeDecision> {
        Some(UpgradeDecision::Accept(None))
    }

    async fn open(&self, conn: &WsConnection) -> Result<(), BoxError> {
        let status = conn.send_text(self.payload.clone());
        *self.open_status.lock().unwrap() = Some(status);
        Ok(())
    }

    async fn drain(&self, conn: &WsConnection) -> Result<(), BoxError> {
        self.drains.fetch_add(1, Ordering::SeqCst);
        conn.send_text("drained");
        Ok(())
    }
}
