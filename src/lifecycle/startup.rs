//! Startup orchestration.
//!
//! # Responsibilities
//! - Load the route manifest from the bundle
//! - Initialize the framework renderer with the environment
//! - Bind the listener and assemble the server
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - The listener binds last, after the renderer is ready
//! - Shutdown waits a bounded time for requests and WebSocket connections

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::bundle::RouteManifest;
use crate::config::{AdapterConfig, EnvResolver};
use crate::error::AdapterError;
use crate::http::HttpServer;
use crate::lifecycle::shutdown::Shutdown;
use crate::render::DynamicRenderer;
use crate::websocket::WebSocketHandler;

/// A bound, ready-to-run server.
///
/// Shutdown receivers are taken at bootstrap, so a trigger that lands
/// before `run` is still observed.
pub struct Application {
    server: HttpServer,
    listener: TcpListener,
    shutdown: Shutdown,
    stop: broadcast::Receiver<()>,
    deadline: broadcast::Receiver<()>,
    grace: Duration,
}

/// Assemble the application from a validated configuration.
pub async fn bootstrap(
    config: AdapterConfig,
    bundle_dir: &Path,
    env: &EnvResolver,
    renderer: Arc<dyn DynamicRenderer>,
    websocket: Option<Arc<dyn WebSocketHandler>>,
) -> Result<Application, AdapterError> {
    let manifest = RouteManifest::load(bundle_dir)?;

    renderer
        .init(env.vars())
        .await
        .map_err(AdapterError::RendererInit)?;
    tracing::debug!("Renderer initialized");

    let bind_address = config.listener.bind_address();
    let listener = TcpListener::bind(&bind_address).await?;
    tracing::info!(
        address = %listener.local_addr()?,
        prerendered_routes = manifest.prerendered_count(),
        websocket = config.websocket.enabled && websocket.is_some(),
        development = config.development,
        "Listening for connections"
    );

    let shutdown = Shutdown::new();
    let grace = Duration::from_secs(config.timeouts.shutdown_secs);
    let server = HttpServer::new(config, manifest, renderer, websocket, &shutdown);

    Ok(Application {
        server,
        listener,
        stop: shutdown.subscribe(),
        deadline: shutdown.subscribe(),
        shutdown,
        grace,
    })
}

impl Application {
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Handle for triggering shutdown from outside the run loop.
    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Serve until shutdown, then wait up to the grace period for
    /// in-flight requests and live WebSocket connections.
    pub async fn run(self) -> Result<(), AdapterError> {
        let Application {
            server,
            listener,
            stop,
            deadline: mut signal,
            grace,
            ..
        } = self;

        let connections = server.connections();
        let deadline = async move {
            let _ = signal.recv().await;
            tokio::time::sleep(grace).await;
        };

        tokio::select! {
            result = server.run(listener, stop) => result?,
            _ = deadline => {
                tracing::warn!(grace_secs = grace.as_secs(), "Requests still in flight after grace period");
                return Ok(());
            }
        }

        let live = connections.active_count();
        if live > 0 {
            tracing::info!(connections = live, "Waiting for WebSocket connections to close");
            if tokio::time::timeout(grace, connections.wait_for_shutdown()).await.is_err() {
                tracing::warn!(
                    connections = connections.active_count(),
                    "WebSocket connections still open after grace period"
                );
            }
        }

        tracing::info!("Shutdown complete");
        Ok(())
    }
}
