//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with a single catch-all handler
//! - Wire up middleware (request ID, tracing, timeout, panic guard)
//! - Offer each request to the WebSocket bridge, then the dispatch chain
//! - Bind the server to a listener with graceful shutdown

use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderName, Request, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    catch_panic::CatchPanicLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::bundle::RouteManifest;
use crate::config::AdapterConfig;
use crate::dispatch::{DispatchChain, DynamicResponder, Outcome, PrerenderedResponder, StaticAssetResponder};
use crate::http::request::{request_id, RequestNormalizer, RequestUuid, X_REQUEST_ID};
use crate::http::response::internal_error;
use crate::lifecycle::shutdown::Shutdown;
use crate::render::{DynamicRenderer, Platform};
use crate::websocket::{ConnectionTracker, WebSocketBridge, WebSocketHandler};

/// Application state injected into the handler.
#[derive(Clone)]
pub struct AppState {
    pub chain: Arc<DispatchChain>,
    pub bridge: Arc<WebSocketBridge>,
}

/// HTTP server for the adapter.
pub struct HttpServer {
    router: Router,
    connections: ConnectionTracker,
}

impl HttpServer {
    /// Assemble the dispatch chain and WebSocket bridge around `renderer`.
    pub fn new(
        config: AdapterConfig,
        manifest: RouteManifest,
        renderer: Arc<dyn DynamicRenderer>,
        websocket: Option<Arc<dyn WebSocketHandler>>,
        shutdown: &Shutdown,
    ) -> Self {
        let normalizer = RequestNormalizer::new(&config);
        let platform = Platform::from_config(&config, websocket.is_some());

        let static_assets = config
            .assets
            .enabled
            .then(|| StaticAssetResponder::new(manifest.client_dir(), &config.assets));
        let dynamic = DynamicResponder::new(renderer, normalizer.clone(), platform);
        let chain = DispatchChain::new(
            static_assets,
            PrerenderedResponder::new(manifest),
            dynamic,
            config.development,
        );

        let bridge = WebSocketBridge::new(&config.websocket, websocket, normalizer, shutdown.clone());
        let connections = bridge.connections();

        let state = AppState {
            chain: Arc::new(chain),
            bridge: Arc::new(bridge),
        };
        let router = Self::build_router(&config, state);

        Self {
            router,
            connections,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &AdapterConfig, state: AppState) -> Router {
        let x_request_id = HeaderName::from_static(X_REQUEST_ID);

        let router = Router::new()
            .route("/", any(handle))
            .route("/{*path}", any(handle))
            .with_state(state);

        let router = match config.timeouts.request_secs {
            Some(secs) => router.layer(TimeoutLayer::new(Duration::from_secs(secs))),
            None => router,
        };

        router
            .layer(CatchPanicLayer::custom(panic_response))
            .layer(PropagateRequestIdLayer::new(x_request_id.clone()))
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    path = %request.uri().path(),
                    request_id = %request_id(request.headers())
                )
            }))
            .layer(SetRequestIdLayer::new(x_request_id, RequestUuid))
    }

    /// The assembled router, for driving requests without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Live WebSocket connections.
    pub fn connections(&self) -> ConnectionTracker {
        self.connections.clone()
    }

    /// Run the server until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Draining in-flight requests");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// WebSocket bridge first, then the dispatch chain.
async fn handle(State(state): State<AppState>, request: Request<Body>) -> Response<Body> {
    match state.bridge.try_upgrade(request).await {
        Outcome::Handled(response) => response,
        Outcome::Declined(request) => state.chain.handle(request).await,
    }
}

fn panic_response(_panic: Box<dyn Any + Send + 'static>) -> Response<Body> {
    tracing::error!("Request handler panicked");
    internal_error(false, "")
}
