//! Request dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! Request
//!     → static_assets.rs (/_app/*, /favicon.png, /robots.txt; misses are 404)
//!     → prerendered.rs   (manifest routes with a file on disk)
//!     → dynamic.rs       (framework renderer, always answers)
//!     → Response
//! ```
//!
//! # Design Decisions
//! - Strict priority order; a tier is fully resolved before the next runs
//! - Declining hands the request back so the next tier owns it
//! - Errors and panics stop at the chain boundary as plain-text 500s

pub mod dynamic;
pub mod prerendered;
pub mod static_assets;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::header::{HeaderValue, CACHE_CONTROL, CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE, VARY};
use axum::http::{Request, Response};
use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;

use crate::http::files::ServedFile;
use crate::http::response::{internal_error, not_found};
use crate::observability::metrics;

pub use dynamic::DynamicResponder;
pub use prerendered::PrerenderedResponder;
pub use static_assets::StaticAssetResponder;

/// Cache policy for content-hashed assets.
pub const IMMUTABLE_CACHE: &str = "public, max-age=31536000, immutable";

/// Cache policy for everything else served from disk.
pub const SHORT_CACHE: &str = "public, max-age=3600";

/// Result of offering a request to one responder.
#[derive(Debug)]
pub enum Outcome {
    /// The responder produced the final response.
    Handled(Response<Body>),
    /// Not this responder's request; ownership goes back to the caller.
    Declined(Request<Body>),
}

/// Failure inside a responder. Converted to a 500 by the chain.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One tier of the dispatch chain.
#[async_trait]
pub trait Responder: Send + Sync {
    /// Short name used in logs and metrics.
    fn name(&self) -> &'static str;

    async fn try_handle(&self, request: Request<Body>) -> Result<Outcome, DispatchError>;
}

/// Static → prerendered → dynamic, first answer wins.
pub struct DispatchChain {
    responders: Vec<Arc<dyn Responder>>,
    development: bool,
}

impl DispatchChain {
    /// Compose the tiers in their fixed order. `static_assets` is omitted
    /// when asset serving is disabled.
    pub fn new(
        static_assets: Option<StaticAssetResponder>,
        prerendered: PrerenderedResponder,
        dynamic: DynamicResponder,
        development: bool,
    ) -> Self {
        let mut responders: Vec<Arc<dyn Responder>> = Vec::with_capacity(3);
        if let Some(static_assets) = static_assets {
            responders.push(Arc::new(static_assets));
        }
        responders.push(Arc::new(prerendered));
        responders.push(Arc::new(dynamic));
        Self {
            responders,
            development,
        }
    }

    /// Answer a request. Never fails.
    pub async fn handle(&self, request: Request<Body>) -> Response<Body> {
        let start = Instant::now();
        let method = request.method().clone();
        let path = request.uri().path().to_string();

        let (tier, response) = match AssertUnwindSafe(self.dispatch(request)).catch_unwind().await {
            Ok(Ok(handled)) => handled,
            Ok(Err(e)) => {
                tracing::error!(method = %method, path = %path, error = %e, "Responder failed");
                ("error", internal_error(self.development, &e.to_string()))
            }
            Err(_) => {
                tracing::error!(method = %method, path = %path, "Responder panicked");
                ("error", internal_error(self.development, "responder panicked"))
            }
        };

        let status = response.status();
        tracing::debug!(
            method = %method,
            path = %path,
            status = status.as_u16(),
            tier,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Request dispatched"
        );
        metrics::record_request(method.as_str(), status.as_u16(), tier, start);

        response
    }

    async fn dispatch(
        &self,
        mut request: Request<Body>,
    ) -> Result<(&'static str, Response<Body>), DispatchError> {
        for responder in &self.responders {
            match responder.try_handle(request).await? {
                Outcome::Handled(response) => return Ok((responder.name(), response)),
                Outcome::Declined(returned) => request = returned,
            }
        }
        Ok(("none", not_found()))
    }
}

/// 200 response streaming an opened file.
pub(crate) fn file_response(served: ServedFile, content_type: &str, cache_control: &'static str) -> Response<Body> {
    let encoding = served.encoding;
    let has_variants = served.has_variants;
    let len = served.len;

    let mut response = Response::new(served.into_body());
    let headers = response.headers_mut();
    headers.insert(CACHE_CONTROL, HeaderValue::from_static(cache_control));
    headers.insert(CONTENT_LENGTH, HeaderValue::from(len));
    if let Ok(value) = HeaderValue::from_str(content_type) {
        headers.insert(CONTENT_TYPE, value);
    }
    if let Some(encoding) = encoding {
        headers.insert(CONTENT_ENCODING, encoding.header_value());
    }
    if has_variants {
        headers.insert(VARY, HeaderValue::from_static("accept-encoding"));
    }
    response
}
