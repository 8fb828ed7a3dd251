//! Static asset tier.
//!
//! Serves the client directory for `/{app_dir}/*` and a few root-level
//! well-known files. A miss here is a terminal 404: asset URLs are never
//! valid page routes.

use std::path::PathBuf;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;

use crate::config::AssetConfig;
use crate::dispatch::{file_response, DispatchError, Outcome, Responder, IMMUTABLE_CACHE, SHORT_CACHE};
use crate::http::files;
use crate::http::response::not_found;

/// Root-level files served from the client directory.
pub const ROOT_FILES: &[&str] = &["/favicon.png", "/robots.txt"];

#[derive(Debug, Clone)]
pub struct StaticAssetResponder {
    root: PathBuf,
    prefix: String,
    immutable_prefix: String,
}

impl StaticAssetResponder {
    pub fn new(root: impl Into<PathBuf>, assets: &AssetConfig) -> Self {
        Self {
            root: root.into(),
            prefix: assets.prefix(),
            immutable_prefix: assets.immutable_prefix(),
        }
    }

    /// Whether `path` belongs to this tier at all.
    pub fn applies(&self, path: &str) -> bool {
        path.starts_with(&self.prefix) || ROOT_FILES.contains(&path)
    }

    fn cache_control(&self, path: &str) -> &'static str {
        if path.starts_with(&self.immutable_prefix) {
            IMMUTABLE_CACHE
        } else {
            SHORT_CACHE
        }
    }
}

#[async_trait]
impl Responder for StaticAssetResponder {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn try_handle(&self, request: Request<Body>) -> Result<Outcome, DispatchError> {
        let path = request.uri().path();
        if !self.applies(path) {
            return Ok(Outcome::Declined(request));
        }

        let Some(relative) = files::sanitize(path) else {
            tracing::debug!(path = %path, "Rejected asset path");
            return Ok(Outcome::Handled(not_found()));
        };
        let full = self.root.join(relative);

        let served = files::open(&full, request.headers())
            .await
            .map_err(|source| DispatchError::Io {
                path: full.clone(),
                source,
            })?;

        match served {
            Some(served) => {
                let content_type = files::content_type(path, &full);
                Ok(Outcome::Handled(file_response(
                    served,
                    &content_type,
                    self.cache_control(path),
                )))
            }
            None => {
                tracing::debug!(path = %path, file = %full.display(), "Asset not found");
                Ok(Outcome::Handled(not_found()))
            }
        }
    }
}
