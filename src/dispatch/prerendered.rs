//! Prerendered page tier.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;

use crate::bundle::RouteManifest;
use crate::dispatch::{file_response, DispatchError, Outcome, Responder, SHORT_CACHE};
use crate::http::files;

const HTML: &str = "text/html";

#[derive(Debug, Clone)]
pub struct PrerenderedResponder {
    manifest: RouteManifest,
}

impl PrerenderedResponder {
    pub fn new(manifest: RouteManifest) -> Self {
        Self { manifest }
    }

    /// Candidate files for a prerendered route, in lookup order.
    pub fn candidates(root: &Path, url_path: &str) -> Vec<PathBuf> {
        let Some(relative) = files::sanitize(url_path) else {
            return Vec::new();
        };
        if relative.as_os_str().is_empty() {
            return vec![root.join("index.html")];
        }

        let base = root.join(relative);
        let index = base.join("index.html");
        let flat = files::with_suffix(&base, ".html");
        if url_path.ends_with('/') {
            vec![index, flat]
        } else {
            vec![flat, index]
        }
    }
}

#[async_trait]
impl Responder for PrerenderedResponder {
    fn name(&self) -> &'static str {
        "prerendered"
    }

    async fn try_handle(&self, request: Request<Body>) -> Result<Outcome, DispatchError> {
        let path = request.uri().path();
        if !self.manifest.is_prerendered(path) {
            return Ok(Outcome::Declined(request));
        }

        for candidate in Self::candidates(self.manifest.prerendered_dir(), path) {
            match files::open(&candidate, request.headers()).await {
                Ok(Some(served)) => {
                    return Ok(Outcome::Handled(file_response(served, HTML, SHORT_CACHE)));
                }
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(
                        path = %path,
                        file = %candidate.display(),
                        error = %e,
                        "Prerendered page unreadable"
                    );
                }
            }
        }

        tracing::debug!(path = %path, "Prerendered route has no file; falling through");
        Ok(Outcome::Declined(request))
    }
}
