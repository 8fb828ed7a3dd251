//! Dynamic render tier. Always answers.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::Request;

use crate::dispatch::{DispatchError, Outcome, Responder};
use crate::http::request::RequestNormalizer;
use crate::http::response::{internal_error, ResponseNormalizer};
use crate::render::{DynamicRenderer, Platform, RenderContext};

#[derive(Clone)]
pub struct DynamicResponder {
    renderer: Arc<dyn DynamicRenderer>,
    normalizer: RequestNormalizer,
    platform: Platform,
}

impl DynamicResponder {
    pub fn new(renderer: Arc<dyn DynamicRenderer>, normalizer: RequestNormalizer, platform: Platform) -> Self {
        Self {
            renderer,
            normalizer,
            platform,
        }
    }
}

#[async_trait]
impl Responder for DynamicResponder {
    fn name(&self) -> &'static str {
        "dynamic"
    }

    async fn try_handle(&self, request: Request<Body>) -> Result<Outcome, DispatchError> {
        let (parts, body) = request.into_parts();
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);

        let normalized = self.normalizer.normalize(&parts, body, peer);
        let context = RenderContext::new(normalized.client_address.clone(), self.platform.clone());

        match self.renderer.respond(normalized, context).await {
            Ok(rendered) => Ok(Outcome::Handled(ResponseNormalizer.normalize(rendered))),
            Err(e) => {
                tracing::error!(
                    method = %parts.method,
                    path = %parts.uri.path(),
                    error = %e,
                    "Renderer failed"
                );
                Ok(Outcome::Handled(internal_error(self.platform.development, &e.to_string())))
            }
        }
    }
}
