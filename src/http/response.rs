//! Response handling and transformation.
//!
//! # Responsibilities
//! - Carry the framework's response shape (status text, cookie list)
//! - Fan multi-value `Set-Cookie` out into independent header lines
//! - Build the plain-text error responses used across the adapter
//!
//! # Design Decisions
//! - Bodies pass through untouched so streaming responses stay streaming
//! - A custom status text reaches the wire via hyper's `ReasonPhrase`
//! - Error bodies never include internals unless development mode is on

use axum::body::Body;
use axum::http::header::{HeaderMap, HeaderValue, CONTENT_TYPE, SET_COOKIE};
use axum::http::{Response, StatusCode};
use hyper::ext::ReasonPhrase;

/// A response as produced by the framework renderer.
#[derive(Debug)]
pub struct RenderedResponse {
    pub status: StatusCode,
    /// Reason phrase, when the framework set one.
    pub status_text: Option<String>,
    pub headers: HeaderMap,
    /// Every cookie the framework set, one entry per cookie. `None` when the
    /// framework exposes no such list.
    pub set_cookies: Option<Vec<String>>,
    pub body: Body,
}

impl RenderedResponse {
    pub fn new(status: StatusCode, body: impl Into<Body>) -> Self {
        Self {
            status,
            status_text: None,
            headers: HeaderMap::new(),
            set_cookies: None,
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: &'static str, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_status_text(mut self, text: impl Into<String>) -> Self {
        self.status_text = Some(text.into());
        self
    }

    pub fn with_cookies<I, S>(mut self, cookies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set_cookies = Some(cookies.into_iter().map(Into::into).collect());
        self
    }
}

impl From<Response<Body>> for RenderedResponse {
    fn from(response: Response<Body>) -> Self {
        let (parts, body) = response.into_parts();
        let status_text = parts
            .extensions
            .get::<ReasonPhrase>()
            .and_then(|reason| std::str::from_utf8(reason.as_bytes()).ok())
            .map(str::to_string);
        Self {
            status: parts.status,
            status_text,
            headers: parts.headers,
            set_cookies: None,
            body,
        }
    }
}

/// Adapts framework responses to the transport.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseNormalizer;

impl ResponseNormalizer {
    pub fn normalize(&self, rendered: RenderedResponse) -> Response<Body> {
        let RenderedResponse {
            status,
            status_text,
            mut headers,
            set_cookies,
            body,
        } = rendered;

        if let Some(cookies) = set_cookies.filter(|c| !c.is_empty()) {
            headers.remove(SET_COOKIE);
            for cookie in cookies {
                match HeaderValue::from_str(&cookie) {
                    Ok(value) => {
                        headers.append(SET_COOKIE, value);
                    }
                    Err(_) => tracing::warn!(cookie = %cookie, "Dropping unencodable Set-Cookie value"),
                }
            }
        }

        let mut response = Response::new(body);
        *response.status_mut() = status;
        *response.headers_mut() = headers;

        if let Some(text) = status_text {
            if Some(text.as_str()) != status.canonical_reason() {
                if let Ok(reason) = ReasonPhrase::try_from(text) {
                    response.extensions_mut().insert(reason);
                }
            }
        }

        response
    }
}

/// A `text/plain` response.
pub fn plain_text(status: StatusCode, body: impl Into<String>) -> Response<Body> {
    let mut response = Response::new(Body::from(body.into()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
    response
}

pub fn not_found() -> Response<Body> {
    plain_text(StatusCode::NOT_FOUND, "Not Found")
}

/// Generic 500; the detail is only shown in development mode.
pub fn internal_error(development: bool, detail: &str) -> Response<Body> {
    if development {
        plain_text(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Internal Server Error: {}", detail),
        )
    } else {
        plain_text(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
    }
}
