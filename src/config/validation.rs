//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (parsing handles syntax)
//! - Validate value ranges (depth >= 1, sizes > 0)
//! - Check header names and URL shapes
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AdapterConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use axum::http::HeaderName;

use crate::config::schema::AdapterConfig;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Check every semantic constraint and report all violations.
pub fn validate_config(config: &AdapterConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.xff_depth < 1 {
        errors.push(ValidationError::new("XFF_DEPTH", "must be at least 1"));
    }

    if let Some(origin) = &config.origin {
        if !matches!(origin.scheme(), "http" | "https") {
            errors.push(ValidationError::new(
                "ORIGIN",
                format!("scheme must be http or https, got {}", origin.scheme()),
            ));
        }
        if origin.host_str().is_none() {
            errors.push(ValidationError::new("ORIGIN", "must include a host"));
        }
    }

    let headers = [
        ("ADDRESS_HEADER", &config.headers.address),
        ("PROTOCOL_HEADER", &config.headers.protocol),
        ("HOST_HEADER", &config.headers.host),
        ("PORT_HEADER", &config.headers.port),
    ];
    for (field, name) in headers {
        if !name.is_empty() && HeaderName::from_bytes(name.as_bytes()).is_err() {
            errors.push(ValidationError::new(field, format!("invalid header name {:?}", name)));
        }
    }

    let app_dir = &config.assets.app_dir;
    if app_dir.is_empty() || app_dir.contains('/') || app_dir == "." || app_dir == ".." {
        errors.push(ValidationError::new(
            "app_dir",
            format!("must be a single directory name, got {:?}", app_dir),
        ));
    }

    let ws = &config.websocket;
    if let Some(path) = &ws.path {
        if !path.starts_with('/') {
            errors.push(ValidationError::new(
                "websocket.path",
                format!("must start with '/', got {:?}", path),
            ));
        }
    }
    if ws.max_compressed_size == 0 {
        errors.push(ValidationError::new("websocket.max_compressed_size", "must be greater than 0"));
    }
    if ws.max_backpressure == 0 {
        errors.push(ValidationError::new("websocket.max_backpressure", "must be greater than 0"));
    }

    if config.timeouts.request_secs == Some(0) {
        errors.push(ValidationError::new("REQUEST_TIMEOUT", "must be greater than 0 when set"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
