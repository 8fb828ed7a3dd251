//! Crate-level error taxonomy.
//!
//! # Design Decisions
//! - Only `AdapterError` may abort the process, and only during startup
//! - Per-request failures never surface here; the dispatch chain turns them
//!   into plain-text responses
//! - Application capabilities (renderer, WebSocket handlers) report
//!   failures as `axum::BoxError` so implementors are not tied to our types

use std::path::PathBuf;

use crate::config::ConfigError;

/// Fatal startup failure.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("bundle error: {0}")]
    Bundle(#[from] BundleError),

    #[error("renderer failed to initialise: {0}")]
    RendererInit(axum::BoxError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// The build output on disk does not satisfy the layout contract.
#[derive(Debug, thiserror::Error)]
pub enum BundleError {
    #[error("required directory not found: {}", .0.display())]
    MissingDirectory(PathBuf),

    #[error("failed to read manifest {}: {source}", path.display())]
    ManifestIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed manifest {}: {source}", path.display())]
    ManifestParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
