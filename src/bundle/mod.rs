//! Build output consumed at startup.
//!
//! # Data Flow
//! ```text
//! bundle directory
//!     ├── adapter.toml      (build options, read by config::loader)
//!     ├── manifest.json     (prerendered route list)
//!     ├── client/           (static assets, required)
//!     └── prerendered/      (prerendered HTML, optional)
//!         → manifest.rs (validate layout, load route set)
//!         → RouteManifest (immutable, owned by the prerendered tier)
//! ```
//!
//! # Design Decisions
//! - Loaded once; read-only for the process lifetime
//! - A missing client directory or manifest is fatal; a missing prerendered
//!   directory is not (prerendered lookups then fall through)

pub mod manifest;

pub use manifest::{RouteManifest, CLIENT_DIR, MANIFEST_FILE, PRERENDERED_DIR};
