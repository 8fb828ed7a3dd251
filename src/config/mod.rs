//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! bundle/adapter.toml (build options, optional)
//!     → loader.rs (deserialize BuildOptions)
//! process environment
//!     → env.rs (prefix-aware lookup, typed coercion)
//!     → loader.rs (overlay onto build options)
//!     → validation.rs (semantic checks)
//!     → AdapterConfig (validated, immutable)
//!     → passed into every component constructor
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no reload
//! - All fields have defaults to allow an empty environment
//! - Validation separates syntactic (serde, parsing) from semantic checks

pub mod env;
pub mod loader;
pub mod schema;
pub mod validation;

pub use env::EnvResolver;
pub use loader::{load_config, ConfigError};
pub use schema::AdapterConfig;
pub use schema::AssetConfig;
pub use schema::BuildOptions;
pub use schema::ListenerConfig;
pub use schema::LogFormat;
pub use schema::ProxyHeaderConfig;
pub use schema::WebSocketConfig;
