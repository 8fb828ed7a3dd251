//! Configuration schema definitions.
//!
//! `AdapterConfig` is the single immutable configuration value. It is built
//! once at process entry from the bundle's build options and the environment,
//! then handed to every component constructor.

use serde::{Deserialize, Serialize};
use url::Url;

/// Root configuration for the adapter.
#[derive(Debug, Clone)]
pub struct AdapterConfig {
    /// Listener configuration (bind host and port).
    pub listener: ListenerConfig,

    /// Fixed public origin. When set it overrides every proxy header.
    pub origin: Option<Url>,

    /// How many hops from the right of `x-forwarded-for` to trust.
    pub xff_depth: usize,

    /// Proxy header names (lower-cased, empty = disabled).
    pub headers: ProxyHeaderConfig,

    /// Which parts of the bundle are served and where.
    pub assets: AssetConfig,

    /// WebSocket bridge settings.
    pub websocket: WebSocketConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,

    /// Expose error details in 500 responses.
    pub development: bool,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            origin: None,
            xff_depth: 1,
            headers: ProxyHeaderConfig::default(),
            assets: AssetConfig::default(),
            websocket: WebSocketConfig::default(),
            timeouts: TimeoutConfig::default(),
            observability: ObservabilityConfig::default(),
            development: false,
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    /// Bind host (e.g., "0.0.0.0").
    pub host: String,

    /// Bind port. 0 lets the OS pick one.
    pub port: u16,
}

impl ListenerConfig {
    pub fn bind_address(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

/// Names of the headers a fronting proxy uses to describe the original
/// request.
#[derive(Debug, Clone)]
pub struct ProxyHeaderConfig {
    /// Header carrying the client address (e.g. `x-forwarded-for`).
    pub address: String,

    /// Header carrying the original protocol (e.g. `x-forwarded-proto`).
    pub protocol: String,

    /// Header carrying the original host.
    pub host: String,

    /// Header carrying the original port.
    pub port: String,
}

impl Default for ProxyHeaderConfig {
    fn default() -> Self {
        Self {
            address: String::new(),
            protocol: String::new(),
            host: "host".to_string(),
            port: String::new(),
        }
    }
}

/// Static asset serving.
#[derive(Debug, Clone)]
pub struct AssetConfig {
    /// Serve files from the client directory at all.
    pub enabled: bool,

    /// Application asset directory name; requests under `/{app_dir}/` are
    /// static asset requests.
    pub app_dir: String,
}

impl AssetConfig {
    /// URL prefix of application assets, with both slashes.
    pub fn prefix(&self) -> String {
        format!("/{}/", self.app_dir)
    }

    /// URL prefix of content-hashed, never-changing assets.
    pub fn immutable_prefix(&self) -> String {
        format!("/{}/immutable/", self.app_dir)
    }
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            app_dir: "_app".to_string(),
        }
    }
}

/// WebSocket bridge configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WebSocketConfig {
    /// Enable the upgrade bridge.
    pub enabled: bool,

    /// Only upgrade requests for exactly this path. `None` means any path.
    pub path: Option<String>,

    /// Request per-message compression.
    pub compression: bool,

    /// Largest accepted incoming message in bytes.
    pub max_compressed_size: usize,

    /// Buffered outbound bytes beyond which `send` reports backpressure.
    pub max_backpressure: usize,

    /// Accept upgrades when the handler has no decision callback.
    pub accept_without_decision: bool,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: None,
            compression: true,
            max_compressed_size: 64 * 1024,
            max_backpressure: 16 * 1024 * 1024,
            accept_without_decision: false,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    /// Time allowed to produce response headers. `None` disables the limit.
    pub request_secs: Option<u64>,

    /// Grace period for live connections after a shutdown signal.
    pub shutdown_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: None,
            shutdown_secs: 30,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    pub log_level: String,

    /// Human-readable or JSON log lines.
    pub log_format: LogFormat,

    /// Prometheus exporter bind address. `None` disables the exporter.
    pub metrics_address: Option<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_address: None,
        }
    }
}

/// Options fixed at build time, read from `adapter.toml` in the bundle.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BuildOptions {
    /// Prefix applied to every environment variable lookup.
    pub env_prefix: String,

    /// Development mode.
    pub development: bool,

    /// Default for `XFF_DEPTH`.
    pub xff_depth: usize,

    /// Serve the client asset directory.
    pub assets: bool,

    /// Application asset directory name.
    pub app_dir: String,

    pub websocket: WebSocketConfig,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            env_prefix: String::new(),
            development: false,
            xff_depth: 1,
            assets: true,
            app_dir: "_app".to_string(),
            websocket: WebSocketConfig::default(),
        }
    }
}
