//! Configuration loading from the bundle and the environment.

use std::fs;
use std::path::{Path, PathBuf};

use url::Url;

use crate::config::env::EnvResolver;
use crate::config::schema::{
    AdapterConfig, AssetConfig, BuildOptions, ListenerConfig, LogFormat, ObservabilityConfig,
    ProxyHeaderConfig, TimeoutConfig,
};
use crate::config::validation::{validate_config, ValidationError};

/// Build options file name inside the bundle directory.
pub const BUILD_OPTIONS_FILE: &str = "adapter.toml";

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("environment variable {name} must be a valid integer, got: {value:?}")]
    InvalidInteger { name: String, value: String },

    #[error("environment variable {name} has an unsupported value: {value:?}")]
    InvalidValue { name: String, value: String },

    #[error("ORIGIN is not an absolute URL ({value:?}): {source}")]
    InvalidOrigin {
        value: String,
        #[source]
        source: url::ParseError,
    },

    #[error("validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Read `adapter.toml`. A missing file yields the defaults.
pub fn load_build_options(path: &Path) -> Result<BuildOptions, ConfigError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "No build options file, using defaults");
            return Ok(BuildOptions::default());
        }
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    Ok(toml::from_str(&content)?)
}

/// Resolve runtime settings from the environment on top of build options.
///
/// `env` is re-prefixed with the build's `env_prefix`.
pub fn from_env(options: &BuildOptions, env: &EnvResolver) -> Result<AdapterConfig, ConfigError> {
    let env = env.with_prefix(options.env_prefix.clone());

    let origin = match env.get("ORIGIN").filter(|v| !v.trim().is_empty()) {
        Some(value) => Some(Url::parse(value.trim()).map_err(|source| {
            ConfigError::InvalidOrigin {
                value: value.clone(),
                source,
            }
        })?),
        None => None,
    };

    let log_format = match env.string("LOG_FORMAT", "pretty").to_ascii_lowercase().as_str() {
        "pretty" | "" => LogFormat::Pretty,
        "json" => LogFormat::Json,
        other => {
            return Err(ConfigError::InvalidValue {
                name: "LOG_FORMAT".to_string(),
                value: other.to_string(),
            })
        }
    };

    Ok(AdapterConfig {
        listener: ListenerConfig {
            host: env.string("HOST", "0.0.0.0"),
            port: env.int("PORT", 3000u16)?,
        },
        origin,
        xff_depth: env.int("XFF_DEPTH", options.xff_depth)?,
        headers: ProxyHeaderConfig {
            address: env.string("ADDRESS_HEADER", "").to_ascii_lowercase(),
            protocol: env.string("PROTOCOL_HEADER", "").to_ascii_lowercase(),
            host: env.string("HOST_HEADER", "host").to_ascii_lowercase(),
            port: env.string("PORT_HEADER", "").to_ascii_lowercase(),
        },
        assets: AssetConfig {
            enabled: options.assets,
            app_dir: options.app_dir.clone(),
        },
        websocket: options.websocket.clone(),
        timeouts: TimeoutConfig {
            request_secs: env.opt_int("REQUEST_TIMEOUT")?,
            shutdown_secs: env.int("SHUTDOWN_TIMEOUT", 30u64)?,
        },
        observability: ObservabilityConfig {
            log_level: env.string("LOG_LEVEL", "info"),
            log_format,
            metrics_address: env.get("METRICS_ADDRESS").filter(|v| !v.is_empty()),
        },
        development: options.development,
    })
}

/// Load build options from `bundle_dir`, overlay the environment and
/// validate the result.
pub fn load_config(bundle_dir: &Path, env: &EnvResolver) -> Result<AdapterConfig, ConfigError> {
    let options = load_build_options(&bundle_dir.join(BUILD_OPTIONS_FILE))?;
    let config = from_env(&options, env)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}
