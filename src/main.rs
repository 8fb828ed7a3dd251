//! Site adapter server binary.
//!
//! Serves a framework build directory: static client assets, prerendered
//! pages and, when linked in, a dynamic renderer. This binary hosts bundles
//! without server-side logic; applications with a renderer or WebSocket
//! hooks embed the library and call `bootstrap` with their own.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use site_adapter::config::{self, EnvResolver, LogFormat};
use site_adapter::lifecycle::signals::spawn_signal_handler;
use site_adapter::observability::{logging, metrics};
use site_adapter::{bootstrap, NotFoundRenderer};

#[derive(Debug, Parser)]
#[command(name = "site-adapter", version, about = "Serve a framework build directory")]
struct Cli {
    /// Build output directory (client/, prerendered/, manifest.json).
    #[arg(long, env = "ADAPTER_DIR", default_value = "build")]
    dir: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let env = EnvResolver::from_process("");

    let config = match config::load_config(&cli.dir, &env) {
        Ok(config) => config,
        Err(e) => {
            logging::init(&config::schema::ObservabilityConfig::default());
            tracing::error!(error = %e, dir = %cli.dir.display(), "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    logging::init(&config.observability);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        dir = %cli.dir.display(),
        json_logs = config.observability.log_format == LogFormat::Json,
        "site-adapter starting"
    );

    if let Some(address) = &config.observability.metrics_address {
        match address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics exporter");
                }
            }
            Err(e) => {
                tracing::error!(metrics_address = %address, error = %e, "Failed to parse metrics address");
            }
        }
    }

    let app = match bootstrap(config, &cli.dir, &env, Arc::new(NotFoundRenderer), None).await {
        Ok(app) => app,
        Err(e) => {
            tracing::error!(error = %e, "Startup failed");
            return ExitCode::FAILURE;
        }
    };

    spawn_signal_handler(app.shutdown_handle());

    match app.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Server error");
            ExitCode::FAILURE
        }
    }
}
