//! Library API server.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request      ┌──────────────────────────────────────────────────┐
//!     ────────────────────┼─▶ net::Listener ─▶ http::server ─▶ api::pipeline │
//!                         │                                       │          │
//!                         │                        pool ◀─────────┤          │
//!                         │                                       ▼          │
//!                         │                                  api::Handler    │
//!                         │                                       │          │
//!     Client Response     │                                       ▼          │
//!     ◀───────────────────┼──────────────── api::encoder ◀── api::error      │
//!                         │                                                  │
//!                         │   config · observability · lifecycle             │
//!                         └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use library_api::api::EchoHandler;
use library_api::config::resolve_config;
use library_api::lifecycle::startup;
use library_api::observability::logging;

#[derive(Parser)]
#[command(name = "library-api")]
#[command(about = "Single-endpoint HTTP API server", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long, env = "LIBRARY_CONFIG")]
    config: Option<PathBuf>,

    /// Service name reported by the default handler.
    #[arg(long, default_value = "library")]
    service: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match resolve_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to read configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = logging::init_logging(&config.observability) {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.listener.bind_address,
        mount_path = %config.listener.mount_path,
        read_header_timeout_secs = config.timeouts.read_header_secs,
        write_timeout_secs = config.timeouts.write_secs,
        "Starting library server"
    );

    let handler = Arc::new(EchoHandler::new(cli.service));
    match startup::run(config, handler).await {
        Ok(()) => {
            tracing::info!("Library server stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Could not start HTTP server");
            ExitCode::FAILURE
        }
    }
}
