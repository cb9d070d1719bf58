//! # matchcast
//!
//! Matchcast server binary: loads configuration, installs logging and
//! metrics, and serves the HTTP/WebSocket endpoints until ctrl-c.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use matchcast_core::logging::{self, LogFormat};
use matchcast_server::config::{self, ServerConfig};
use matchcast_server::metrics;
use matchcast_server::server::MatchcastServer;
use matchcast_server::store::InMemoryMatchStore;

/// Live match notification server.
#[derive(Parser, Debug)]
#[command(name = "matchcast", about = "Live match notification server")]
struct Cli {
    /// Host to bind (overrides config and env).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides config and env).
    #[arg(long)]
    port: Option<u16>,

    /// Heartbeat interval in milliseconds (overrides config and env).
    #[arg(long)]
    heartbeat_interval_ms: Option<u64>,

    /// Path to a JSON config file.
    #[arg(long, env = "MATCHCAST_CONFIG")]
    config: Option<PathBuf>,

    /// Default log filter when `RUST_LOG` is unset.
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log output format.
    #[arg(long, value_enum, ignore_case = true, default_value_t = LogFormat::Compact)]
    log_format: LogFormat,
}

impl Cli {
    fn apply_overrides(&self, config: &mut ServerConfig) {
        if let Some(host) = &self.host {
            config.host.clone_from(host);
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(ms) = self.heartbeat_interval_ms {
            config.heartbeat_interval_ms = ms;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    logging::init_subscriber(&args.log_level, args.log_format);

    let mut config =
        config::load_config(args.config.as_deref()).context("Failed to load config")?;
    args.apply_overrides(&mut config);

    let metrics_handle =
        metrics::install_recorder().context("Failed to install metrics recorder")?;

    let server = MatchcastServer::new(config, Arc::new(InMemoryMatchStore::new()))
        .context("Invalid configuration")?
        .with_metrics(metrics_handle);
    let addr = server
        .listen()
        .await
        .context("Failed to bind server")?;

    tracing::info!(
        heartbeat_ms = server.config().heartbeat_interval_ms,
        "matchcast listening on http://{addr}"
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    let report = server.shutdown_gracefully(None).await;
    tracing::info!(
        completed = report.completed.len(),
        aborted = report.aborted.len(),
        "Shutdown complete"
    );
    Ok(())
}
