//! Standalone API server entry point.
//!
//! Equivalent to `hr_assistant serve`, for deployments that only run the
//! HTTP/websocket surface.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use hr_assistant::{commands, metrics, Config};

#[derive(Parser)]
#[command(name = "hr_api")]
#[command(about = "HR assistant HTTP/websocket API server")]
struct Cli {
    /// Host to bind (overrides config)
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (overrides config)
    #[arg(long)]
    port: Option<u16>,

    /// Path to the YAML config
    #[arg(long)]
    config: Option<PathBuf>,

    /// Address to expose Prometheus metrics (e.g., 0.0.0.0:9898)
    #[arg(long, env = "METRICS_ADDR")]
    metrics_addr: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("hr_assistant=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    if let Some(addr) = cli.metrics_addr.as_deref() {
        match addr.parse::<SocketAddr>() {
            Ok(socket) => metrics::spawn_metrics_server(socket),
            Err(err) => warn!(%addr, "Invalid metrics address: {}", err),
        }
    }

    let config = match &cli.config {
        Some(path) => Config::load_from_file(path).map_err(anyhow::Error::msg)?,
        None => Config::new(),
    };

    commands::serve::run(&config, cli.host.as_deref(), cli.port).await
}
