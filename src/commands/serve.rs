//! `serve` command: run the HTTP/websocket API.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::server::{self, AppState};
use crate::session::SessionStore;
use crate::Config;

use super::{build_agent, AppComponents};

/// Bootstrap the components and serve until interrupted.
/// `host`/`port` override the configured bind address.
pub async fn run(config: &Config, host: Option<&str>, port: Option<u16>) -> Result<()> {
    let mut config = config.clone();
    if let Some(host) = host {
        config.host = host.to_string();
    }
    if let Some(port) = port {
        config.port = port;
    }

    let components = AppComponents::init(&config).await?;
    let agent = build_agent(&config, &components)?;

    let addr: SocketAddr = config
        .bind_addr()
        .parse()
        .with_context(|| format!("invalid server address {}", config.bind_addr()))?;

    info!(
        vector_backend = %config.vector_backend,
        graph_backend = %config.graph_backend,
        "Starting API server"
    );

    let state = AppState::new(Arc::new(agent), Arc::new(SessionStore::new()));
    server::serve(addr, state).await?;
    Ok(())
}
