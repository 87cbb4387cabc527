//! HTTP and websocket API
//!
//! Endpoints:
//! - `POST /query?session_id=<id>` answers a question and records the turns
//! - `GET /message-history/:session_id` returns the stored history
//! - `GET /ws/:session_id` streams answers over a websocket
//! - `GET /health` liveness probe

pub mod routes;
pub mod ws;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::agent::Agent;
use crate::session::SessionStore;
use crate::Result;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub agent: Arc<Agent>,
    pub sessions: Arc<SessionStore>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(agent: Arc<Agent>, sessions: Arc<SessionStore>) -> Self {
        Self {
            agent,
            sessions,
            started_at: Instant::now(),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/query", post(routes::query))
        .route(
            "/message-history/:session_id",
            get(routes::message_history),
        )
        .route("/ws/:session_id", get(ws::websocket))
        .route("/health", get(routes::health))
        .with_state(state)
        .layer(cors)
}

/// Bind the listener and serve until the process stops.
pub async fn serve(addr: SocketAddr, state: AppState) -> Result<()> {
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("API server listening on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
