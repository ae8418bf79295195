//! Chatgate Gateway - Local streaming chat gateway.
//!
//! Relays chat messages to a locally-running inference server (Ollama's
//! `/api/generate`), streams the generated tokens back to the browser over
//! Server-Sent Events, and keeps short-lived per-session conversation
//! history in memory.
//!
//! ## Architecture
//!
//! ```text
//! Browser ── GET /chat-stream ──▶ Gateway ── POST /api/generate ──▶ Ollama
//!    ◀──── SSE token events ────      │    ◀──── NDJSON chunks ────
//!                                     ▼
//!                              SessionStore (in-memory, TTL sweep)
//! ```

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod prompt;
pub mod relay;
pub mod routes;
pub mod session;

pub use prompt::{build_prompt, Mode, HISTORY_WINDOW};
pub use relay::{InferenceRelay, RelayEvent};
pub use routes::AppState;
pub use session::{Role, SessionStore, Turn};

use axum::Router;
use chatgate_common::config::Config;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;

/// Build the application state from configuration.
pub fn build_state(config: &Config) -> AppState {
    AppState {
        store: Arc::new(SessionStore::new(Duration::from_secs(config.session.ttl_secs))),
        relay: Arc::new(InferenceRelay::new(&config.inference)),
    }
}

/// Build the gateway router with all routes and middleware.
pub fn build_router(config: &Config) -> Router {
    build_router_with_state(build_state(config), Some(Path::new(&config.server.static_dir)))
}

/// Build the router over explicit state, optionally serving static assets.
/// Useful for tests that need to inspect the session store afterwards.
pub fn build_router_with_state(state: AppState, static_dir: Option<&Path>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut router = routes::api_routes(state).layer(cors);

    if let Some(dir) = static_dir {
        router = router.fallback_service(ServeDir::new(dir));
    }

    router
}

/// Spawn the background sweep task that expires idle sessions.
pub fn spawn_sweeper(store: Arc<SessionStore>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // First tick fires immediately; skip it
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = store.sweep();
            if removed > 0 {
                tracing::info!(removed = removed, live = store.len(), "Swept idle sessions");
            }
        }
    });
}

/// Start the gateway server.
pub async fn start_server(config: &Config) -> anyhow::Result<()> {
    let addr = SocketAddr::from((
        config.server.host.parse::<std::net::IpAddr>()?,
        config.server.port,
    ));

    let state = build_state(config);
    spawn_sweeper(
        state.store.clone(),
        Duration::from_secs(config.session.sweep_interval_secs),
    );

    let router = build_router_with_state(state, Some(Path::new(&config.server.static_dir)));

    tracing::info!(
        addr = %addr,
        model = %config.inference.model,
        upstream = %config.inference.endpoint,
        "Starting Chatgate gateway"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
