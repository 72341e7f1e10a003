//! # fqx-server: HTTP Service for the Federated Query Planner
//!
//! Exposes `fqx_core::Planner` as a network service. Source selection happens
//! in the caller: it matches the query against its sources and sends the
//! resulting fragments, and gets back the plan to execute.
//!
//! ## Architecture
//!
//! ```text
//! Federation engine
//!   |
//!   | HTTP POST /plan (query triples + matched fragments, JSON)
//!   v
//! fqx-server (this binary)
//!   |
//!   +-> build Query and Fragments (400 on bad references)
//!   +-> Planner::plan (dedup, component search, reduction, join order)
//!   |
//!   | HTTP response (plan tree, JSON)
//!   v
//! Federation engine
//! ```
//!
//! ## Endpoints
//!
//! - `GET  /health` - Health check
//! - `GET  /config` - Active planner configuration
//! - `POST /plan`   - Plan a query over matched fragments
//!
//! ## Configuration
//!
//! The server listens on `0.0.0.0:3000` unless `FQX_LISTEN_ADDR` says
//! otherwise. Logging is controlled by `RUST_LOG` (defaults to `fqx=debug`).

mod planning;
mod routes;
mod state;

use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("fqx=debug".parse()?))
        .init();

    let config = state::ServerConfig::from_env();
    let addr = config.listen_addr.clone();
    let state = Arc::new(state::AppState::new(config));

    let app = Router::new()
        .route("/health", get(routes::health))
        .route("/config", get(routes::config))
        .route("/plan", post(planning::plan_query))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(addr.as_str()).await?;
    tracing::info!("fqx-server listening on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
