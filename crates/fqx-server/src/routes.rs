//! # HTTP Route Handlers
//!
//! Small read-only endpoints. Planning itself lives in `planning`.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use std::sync::Arc;

use crate::state::AppState;

/// GET /health
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

/// GET /config: the planner configuration applied to every request.
pub async fn config(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.config.planner.clone())
}
