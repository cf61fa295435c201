use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde_json::{json, Value};

use crate::AppState;

pub fn health_router() -> Router<AppState> {
    Router::new().route("/healthz", get(healthz))
}

/// Health check endpoint — no auth required.
async fn healthz(State(state): State<AppState>) -> Json<Value> {
    let open_positions = state.store.positions().await.len();
    let uptime_secs = (Utc::now() - state.started_at).num_seconds().max(0);
    Json(json!({
        "status": "ok",
        "mode": state.mode.to_string(),
        "open_positions": open_positions,
        "uptime_secs": uptime_secs,
    }))
}
