mod auth;
pub mod routes;

use std::net::SocketAddr;

use axum::Router;
use chrono::{DateTime, Utc};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use common::TradingMode;
use engine::BotStore;

/// Shared application state injected into every route handler.
#[derive(Clone)]
pub struct AppState {
    pub store: BotStore,
    pub mode: TradingMode,
    pub dashboard_token: String,
    pub started_at: DateTime<Utc>,
}

/// Build the full router. Split out from `serve` so tests can drive it
/// without binding a socket.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_headers(Any)
        .allow_methods(Any);

    Router::new()
        .merge(routes::api_router(state.clone()))
        .merge(routes::health_router())
        .with_state(state)
        .layer(cors)
}

/// Build and run the Axum API server.
pub async fn serve(state: AppState, port: u16) {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = app(state);

    info!(%addr, "Dashboard API listening");
    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
