use axum::{
    extract::{Query, State},
    middleware,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{auth::require_auth, AppState};

pub fn api_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/positions", get(get_positions))
        .route("/api/signals", get(get_signals))
        .route("/api/trades", get(get_trades))
        .route("/api/performance", get(get_performance))
        .route_layer(middleware::from_fn_with_state(state, require_auth))
}

// ─── Positions ────────────────────────────────────────────────────────────────

async fn get_positions(State(state): State<AppState>) -> Json<Value> {
    let positions = state.store.positions().await;
    Json(json!({
        "positions": positions,
        "total_open": positions.len(),
    }))
}

// ─── Signal journal ───────────────────────────────────────────────────────────

async fn get_signals(State(state): State<AppState>) -> Json<Value> {
    let mut signals = state.store.signals().await;
    signals.reverse(); // newest first

    let entries: Vec<Value> = signals
        .iter()
        .map(|s| {
            json!({
                "time": s.time,
                "symbol": s.symbol,
                "side": s.side,
                "entry_ref": s.entry_ref,
                "stop_ref": s.stop_ref,
                "target_ref": s.target_ref,
                "status": s.status,
                "status_text": s.status.to_string(),
            })
        })
        .collect();

    Json(json!({ "signals": entries, "total": entries.len() }))
}

// ─── Trades ───────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct TradesQuery {
    symbol: Option<String>,
    limit: Option<usize>,
}

async fn get_trades(State(state): State<AppState>, Query(q): Query<TradesQuery>) -> Json<Value> {
    let limit = q.limit.unwrap_or(50).min(200);

    let mut trades = state.store.ledger.all().await;
    if let Some(symbol) = &q.symbol {
        trades.retain(|t| &t.symbol == symbol);
    }
    trades.reverse(); // newest first
    let total = trades.len();
    trades.truncate(limit);

    Json(json!({ "trades": trades, "total": total, "limit": limit }))
}

// ─── Performance ──────────────────────────────────────────────────────────────

async fn get_performance(State(state): State<AppState>) -> Json<Value> {
    let stats = state.store.ledger.stats().await;
    Json(json!(stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use chrono::{TimeZone, Utc};
    use common::{Position, Side, TradingMode};
    use engine::BotStore;
    use tower::util::ServiceExt;

    fn state(store: BotStore) -> AppState {
        AppState {
            store,
            mode: TradingMode::Paper,
            dashboard_token: "secret".to_string(),
            started_at: Utc::now(),
        }
    }

    fn get(path: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(path);
        if let Some(t) = token {
            builder = builder.header("Authorization", format!("Bearer {t}"));
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn body_json(resp: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn api_routes_require_bearer_token() {
        let app = crate::app(state(BotStore::new()));

        let resp = app
            .clone()
            .oneshot(get("/api/positions", None))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let resp = app
            .clone()
            .oneshot(get("/api/positions", Some("wrong")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let resp = app
            .oneshot(get("/api/positions", Some("secret")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn healthz_is_open_and_reports_mode() {
        let store = BotStore::new();
        store
            .insert_position(Position {
                id: "p1".into(),
                symbol: "BTC_USDT".into(),
                side: Side::Long,
                size: 0.05,
                entry_price: 100.0,
                stop_price: 99.0,
                target_price: 101.5,
                one_r: 1.0,
                breakeven_armed: false,
                bars_held: 0,
                opened_at: Utc.with_ymd_and_hms(2024, 6, 3, 14, 0, 0).unwrap(),
            })
            .await;
        let app = crate::app(state(store));

        let resp = app.oneshot(get("/healthz", None)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["mode"], "paper");
        assert_eq!(body["open_positions"], 1);
    }

    #[tokio::test]
    async fn performance_starts_empty() {
        let app = crate::app(state(BotStore::new()));
        let resp = app
            .oneshot(get("/api/performance", Some("secret")))
            .await
            .unwrap();
        let body = body_json(resp).await;
        assert_eq!(body["total"], 0);
        assert_eq!(body["win_rate"], 0.0);
    }
}
