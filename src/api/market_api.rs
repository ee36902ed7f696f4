//! 行情 API

use std::sync::Arc;

use axum::{extract::State, Json};

use crate::{
    app_state::AppState,
    service::market_data::{ExchangeStats, MarketOverview},
};

/// GET /api/stats
#[utoipa::path(
    get,
    path = "/api/stats",
    responses((status = 200, body = ExchangeStats)),
    tag = "market"
)]
pub async fn get_stats(State(state): State<Arc<AppState>>) -> Json<ExchangeStats> {
    Json(state.market.stats())
}

/// GET /api/market
#[utoipa::path(
    get,
    path = "/api/market",
    responses((status = 200, body = MarketOverview)),
    tag = "market"
)]
pub async fn get_market(State(state): State<Arc<AppState>>) -> Json<MarketOverview> {
    Json(state.market.market())
}
