//! 交易历史 API
//!
//! 历史记录来自 TransactionStore；状态轮询走 TransactionSimulator

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    api::response::{pagination::PaginationParams, ApiPath, ApiQuery},
    app_state::AppState,
    domain::{SimulatedTransaction, TxKind},
    error::AppError,
    repository::{TransactionFilter, TransactionRecord},
};

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HistoryQuery {
    /// 按发起方地址过滤（大小写不敏感）
    pub wallet: Option<String>,
    /// swap / transfer
    pub kind: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HistoryResponse {
    pub transactions: Vec<TransactionRecord>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
}

/// GET /api/history, /api/transactions
#[utoipa::path(
    get,
    path = "/api/history",
    params(HistoryQuery),
    responses(
        (status = 200, body = HistoryResponse),
        (status = 400, description = "Unknown transaction kind")
    ),
    tag = "history"
)]
pub async fn get_history(
    State(state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<HistoryQuery>,
) -> Result<Json<HistoryResponse>, AppError> {
    let pagination = PaginationParams::new(query.page, query.limit);
    let kind = query
        .kind
        .as_deref()
        .filter(|k| !k.trim().is_empty())
        .map(|k| k.trim().parse::<TxKind>().map_err(AppError::validation_failed))
        .transpose()?;

    let filter = TransactionFilter {
        wallet: query.wallet.filter(|w| !w.trim().is_empty()),
        kind: kind.map(|k| k.as_str().to_string()),
    };

    let (transactions, total) = state
        .store
        .query(&filter, pagination.page, pagination.limit)
        .await
        .map_err(|e| {
            tracing::error!(store = state.store.name(), error = %e, "Failed to query transaction history");
            AppError::internal("Failed to load transaction history")
        })?;

    Ok(Json(HistoryResponse {
        transactions,
        total,
        page: pagination.page,
        limit: pagination.limit,
    }))
}

/// GET /api/transactions/:hash/status
#[utoipa::path(
    get,
    path = "/api/transactions/{hash}/status",
    params(("hash" = String, Path, description = "Transaction hash")),
    responses(
        (status = 200, body = SimulatedTransaction),
        (status = 400, description = "Empty hash")
    ),
    tag = "history"
)]
pub async fn get_transaction_status(
    State(state): State<Arc<AppState>>,
    ApiPath(hash): ApiPath<String>,
) -> Result<Json<SimulatedTransaction>, AppError> {
    Ok(Json(state.simulator.get_status(&hash).await?))
}
