//! 兑换与转账 API
//!
//! 报价来自 QuoteEngine；执行通过 EvmClient（模拟或真实链），成功后写入交易记录

use std::sync::Arc;

use axum::{extract::State, Json};
use chrono::Utc;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::{
    api::{
        middleware::jwt_extractor::JwtAuthContext,
        response::{ApiJson, ApiQuery},
        wallet_api::record_transaction,
    },
    app_state::AppState,
    config::SimulationConfig,
    domain::{errors::QuoteError, errors::ValidationError, rate_table, Network, SwapQuote, TxKind},
    error::AppError,
    metrics,
    repository::TransactionRecord,
    service::evm_client::Receipt,
    utils::address_validator::AddressValidator,
};

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
#[serde(rename_all = "camelCase")]
pub struct QuoteQuery {
    pub from_token: String,
    pub to_token: String,
    pub amount: String,
    /// 默认 testnet
    pub network: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SwapRequest {
    pub token_in: String,
    pub token_out: String,
    pub amount_in: String,
    pub user_address: String,
    /// 绑定之前获取的报价，过期报价会被拒绝
    pub quote_id: Option<String>,
    /// 执行滑点（百分比），范围由配置决定
    pub slippage: Option<f64>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub token_address: String,
    pub recipient: String,
    pub amount: String,
    pub user_address: String,
}

/// 同一网络下两个符号是否指向同一代币
fn same_token(a: &str, b: &str, network: Network) -> bool {
    rate_table::normalize_symbol(a, network) == rate_table::normalize_symbol(b, network)
}

/// 网络未知时，只有在所有网络下都指向同一代币才视为相同
fn same_token_any_network(a: &str, b: &str) -> bool {
    Network::ALL.iter().all(|n| same_token(a, b, *n))
}

fn validate_slippage(slippage: Option<f64>, config: &SimulationConfig) -> Result<(), ValidationError> {
    let Some(slippage) = slippage else {
        return Ok(());
    };
    if !slippage.is_finite()
        || slippage < config.min_slippage_percent
        || slippage > config.max_slippage_percent
    {
        return Err(ValidationError::new(format!(
            "Slippage must be between {}% and {}%",
            config.min_slippage_percent, config.max_slippage_percent
        )));
    }
    Ok(())
}

/// 报价必须与本次兑换的交易对一致
fn check_quote_matches(quote: &SwapQuote, token_in: &str, token_out: &str) -> Result<(), AppError> {
    if !same_token(&quote.from_token, token_in, quote.network)
        || !same_token(&quote.to_token, token_out, quote.network)
    {
        return Err(AppError::bad_request(format!(
            "Quote {} was issued for {}→{}",
            quote.quote_id, quote.from_token, quote.to_token
        )));
    }
    Ok(())
}

/// GET /api/swap/quote
#[utoipa::path(
    get,
    path = "/api/swap/quote",
    params(QuoteQuery),
    responses(
        (status = 200, body = SwapQuote),
        (status = 400, description = "Invalid amount or identical tokens"),
        (status = 500, description = "Simulated quote failure")
    ),
    tag = "swap"
)]
pub async fn get_quote(
    State(state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<QuoteQuery>,
) -> Result<Json<SwapQuote>, AppError> {
    let network: Network = match query.network.as_deref() {
        Some(raw) => raw.parse()?,
        None => Network::default(),
    };
    if same_token(&query.from_token, &query.to_token, network) {
        return Err(AppError::validation_failed("fromToken and toToken must differ"));
    }

    let quote = state
        .quotes
        .get_quote(&query.from_token, &query.to_token, &query.amount, network)
        .await?;
    Ok(Json(quote))
}

/// POST /api/swap
#[utoipa::path(
    post,
    path = "/api/swap",
    request_body = SwapRequest,
    responses(
        (status = 200, body = Receipt),
        (status = 400, description = "Invalid input or stale quote"),
        (status = 500, description = "Swap failed"),
        (status = 502, description = "RPC failure")
    ),
    tag = "swap"
)]
pub async fn execute_swap(
    State(state): State<Arc<AppState>>,
    auth: Option<JwtAuthContext>,
    ApiJson(req): ApiJson<SwapRequest>,
) -> Result<Json<Receipt>, AppError> {
    AddressValidator::validate_evm_address("userAddress", &req.user_address)?;
    validate_slippage(req.slippage, &state.config.simulation)?;

    let quote = match req.quote_id.as_deref() {
        Some(quote_id) => Some(state.quotes.ensure_fresh(quote_id).map_err(|e| {
            if matches!(e, QuoteError::Expired(_)) {
                metrics::inc_quote_expired_rejected();
            }
            tracing::warn!(quote_id = %quote_id, error = %e, "Rejected swap with stale quote");
            AppError::from(e)
        })?),
        None => None,
    };

    // 绑定报价时按报价所在网络比较符号
    let identical = match &quote {
        Some(q) => same_token(&req.token_in, &req.token_out, q.network),
        None => same_token_any_network(&req.token_in, &req.token_out),
    };
    if identical {
        return Err(AppError::validation_failed("tokenIn and tokenOut must differ"));
    }
    if let Some(quote) = &quote {
        check_quote_matches(quote, &req.token_in, &req.token_out)?;
    }

    // 未指定时沿用报价的固定滑点
    let slippage = req
        .slippage
        .unwrap_or(state.config.simulation.quote_slippage * 100.0);
    let receipt = state
        .evm
        .swap(&req.token_in, &req.token_out, &req.amount_in, slippage)
        .await?;

    tracing::info!(
        tx_hash = %receipt.hash,
        user = %req.user_address,
        user_id = ?auth.as_ref().map(|a| &a.user_id),
        token_in = %req.token_in,
        token_out = %req.token_out,
        "Swap executed"
    );

    record_transaction(
        &state,
        TransactionRecord {
            id: Uuid::new_v4(),
            tx_hash: receipt.hash.clone(),
            kind: TxKind::Swap.as_str().to_string(),
            wallet_address: req.user_address.trim().to_string(),
            from_token: Some(req.token_in),
            to_token: Some(req.token_out),
            recipient: None,
            amount: req.amount_in,
            status: receipt_status(&receipt).to_string(),
            gas_used: Some(receipt.gas_used.clone()),
            block_number: Some(receipt.block_number as i64),
            created_at: Utc::now(),
        },
    )
    .await;

    Ok(Json(receipt))
}

/// POST /api/transfer
#[utoipa::path(
    post,
    path = "/api/transfer",
    request_body = TransferRequest,
    responses(
        (status = 200, body = Receipt),
        (status = 400, description = "Invalid address or amount"),
        (status = 500, description = "Transfer failed"),
        (status = 502, description = "RPC failure")
    ),
    tag = "swap"
)]
pub async fn execute_transfer(
    State(state): State<Arc<AppState>>,
    auth: Option<JwtAuthContext>,
    ApiJson(req): ApiJson<TransferRequest>,
) -> Result<Json<Receipt>, AppError> {
    AddressValidator::validate_evm_address("userAddress", &req.user_address)?;

    let receipt = state
        .evm
        .transfer(&req.token_address, &req.recipient, &req.amount)
        .await?;

    tracing::info!(
        tx_hash = %receipt.hash,
        user = %req.user_address,
        user_id = ?auth.as_ref().map(|a| &a.user_id),
        recipient = %req.recipient,
        "Transfer executed"
    );

    record_transaction(
        &state,
        TransactionRecord {
            id: Uuid::new_v4(),
            tx_hash: receipt.hash.clone(),
            kind: TxKind::Transfer.as_str().to_string(),
            wallet_address: req.user_address.trim().to_string(),
            from_token: Some(req.token_address),
            to_token: None,
            recipient: Some(req.recipient.trim().to_string()),
            amount: req.amount,
            status: receipt_status(&receipt).to_string(),
            gas_used: Some(receipt.gas_used.clone()),
            block_number: Some(receipt.block_number as i64),
            created_at: Utc::now(),
        },
    )
    .await;

    Ok(Json(receipt))
}

fn receipt_status(receipt: &Receipt) -> &'static str {
    if receipt.status == 1 {
        "completed"
    } else {
        "failed"
    }
}
