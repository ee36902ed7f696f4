//! 钱包 API
//!
//! 连接 / 断开 / 切换网络 / 签名走 ConnectionManager，余额展示走 MarketData，
//! `/api/wallet/send` 直接提交模拟转账

use std::sync::Arc;

use axum::{extract::State, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::{
    api::response::{ApiJson, ApiPath, ApiQuery},
    app_state::AppState,
    domain::{
        errors::ValidationError, ConnectionStatus, Network, TxKind, WalletSession, WalletType,
    },
    error::AppError,
    repository::TransactionRecord,
    service::{
        connection_manager::ConnectRequest,
        market_data::{AddressBalances, WalletOverview},
        transaction_simulator::SubmitParams,
    },
    utils::address_validator::AddressValidator,
};

fn parse_network(raw: Option<&str>) -> Result<Network, ValidationError> {
    raw.map(str::parse).transpose().map(Option::unwrap_or_default)
}

fn required<'a>(field: &str, value: &'a str) -> Result<&'a str, ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::new(format!("{} is required", field)));
    }
    Ok(value)
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConnectWalletRequest {
    pub wallet_type: String,
    /// 默认 testnet
    pub network: Option<String>,
    pub provider: String,
    pub timeout_ms: Option<u64>,
    /// 不传时创建新会话
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConnectWalletResponse {
    pub success: bool,
    pub session_id: String,
    pub address: Option<String>,
    pub network: Network,
    pub balance: Option<String>,
    pub wallet_type: WalletType,
    pub provider: String,
    pub status: ConnectionStatus,
}

impl From<WalletSession> for ConnectWalletResponse {
    fn from(session: WalletSession) -> Self {
        Self {
            success: session.is_connected(),
            session_id: session.session_id,
            address: session.address,
            network: session.network,
            balance: session.balance,
            wallet_type: session.wallet_type,
            provider: session.provider,
            status: session.status,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionRequest {
    pub session_id: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SwitchNetworkRequest {
    pub session_id: String,
    pub network: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SwitchNetworkResponse {
    pub success: bool,
    pub network: Network,
    pub balance: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignMessageRequest {
    pub session_id: String,
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SignMessageResponse {
    pub signature: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SendRequest {
    pub from: String,
    pub to: String,
    pub amount: String,
    pub token: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SendResponse {
    pub hash: String,
    pub status: String,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct BalanceQuery {
    pub wallet: String,
}

/// GET /api/wallet - 演示钱包余额
#[utoipa::path(
    get,
    path = "/api/wallet",
    responses((status = 200, body = WalletOverview)),
    tag = "wallet"
)]
pub async fn wallet_overview(State(state): State<Arc<AppState>>) -> Json<WalletOverview> {
    Json(state.market.wallet())
}

/// GET /api/wallet/balance?wallet=
#[utoipa::path(
    get,
    path = "/api/wallet/balance",
    params(BalanceQuery),
    responses(
        (status = 200, body = AddressBalances),
        (status = 400, description = "Invalid wallet address")
    ),
    tag = "wallet"
)]
pub async fn wallet_balance(
    State(state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<BalanceQuery>,
) -> Result<Json<AddressBalances>, AppError> {
    Ok(Json(state.market.balances_for(&query.wallet)?))
}

/// POST /api/wallet/connect
#[utoipa::path(
    post,
    path = "/api/wallet/connect",
    request_body = ConnectWalletRequest,
    responses(
        (status = 200, body = ConnectWalletResponse),
        (status = 400, description = "Invalid wallet type or network"),
        (status = 500, description = "Simulated connection failure")
    ),
    tag = "wallet"
)]
pub async fn connect_wallet(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<ConnectWalletRequest>,
) -> Result<Json<ConnectWalletResponse>, AppError> {
    let wallet_type: WalletType = req.wallet_type.parse()?;
    let network = parse_network(req.network.as_deref())?;
    let provider = required("provider", &req.provider)?.to_string();

    let session = state
        .connections
        .connect(ConnectRequest {
            session_id: req.session_id,
            wallet_type,
            network,
            provider,
            timeout_ms: req.timeout_ms,
        })
        .await?;

    Ok(Json(session.into()))
}

/// POST /api/wallet/disconnect
#[utoipa::path(
    post,
    path = "/api/wallet/disconnect",
    request_body = SessionRequest,
    responses((status = 200, body = SuccessResponse)),
    tag = "wallet"
)]
pub async fn disconnect_wallet(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<SessionRequest>,
) -> Result<Json<SuccessResponse>, AppError> {
    let session_id = required("sessionId", &req.session_id)?;
    state.connections.disconnect(session_id).await;
    Ok(Json(SuccessResponse { success: true }))
}

/// POST /api/wallet/switch-network
#[utoipa::path(
    post,
    path = "/api/wallet/switch-network",
    request_body = SwitchNetworkRequest,
    responses(
        (status = 200, body = SwitchNetworkResponse),
        (status = 404, description = "Wallet not connected"),
        (status = 500, description = "Simulated switch failure")
    ),
    tag = "wallet"
)]
pub async fn switch_network(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<SwitchNetworkRequest>,
) -> Result<Json<SwitchNetworkResponse>, AppError> {
    let session_id = required("sessionId", &req.session_id)?;
    let network: Network = req.network.parse()?;

    let session = state.connections.switch_network(session_id, network).await?;
    Ok(Json(SwitchNetworkResponse {
        success: true,
        network: session.network,
        balance: session.balance,
    }))
}

/// POST /api/wallet/sign
#[utoipa::path(
    post,
    path = "/api/wallet/sign",
    request_body = SignMessageRequest,
    responses(
        (status = 200, body = SignMessageResponse),
        (status = 403, description = "User rejected the signature"),
        (status = 404, description = "Wallet not connected")
    ),
    tag = "wallet"
)]
pub async fn sign_message(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<SignMessageRequest>,
) -> Result<Json<SignMessageResponse>, AppError> {
    let session_id = required("sessionId", &req.session_id)?;
    let signature = state
        .connections
        .sign_message(session_id, &req.message)
        .await?;
    Ok(Json(SignMessageResponse { signature }))
}

/// GET /api/wallet/session/:id
#[utoipa::path(
    get,
    path = "/api/wallet/session/{id}",
    params(("id" = String, Path, description = "Session id")),
    responses(
        (status = 200, body = WalletSession),
        (status = 404, description = "Unknown session")
    ),
    tag = "wallet"
)]
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    ApiPath(session_id): ApiPath<String>,
) -> Result<Json<WalletSession>, AppError> {
    state
        .connections
        .get_session(&session_id)
        .map(Json)
        .ok_or_else(|| AppError::not_found(format!("Session {} not found", session_id)))
}

/// POST /api/wallet/send - 模拟转账
#[utoipa::path(
    post,
    path = "/api/wallet/send",
    request_body = SendRequest,
    responses(
        (status = 200, body = SendResponse),
        (status = 400, description = "Invalid address or amount"),
        (status = 500, description = "Simulated transaction failure")
    ),
    tag = "wallet"
)]
pub async fn send_transaction(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<SendRequest>,
) -> Result<Json<SendResponse>, AppError> {
    AddressValidator::validate_evm_address("from", &req.from)?;
    AddressValidator::validate_evm_address("to", &req.to)?;

    let params = SubmitParams {
        from: Some(req.from.trim().to_string()),
        to: Some(req.to.trim().to_string()),
        token: req.token.clone(),
        amount: req.amount.clone(),
    };
    let hash = state.simulator.submit(TxKind::Transfer, &params).await?;
    let status = state
        .simulator
        .get(&hash)
        .map(|tx| tx.status.as_str().to_string())
        .unwrap_or_else(|| "submitted".to_string());

    record_transaction(
        &state,
        TransactionRecord {
            id: Uuid::new_v4(),
            tx_hash: hash.clone(),
            kind: TxKind::Transfer.as_str().to_string(),
            wallet_address: req.from.trim().to_string(),
            from_token: req.token,
            to_token: None,
            recipient: Some(req.to.trim().to_string()),
            amount: req.amount,
            status: status.clone(),
            gas_used: None,
            block_number: None,
            created_at: Utc::now(),
        },
    )
    .await;

    Ok(Json(SendResponse { hash, status }))
}

/// 写入交易记录；失败只记录日志，不影响请求结果
pub(crate) async fn record_transaction(state: &AppState, record: TransactionRecord) {
    let hash = record.tx_hash.clone();
    if let Err(e) = state.store.insert(record).await {
        crate::metrics::inc_store_insert_fail();
        tracing::error!(tx_hash = %hash, store = state.store.name(), error = %e, "Failed to record transaction");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_network_defaults_to_testnet() {
        assert_eq!(parse_network(None).unwrap(), Network::Testnet);
        assert_eq!(parse_network(Some("mainnet")).unwrap(), Network::Mainnet);
        assert!(parse_network(Some("moon")).is_err());
    }

    #[test]
    fn test_required_field() {
        assert_eq!(required("provider", " metamask ").unwrap(), "metamask");
        assert!(required("provider", "  ").is_err());
    }
}
