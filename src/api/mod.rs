use std::{sync::Arc, time::Instant};

use axum::{
    extract::{MatchedPath, Request},
    http::{HeaderName, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    response::Response,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    services::ServeDir,
};
use tracing::Level;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use uuid::Uuid;

use crate::{
    api::middleware::{jwt_extractor_middleware, method_whitelist_middleware, trace_id_middleware},
    app_state::AppState,
    config::ServerConfig,
};

pub mod auth_api;
pub mod handlers;
pub mod history_api;
pub mod market_api;
pub mod middleware;
pub mod response;
pub mod swap_api;
pub mod wallet_api;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::api_health,
        market_api::get_stats,
        market_api::get_market,
        wallet_api::wallet_overview,
        wallet_api::wallet_balance,
        wallet_api::connect_wallet,
        wallet_api::disconnect_wallet,
        wallet_api::switch_network,
        wallet_api::sign_message,
        wallet_api::get_session,
        wallet_api::send_transaction,
        swap_api::get_quote,
        swap_api::execute_swap,
        swap_api::execute_transfer,
        history_api::get_history,
        history_api::get_transaction_status,
        auth_api::signup,
        auth_api::login,
        auth_api::verify,
    ),
    components(
        schemas(
            handlers::HealthResponse,
            crate::service::market_data::ExchangeStats,
            crate::service::market_data::MarketTicker,
            crate::service::market_data::MarketOverview,
            crate::service::market_data::TokenBalance,
            crate::service::market_data::WalletOverview,
            crate::service::market_data::AddressBalances,
            wallet_api::ConnectWalletRequest,
            wallet_api::ConnectWalletResponse,
            wallet_api::SessionRequest,
            wallet_api::SuccessResponse,
            wallet_api::SwitchNetworkRequest,
            wallet_api::SwitchNetworkResponse,
            wallet_api::SignMessageRequest,
            wallet_api::SignMessageResponse,
            wallet_api::SendRequest,
            wallet_api::SendResponse,
            swap_api::SwapRequest,
            swap_api::TransferRequest,
            history_api::HistoryResponse,
            auth_api::CredentialsRequest,
            auth_api::AuthResponse,
            auth_api::TokenUser,
            auth_api::VerifyResponse,
            crate::service::auth_provider::AuthUser,
            crate::service::evm_client::Receipt,
            crate::repository::TransactionRecord,
            crate::domain::SwapQuote,
            crate::domain::SimulatedTransaction,
            crate::domain::TransactionStatus,
            crate::domain::TxKind,
            crate::domain::WalletSession,
            crate::domain::WalletType,
            crate::domain::Network,
            crate::domain::ConnectionStatus,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "SwapDesk API", description = "Auto-generated OpenAPI via utoipa")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

pub fn routes(state: Arc<AppState>) -> Router {
    let api = Router::new()
        // 运维
        .route("/health", get(handlers::api_health))
        .route("/api/health", get(handlers::api_health))
        .route("/metrics", get(handlers::metrics))
        .route("/openapi.json", get(handlers::openapi_json))
        // 行情
        .route("/api/stats", get(market_api::get_stats))
        .route("/api/market", get(market_api::get_market))
        // 钱包
        .route("/api/wallet", get(wallet_api::wallet_overview))
        .route("/api/wallet/balance", get(wallet_api::wallet_balance))
        .route("/api/wallet/connect", post(wallet_api::connect_wallet))
        .route("/api/wallet/disconnect", post(wallet_api::disconnect_wallet))
        .route("/api/wallet/switch-network", post(wallet_api::switch_network))
        .route("/api/wallet/sign", post(wallet_api::sign_message))
        .route("/api/wallet/session/:id", get(wallet_api::get_session))
        .route("/api/wallet/send", post(wallet_api::send_transaction))
        // 兑换 / 转账
        .route("/api/swap/quote", get(swap_api::get_quote))
        .route("/api/swap", post(swap_api::execute_swap))
        .route("/api/transfer", post(swap_api::execute_transfer))
        // 历史
        .route("/api/history", get(history_api::get_history))
        .route("/api/transactions", get(history_api::get_history))
        .route(
            "/api/transactions/:hash/status",
            get(history_api::get_transaction_status),
        )
        // 认证
        .route("/api/auth/signup", post(auth_api::signup))
        .route("/api/auth/login", post(auth_api::login))
        .route("/api/auth/verify", get(auth_api::verify));

    // 非 API 路径回落到静态资源目录
    let api = match state.config.server.static_root.as_deref() {
        Some(root) => api.fallback_service(ServeDir::new(root)),
        None => api,
    };

    api.layer(from_fn(record_metrics))
        .layer(from_fn_with_state(state.clone(), jwt_extractor_middleware))
        .layer(
            ServiceBuilder::new()
                .layer(from_fn(method_whitelist_middleware)) // 最先应用
                .layer(from_fn(set_request_id)) // trace_log 需要读取 x-request-id
                .layer(from_fn(trace_id_middleware))
                .layer(cors_layer(&state.config.server))
                .layer(from_fn(add_response_time_header))
                .layer(from_fn(trace_log)),
        )
        .with_state(state)
}

fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_allow_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any)
        .expose_headers([
            HeaderName::from_static("x-request-id"),
            HeaderName::from_static("x-trace-id"),
            HeaderName::from_static("x-response-time"),
        ]);

    if origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(AllowOrigin::list(origins))
    }
}

/// 按匹配路由统计请求数与错误数
async fn record_metrics(req: Request, next: axum::middleware::Next) -> Response {
    let endpoint = format!(
        "{} {}",
        req.method(),
        req.extensions()
            .get::<MatchedPath>()
            .map(MatchedPath::as_str)
            .unwrap_or("unmatched")
    );
    let resp = next.run(req).await;
    let status = resp.status();
    if status.is_client_error() || status.is_server_error() {
        crate::metrics::count_err(&endpoint);
    } else {
        crate::metrics::count_ok(&endpoint);
    }
    resp
}

async fn set_request_id(mut req: Request, next: axum::middleware::Next) -> Response {
    let req_id = req
        .headers()
        .get("x-request-id")
        .and_then(|h| h.to_str().ok())
        .filter(|id| !id.is_empty() && id.len() <= 128)
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let header = HeaderValue::from_str(&req_id).unwrap_or(HeaderValue::from_static("gen-failed"));

    req.headers_mut().insert("x-request-id", header.clone());
    let mut resp = next.run(req).await;
    resp.headers_mut().insert("x-request-id", header);
    resp
}

async fn add_response_time_header(req: Request, next: axum::middleware::Next) -> Response {
    let start = Instant::now();
    let mut resp = next.run(req).await;
    let elapsed_ms = start.elapsed().as_millis().to_string();
    resp.headers_mut().insert(
        "x-response-time",
        HeaderValue::from_str(&format!("{}ms", elapsed_ms))
            .unwrap_or(HeaderValue::from_static("0ms")),
    );
    resp
}

async fn trace_log(req: Request, next: axum::middleware::Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let start = Instant::now();
    let req_id = req
        .headers()
        .get("x-request-id")
        .and_then(|h| h.to_str().ok())
        .unwrap_or("-")
        .to_string();
    let resp = next.run(req).await;
    let status = resp.status();
    let elapsed = start.elapsed().as_millis();
    tracing::event!(Level::INFO, request_id=%req_id, method=%method, path=%path, status=%status.as_u16(), elapsed_ms=%elapsed, "http_request");
    resp
}
