//! 运维端点：健康检查、Prometheus 指标、OpenAPI 文档

use std::sync::Arc;

use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use utoipa::{OpenApi, ToSchema};

use crate::app_state::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

/// GET /health, /api/health
#[utoipa::path(
    get,
    path = "/api/health",
    responses((status = 200, description = "OK", body = HealthResponse)),
    tag = "ops"
)]
pub async fn api_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let status = if state.shutdown.is_triggered() {
        "shutting_down"
    } else {
        "ok"
    };
    Json(HealthResponse {
        status: status.into(),
        version: format!(
            "{}+{}",
            env!("CARGO_PKG_VERSION"),
            option_env!("GIT_HASH").unwrap_or("dev")
        ),
        uptime_secs: state.uptime_secs(),
    })
}

/// GET /metrics
pub async fn metrics() -> Response {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        crate::metrics::render_prometheus(),
    )
        .into_response()
}

/// GET /openapi.json
pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(super::ApiDoc::openapi())
}
