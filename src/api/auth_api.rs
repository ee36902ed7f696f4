//! 认证 API - 注册、登录、校验令牌
//!
//! 凭证校验交给 AuthProvider（内存或外部 HTTP），令牌由本服务用 JwtKeys 签发

use std::sync::Arc;

use axum::{extract::State, http::HeaderMap, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    api::{
        middleware::jwt_extractor::{bearer_token, JwtAuthContext},
        response::ApiJson,
    },
    app_state::AppState,
    domain::errors::AuthError,
    error::AppError,
    infrastructure::password::Password,
    service::auth_provider::AuthUser,
};

#[derive(Deserialize, ToSchema)]
pub struct CredentialsRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub user: AuthUser,
    pub token: String,
}

/// 令牌中携带的用户信息
#[derive(Debug, Serialize, ToSchema)]
pub struct TokenUser {
    pub id: String,
    pub email: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VerifyResponse {
    pub valid: bool,
    pub user: TokenUser,
}

fn issue(state: &AppState, user: AuthUser) -> Result<Json<AuthResponse>, AppError> {
    let token = state.jwt.generate_token(&user.id, &user.email).map_err(|e| {
        tracing::error!(user_id = %user.id, error = %e, "Failed to sign token");
        AppError::internal("Failed to issue token")
    })?;
    Ok(Json(AuthResponse { user, token }))
}

/// POST /api/auth/signup
#[utoipa::path(
    post,
    path = "/api/auth/signup",
    request_body = CredentialsRequest,
    responses(
        (status = 200, body = AuthResponse),
        (status = 400, description = "Invalid email or password"),
        (status = 409, description = "Email already registered")
    ),
    tag = "auth"
)]
pub async fn signup(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<CredentialsRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let password = Password::new(req.password);
    let user = state.auth.sign_up(&req.email, &password).await?;
    tracing::info!(user_id = %user.id, provider = state.auth.name(), "User signed up");
    issue(&state, user)
}

/// POST /api/auth/login
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = CredentialsRequest,
    responses(
        (status = 200, body = AuthResponse),
        (status = 401, description = "Invalid email or password")
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<CredentialsRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let password = Password::new(req.password);
    let user = state.auth.sign_in(&req.email, &password).await?;
    tracing::info!(user_id = %user.id, "User logged in");
    issue(&state, user)
}

/// GET /api/auth/verify
#[utoipa::path(
    get,
    path = "/api/auth/verify",
    responses(
        (status = 200, body = VerifyResponse),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearer_auth" = [])),
    tag = "auth"
)]
pub async fn verify(
    State(state): State<Arc<AppState>>,
    auth: Option<JwtAuthContext>,
    headers: HeaderMap,
) -> Result<Json<VerifyResponse>, AppError> {
    // 中间件已验证通过的令牌直接使用上下文
    let context = match auth {
        Some(context) => context,
        None => {
            let token = bearer_token(&headers)
                .ok_or_else(|| AppError::unauthorized("Missing bearer token"))?;
            state
                .jwt
                .verify_token(token)
                .map(JwtAuthContext::from)
                .map_err(|e| AuthError::InvalidToken(e.to_string()))?
        }
    };

    Ok(Json(VerifyResponse {
        valid: true,
        user: TokenUser {
            id: context.user_id,
            email: context.email,
        },
    }))
}
