//! JWT 可选提取中间件
//!
//! 带有效 Bearer Token 的请求会注入认证上下文；没有或无效的 Token 不会拒绝请求，
//! 需要认证的接口自行通过 `JwtAuthContext` 提取器返回 401

use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap, Method},
    middleware::Next,
    response::Response,
};

use crate::{app_state::AppState, error::AppError, infrastructure::jwt::Claims};

/// JWT 认证上下文
#[derive(Debug, Clone)]
pub struct JwtAuthContext {
    pub user_id: String,
    pub email: String,
}

impl From<Claims> for JwtAuthContext {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            email: claims.email,
        }
    }
}

/// 提取 `Authorization: Bearer <token>` 中的 token
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

pub async fn jwt_extractor_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    // OPTIONS 请求直接放行
    if req.method() == Method::OPTIONS {
        return next.run(req).await;
    }

    let context = bearer_token(req.headers()).and_then(|token| {
        state
            .jwt
            .verify_token(token)
            .map_err(|e| {
                tracing::debug!(path = %req.uri().path(), error = %e, "Ignoring invalid bearer token");
            })
            .ok()
    });

    if let Some(claims) = context {
        tracing::debug!(user_id = %claims.sub, "JWT middleware: authenticated request");
        req.extensions_mut().insert(JwtAuthContext::from(claims));
    }

    next.run(req).await
}

/// Axum Extractor: 从 request extensions 中提取 JWT 认证上下文
#[async_trait]
impl<S> FromRequestParts<S> for JwtAuthContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<JwtAuthContext>()
            .cloned()
            .ok_or_else(|| AppError::unauthorized("Missing or invalid bearer token"))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer  tok.en "));
        assert_eq!(bearer_token(&headers), Some("tok.en"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }
}
