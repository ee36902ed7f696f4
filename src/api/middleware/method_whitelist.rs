//! HTTP Method Whitelist Middleware
//!
//! 阻止 TRACE、CONNECT 等 API 不需要的方法，返回 405

use axum::{
    extract::Request,
    http::{Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

const ALLOWED_METHODS: [Method; 6] = [
    Method::GET,
    Method::HEAD,
    Method::POST,
    Method::PUT,
    Method::DELETE,
    Method::OPTIONS,
];

/// HTTP方法白名单中间件，应最先应用
pub async fn method_whitelist_middleware(req: Request, next: Next) -> Response {
    if ALLOWED_METHODS.contains(req.method()) {
        return next.run(req).await;
    }

    warn!(method = %req.method(), path = %req.uri().path(), "Blocked HTTP method");
    StatusCode::METHOD_NOT_ALLOWED.into_response()
}

#[cfg(test)]
mod tests {
    use axum::{body::Body, middleware::from_fn, routing::get, Router};
    use tower::ServiceExt as _; // for oneshot()

    use super::*;

    fn app() -> Router {
        Router::new()
            .route("/api/market", get(|| async { "OK" }))
            .layer(from_fn(method_whitelist_middleware))
    }

    #[tokio::test]
    async fn test_get_passes() {
        let req = axum::http::Request::builder()
            .uri("/api/market")
            .body(Body::empty())
            .unwrap();
        let resp = app().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_trace_and_connect_blocked() {
        for method in ["TRACE", "CONNECT"] {
            let req = axum::http::Request::builder()
                .method(method)
                .uri("/api/market")
                .body(Body::empty())
                .unwrap();
            let resp = app().oneshot(req).await.unwrap();
            assert_eq!(
                resp.status(),
                StatusCode::METHOD_NOT_ALLOWED,
                "{} should be blocked",
                method
            );
        }
    }
}
