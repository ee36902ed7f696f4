//! 测试辅助模块
//! 进程内协作方 + 确定性模拟运行时，通过 oneshot 驱动完整路由

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use swapdesk::{
    api,
    app_state::AppState,
    config::{Config, SimulationConfig},
    infrastructure::shutdown::ShutdownSignal,
    service::{auth_provider::InMemoryAuthProvider, sim_runtime::DeterministicRuntime},
};
use tower::ServiceExt as _;

pub const WALLET: &str = "0x52908400098527886e0f7030069857d2e4169ee7";
pub const RECIPIENT: &str = "0x8617e340b3d01fa5f11f306f4090fd50e238070d";

/// 测试配置：模拟无延迟、无随机失败，不连接外部服务
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.simulation = SimulationConfig::instant();
    config.jwt.secret = "test_secret_that_is_at_least_32_characters_long_for_jwt".into();
    config.jwt.token_expiry_secs = 3600;
    config.server.static_root = None;
    config.server.cors_allow_origins = Vec::new();
    config.blockchain.rpc_url = None;
    config.auth_provider.url = None;
    config.database.url = None;
    config
}

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub runtime: Arc<DeterministicRuntime>,
}

pub fn test_app() -> TestApp {
    test_app_with(test_config())
}

pub fn test_app_with(config: Config) -> TestApp {
    let runtime = Arc::new(DeterministicRuntime::new(7));
    // bcrypt 最低成本，保持测试速度
    let state = Arc::new(
        AppState::new(Arc::new(config), runtime.clone(), ShutdownSignal::never())
            .with_auth_provider(Arc::new(InMemoryAuthProvider::new(4))),
    );
    TestApp {
        router: api::routes(state.clone()),
        state,
        runtime,
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
    pub text: String,
}

impl TestApp {
    pub async fn request(&self, req: Request<Body>) -> TestResponse {
        let resp = self.router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let headers = resp.headers().clone();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8_lossy(&bytes).to_string();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        TestResponse {
            status,
            headers,
            body,
            text,
        }
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        self.request(
            Request::builder()
                .method(Method::GET)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    pub async fn get_with_token(&self, uri: &str, token: &str) -> TestResponse {
        self.request(
            Request::builder()
                .method(Method::GET)
                .uri(uri)
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    pub async fn post(&self, uri: &str, body: Value) -> TestResponse {
        self.request(
            Request::builder()
                .method(Method::POST)
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    /// 连接钱包并返回 sessionId
    pub async fn connect(&self, network: &str) -> String {
        let resp = self
            .post(
                "/api/wallet/connect",
                serde_json::json!({
                    "walletType": "hot",
                    "network": network,
                    "provider": "metamask"
                }),
            )
            .await;
        assert_eq!(resp.status, StatusCode::OK, "{}", resp.text);
        resp.body["sessionId"].as_str().unwrap().to_string()
    }
}
