//! 认证 API 集成测试

mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::test_app;

#[tokio::test]
async fn test_signup_login_verify_flow() {
    let app = test_app();

    let signup = app
        .post(
            "/api/auth/signup",
            json!({"email": "Alice@Example.com", "password": "secret123"}),
        )
        .await;
    assert_eq!(signup.status, StatusCode::OK, "{}", signup.text);
    assert_eq!(signup.body["user"]["email"], "alice@example.com");
    assert!(signup.body["token"].is_string());

    let login = app
        .post(
            "/api/auth/login",
            json!({"email": "alice@example.com", "password": "secret123"}),
        )
        .await;
    assert_eq!(login.status, StatusCode::OK, "{}", login.text);
    assert_eq!(login.body["user"]["id"], signup.body["user"]["id"]);
    let token = login.body["token"].as_str().unwrap();

    let verify = app.get_with_token("/api/auth/verify", token).await;
    assert_eq!(verify.status, StatusCode::OK, "{}", verify.text);
    assert_eq!(verify.body["valid"], true);
    assert_eq!(verify.body["user"]["email"], "alice@example.com");
    assert_eq!(verify.body["user"]["id"], signup.body["user"]["id"]);
}

#[tokio::test]
async fn test_duplicate_signup_conflicts() {
    let app = test_app();
    let creds = json!({"email": "bob@example.com", "password": "secret123"});
    assert_eq!(app.post("/api/auth/signup", creds.clone()).await.status, StatusCode::OK);

    let resp = app.post("/api/auth/signup", creds).await;
    assert_eq!(resp.status, StatusCode::CONFLICT);
    assert_eq!(resp.body["code"], "user_already_exists");
}

#[tokio::test]
async fn test_login_with_wrong_password() {
    let app = test_app();
    app.post(
        "/api/auth/signup",
        json!({"email": "carol@example.com", "password": "secret123"}),
    )
    .await;

    let resp = app
        .post(
            "/api/auth/login",
            json!({"email": "carol@example.com", "password": "wrong-password"}),
        )
        .await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
    assert_eq!(resp.body["code"], "invalid_credentials");

    let resp = app
        .post(
            "/api/auth/login",
            json!({"email": "nobody@example.com", "password": "secret123"}),
        )
        .await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_signup_validation() {
    let app = test_app();
    let resp = app
        .post(
            "/api/auth/signup",
            json!({"email": "not-an-email", "password": "secret123"}),
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);

    let resp = app
        .post(
            "/api/auth/signup",
            json!({"email": "dave@example.com", "password": "123"}),
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);

    let resp = app
        .post("/api/auth/signup", json!({"email": "dave@example.com"}))
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_verify_rejects_missing_or_invalid_token() {
    let app = test_app();

    let resp = app.get("/api/auth/verify").await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
    assert_eq!(resp.body["code"], "unauthorized");

    let resp = app.get_with_token("/api/auth/verify", "garbage.token.here").await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
    assert_eq!(resp.body["code"], "token_invalid");
}

#[tokio::test]
async fn test_invalid_token_does_not_block_public_routes() {
    let app = test_app();
    let resp = app.get_with_token("/api/market", "garbage").await;
    assert_eq!(resp.status, StatusCode::OK);
}
