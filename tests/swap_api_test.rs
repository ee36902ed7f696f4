//! 报价、兑换、转账与交易状态集成测试

mod common;

use std::time::Duration;

use axum::http::StatusCode;
use serde_json::json;

use common::{test_app, test_app_with, test_config, RECIPIENT, WALLET};

#[tokio::test]
async fn test_quote_figures_for_known_pair() {
    let app = test_app();
    let resp = app
        .get("/api/swap/quote?fromToken=ETH&toToken=USDT&amount=1&network=mainnet")
        .await;

    assert_eq!(resp.status, StatusCode::OK, "{}", resp.text);
    assert_eq!(resp.body["fromAmount"], "1.000000");
    assert_eq!(resp.body["toAmount"], "3950.000000");
    assert_eq!(resp.body["fee"], "0.003000");
    assert_eq!(resp.body["minReceived"], "3930.250000");
    assert_eq!(resp.body["slippage"], "0.5%");
    assert_eq!(resp.body["network"], "mainnet");
    assert_eq!(resp.body["rateIsFallback"], false);
    assert!(resp.body["quoteId"].is_string());
}

#[tokio::test]
async fn test_quote_testnet_symbols_and_default_network() {
    let app = test_app();
    let resp = app
        .get("/api/swap/quote?fromToken=tETH&toToken=tUSDT&amount=2")
        .await;
    assert_eq!(resp.status, StatusCode::OK, "{}", resp.text);
    assert_eq!(resp.body["network"], "testnet");
    assert_eq!(resp.body["rateIsFallback"], false);
}

#[tokio::test]
async fn test_quote_unknown_pair_uses_fallback_rate() {
    let app = test_app();
    let resp = app
        .get("/api/swap/quote?fromToken=FOO&toToken=BAR&amount=1&network=mainnet")
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body["rateIsFallback"], true);
}

#[tokio::test]
async fn test_quote_rejects_bad_input() {
    let app = test_app();
    for uri in [
        "/api/swap/quote?fromToken=ETH&toToken=ETH&amount=1",
        "/api/swap/quote?fromToken=ETH&toToken=USDT&amount=0",
        "/api/swap/quote?fromToken=ETH&toToken=USDT&amount=abc",
        "/api/swap/quote?fromToken=ETH&toToken=USDT&amount=1&network=moon",
        "/api/swap/quote?fromToken=ETH&amount=1",
    ] {
        let resp = app.get(uri).await;
        assert_eq!(resp.status, StatusCode::BAD_REQUEST, "{}", uri);
        assert!(resp.body["error"].is_string());
    }
}

#[tokio::test]
async fn test_quote_with_huge_amount_is_rejected() {
    let app = test_app();
    let resp = app
        .get("/api/swap/quote?fromToken=ETH&toToken=USDT&amount=1e26&network=mainnet")
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST, "{}", resp.text);
    assert!(resp.body["error"].as_str().unwrap().contains("too large"));

    // 服务仍可继续处理请求
    let ok = app
        .get("/api/swap/quote?fromToken=ETH&toToken=USDT&amount=1&network=mainnet")
        .await;
    assert_eq!(ok.status, StatusCode::OK);
}

#[tokio::test]
async fn test_quote_failure_is_server_error() {
    let mut config = test_config();
    config.simulation.quote_failure_rate = 1.0;
    let app = test_app_with(config);

    let resp = app
        .get("/api/swap/quote?fromToken=ETH&toToken=USDT&amount=1")
        .await;
    assert_eq!(resp.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(resp.body["error"], "Failed to get swap quote");
    assert_eq!(resp.body["code"], "quote_failed");
}

#[tokio::test]
async fn test_swap_executes_and_records_history() {
    let app = test_app();
    let resp = app
        .post(
            "/api/swap",
            json!({
                "tokenIn": "ETH",
                "tokenOut": "USDT",
                "amountIn": "1.5",
                "userAddress": WALLET,
                "slippage": 1.0
            }),
        )
        .await;

    assert_eq!(resp.status, StatusCode::OK, "{}", resp.text);
    assert_eq!(resp.body["status"], 1);
    assert!(resp.body["gasUsed"].is_string());
    assert!(resp.body["blockNumber"].is_u64());
    let hash = resp.body["hash"].as_str().unwrap().to_string();

    let history = app
        .get(&format!("/api/transactions?wallet={}&kind=swap", WALLET))
        .await;
    assert_eq!(history.status, StatusCode::OK);
    assert_eq!(history.body["total"], 1);
    let record = &history.body["transactions"][0];
    assert_eq!(record["txHash"], hash);
    assert_eq!(record["fromToken"], "ETH");
    assert_eq!(record["toToken"], "USDT");
    assert_eq!(record["status"], "completed");
}

#[tokio::test]
async fn test_swap_status_poll_agrees_with_receipt() {
    let app = test_app();
    let resp = app
        .post(
            "/api/swap",
            json!({"tokenIn": "ETH", "tokenOut": "USDT", "amountIn": "1", "userAddress": WALLET}),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK, "{}", resp.text);
    assert_eq!(resp.body["status"], 1);
    let hash = resp.body["hash"].as_str().unwrap().to_string();

    // 0.95 会抽中 failed，但回执已确定为成功
    app.runtime.push_rolls(&[0.95, 0.95]);
    for _ in 0..2 {
        let status = app
            .get(&format!("/api/transactions/{}/status", hash))
            .await;
        assert_eq!(status.status, StatusCode::OK);
        assert_eq!(status.body["status"], "completed");
        assert_eq!(status.body["kind"], "swap");
    }

    let history = app.get("/api/history?kind=swap").await;
    assert_eq!(history.body["transactions"][0]["status"], "completed");
}

#[tokio::test]
async fn test_mainnet_quote_treats_testnet_prefix_as_distinct_token() {
    let app = test_app();
    let quote = app
        .get("/api/swap/quote?fromToken=tETH&toToken=ETH&amount=1&network=mainnet")
        .await;
    assert_eq!(quote.status, StatusCode::OK, "{}", quote.text);
    let quote_id = quote.body["quoteId"].as_str().unwrap();

    let resp = app
        .post(
            "/api/swap",
            json!({
                "tokenIn": "tETH",
                "tokenOut": "ETH",
                "amountIn": "1",
                "userAddress": WALLET,
                "quoteId": quote_id
            }),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK, "{}", resp.text);
}

#[tokio::test]
async fn test_swap_with_fresh_quote() {
    let app = test_app();
    let quote = app
        .get("/api/swap/quote?fromToken=ETH&toToken=USDT&amount=1&network=mainnet")
        .await;
    let quote_id = quote.body["quoteId"].as_str().unwrap();

    let resp = app
        .post(
            "/api/swap",
            json!({
                "tokenIn": "ETH",
                "tokenOut": "USDT",
                "amountIn": "1",
                "userAddress": WALLET,
                "quoteId": quote_id
            }),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK, "{}", resp.text);

    // 报价的交易对必须一致
    let resp = app
        .post(
            "/api/swap",
            json!({
                "tokenIn": "ETH",
                "tokenOut": "DAI",
                "amountIn": "1",
                "userAddress": WALLET,
                "quoteId": quote_id
            }),
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_swap_rejects_expired_quote() {
    let app = test_app();
    let quote = app
        .get("/api/swap/quote?fromToken=ETH&toToken=USDT&amount=1&network=mainnet")
        .await;
    let quote_id = quote.body["quoteId"].as_str().unwrap().to_string();

    app.runtime.advance(Duration::from_secs(31));

    let resp = app
        .post(
            "/api/swap",
            json!({
                "tokenIn": "ETH",
                "tokenOut": "USDT",
                "amountIn": "1",
                "userAddress": WALLET,
                "quoteId": quote_id
            }),
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.body["code"], "quote_expired");

    let history = app.get("/api/history").await;
    assert_eq!(history.body["total"], 0);
}

#[tokio::test]
async fn test_swap_validation() {
    let app = test_app();
    let base = json!({
        "tokenIn": "ETH",
        "tokenOut": "USDT",
        "amountIn": "1",
        "userAddress": WALLET
    });

    let mut bad_address = base.clone();
    bad_address["userAddress"] = json!("0xnothex");
    assert_eq!(app.post("/api/swap", bad_address).await.status, StatusCode::BAD_REQUEST);

    let mut same_token = base.clone();
    same_token["tokenOut"] = json!("eth");
    assert_eq!(app.post("/api/swap", same_token).await.status, StatusCode::BAD_REQUEST);

    let mut bad_slippage = base.clone();
    bad_slippage["slippage"] = json!(10.0);
    assert_eq!(app.post("/api/swap", bad_slippage).await.status, StatusCode::BAD_REQUEST);

    let mut bad_amount = base.clone();
    bad_amount["amountIn"] = json!("-3");
    assert_eq!(app.post("/api/swap", bad_amount).await.status, StatusCode::BAD_REQUEST);

    let resp = app
        .request(
            axum::http::Request::builder()
                .method("POST")
                .uri("/api/swap")
                .header("content-type", "application/json")
                .body(axum::body::Body::from("{not json"))
                .unwrap(),
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert!(resp.body["error"].is_string());
}

#[tokio::test]
async fn test_swap_failure_is_not_recorded() {
    let mut config = test_config();
    config.simulation.swap_failure_rate = 1.0;
    let app = test_app_with(config);

    let resp = app
        .post(
            "/api/swap",
            json!({"tokenIn": "ETH", "tokenOut": "USDT", "amountIn": "1", "userAddress": WALLET}),
        )
        .await;
    assert_eq!(resp.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(resp.body["error"], "Swap transaction failed");

    let history = app.get("/api/history").await;
    assert_eq!(history.body["total"], 0);
}

#[tokio::test]
async fn test_transfer_executes_and_records_recipient() {
    let app = test_app();
    let resp = app
        .post(
            "/api/transfer",
            json!({
                "tokenAddress": "USDT",
                "recipient": RECIPIENT,
                "amount": "25",
                "userAddress": WALLET
            }),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK, "{}", resp.text);

    let history = app
        .get(&format!("/api/history?wallet={}&kind=transfer", WALLET))
        .await;
    assert_eq!(history.body["total"], 1);
    assert_eq!(history.body["transactions"][0]["recipient"], RECIPIENT);

    let resp = app
        .post(
            "/api/transfer",
            json!({
                "tokenAddress": "USDT",
                "recipient": "bob",
                "amount": "25",
                "userAddress": WALLET
            }),
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.body["code"], "invalid_address");
}

#[tokio::test]
async fn test_history_pagination_and_kind_filter() {
    let app = test_app();
    for _ in 0..3 {
        let resp = app
            .post(
                "/api/wallet/send",
                json!({"from": WALLET, "to": RECIPIENT, "amount": "1"}),
            )
            .await;
        assert_eq!(resp.status, StatusCode::OK);
    }

    let page = app
        .get(&format!("/api/history?wallet={}&page=2&limit=2", WALLET))
        .await;
    assert_eq!(page.status, StatusCode::OK);
    assert_eq!(page.body["total"], 3);
    assert_eq!(page.body["page"], 2);
    assert_eq!(page.body["limit"], 2);
    assert_eq!(page.body["transactions"].as_array().unwrap().len(), 1);

    let swaps = app.get("/api/history?kind=swap").await;
    assert_eq!(swaps.body["total"], 0);

    let other_wallet = app.get(&format!("/api/history?wallet={}", RECIPIENT)).await;
    assert_eq!(other_wallet.body["total"], 0);

    let bad_kind = app.get("/api/history?kind=stake").await;
    assert_eq!(bad_kind.status, StatusCode::BAD_REQUEST);

    let clamped = app.get("/api/history?limit=1000").await;
    assert_eq!(clamped.body["limit"], 100);
}

#[tokio::test]
async fn test_transaction_status_settles_once_final() {
    let app = test_app();
    let resp = app
        .post(
            "/api/wallet/send",
            json!({"from": WALLET, "to": RECIPIENT, "amount": "1"}),
        )
        .await;
    let hash = resp.body["hash"].as_str().unwrap().to_string();

    // 0.1 < 0.7 → completed
    app.runtime.push_rolls(&[0.1]);
    let first = app
        .get(&format!("/api/transactions/{}/status", hash))
        .await;
    assert_eq!(first.status, StatusCode::OK, "{}", first.text);
    assert_eq!(first.body["status"], "completed");
    assert_eq!(first.body["kind"], "transfer");

    // 终态之后再轮询不会变化
    app.runtime.push_rolls(&[0.99]);
    let second = app
        .get(&format!("/api/transactions/{}/status", hash))
        .await;
    assert_eq!(second.body["status"], "completed");
}

#[tokio::test]
async fn test_transaction_status_for_unknown_hash() {
    let app = test_app();
    let hash = format!("0x{}", "ab".repeat(32));
    let resp = app
        .get(&format!("/api/transactions/{}/status", hash))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert!(resp.body["kind"].is_null());
    assert!(["pending", "completed", "failed"]
        .contains(&resp.body["status"].as_str().unwrap()));

    let resp = app.get("/api/transactions/0x1234/status").await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
}
