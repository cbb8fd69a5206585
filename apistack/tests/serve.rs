//! End-to-end tests of the locally served transactions API

use std::fs;

use apistack::{define, serve, StackConfig};
use apistack_cognito::TokenIssuer;
use tempfile::TempDir;
use tokio::net::TcpListener;

async fn start_server() -> (TempDir, StackConfig, String, tokio::task::JoinHandle<()>) {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("default-handler.js"), "exports.main = async () => ({});").unwrap();
    let mut config = StackConfig::default();
    config.handler.asset_path = dir.path().to_path_buf();

    let defined = define(&config).unwrap();
    let app = serve::echo_router(&defined, &config);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (dir, config, format!("http://127.0.0.1:{port}"), handle)
}

fn issuer(config: &StackConfig) -> TokenIssuer {
    TokenIssuer::new(
        &config.gateway.region,
        &config.gateway.user_pool_id,
        config.gateway.token_secret.as_bytes(),
    )
}

#[tokio::test]
async fn test_transactions_require_token() {
    let (_dir, _config, base, handle) = start_server().await;

    let response = reqwest::get(format!("{base}/prod/transactions")).await.unwrap();
    assert_eq!(response.status(), 401);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body, serde_json::json!({ "message": "Unauthorized" }));

    handle.abort();
}

#[tokio::test]
async fn test_transactions_with_id_token() {
    let (_dir, config, base, handle) = start_server().await;
    let token = issuer(&config)
        .issue_id_token("user-42", "user42@example.com", "client", 300)
        .unwrap();

    let response = reqwest::Client::new()
        .get(format!("{base}/prod/transactions"))
        .header("Authorization", format!("Bearer {token}"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body: serde_json::Value = response.json().await.unwrap();
    let context = &body["event"]["requestContext"];
    assert_eq!(context["resourcePath"], "/transactions");
    assert_eq!(context["operationName"], "Get All Transactions");
    assert_eq!(context["authorizer"]["claims"]["email"], "user42@example.com");
    assert_eq!(context["apiId"], "MyApiGateway04A753E5");

    handle.abort();
}

#[tokio::test]
async fn test_access_token_rejected_on_unscoped_method() {
    let (_dir, config, base, handle) = start_server().await;
    let token = issuer(&config)
        .issue_access_token("user-42", "client", &["email", "openid"], 300)
        .unwrap();

    let response = reqwest::Client::new()
        .get(format!("{base}/prod/transactions"))
        .header("Authorization", token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);

    handle.abort();
}
