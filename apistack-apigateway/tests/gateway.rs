//! Integration tests for the local authorizer gate
//!
//! These tests serve a declared API over TCP and call it with a plain HTTP
//! client, checking what reaches the function.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use apistack_apigateway::{
    create_router, AuthorizationType, CognitoUserPoolsAuthorizer, GatewayState, IdentitySource,
    LambdaIntegration, MethodOptions, RestApi,
};
use apistack_cognito::{TokenIssuer, TokenVerifier, UserPool, UserPoolProps};
use apistack_lambda::{
    ApiGatewayEvent, ApiGatewayResponse, Code, Function, FunctionProps, InvocationError, Invoker,
    Runtime,
};
use async_trait::async_trait;
use serde_json::json;
use tokio::net::TcpListener;

const REGION: &str = "us-east-1";
const POOL: &str = "us-east-1_Integration";
const SECRET: &[u8] = b"integration-secret";

/// Counts invocations and answers with an empty transaction list
#[derive(Default)]
struct CountingInvoker {
    calls: AtomicUsize,
}

#[async_trait]
impl Invoker for CountingInvoker {
    async fn invoke(&self, event: ApiGatewayEvent) -> Result<ApiGatewayResponse, InvocationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ApiGatewayResponse::json(
            200,
            &json!({
                "transactions": [],
                "operation": event.request_context.operation_name,
                "caller": event
                    .request_context
                    .authorizer
                    .and_then(|a| a.claims.get("sub").cloned()),
            }),
        ))
    }
}

struct FailingInvoker;

#[async_trait]
impl Invoker for FailingInvoker {
    async fn invoke(&self, _event: ApiGatewayEvent) -> Result<ApiGatewayResponse, InvocationError> {
        Err(InvocationError::FunctionError("handler crashed".to_string()))
    }
}

fn transactions_api() -> RestApi {
    let pool = UserPool::new("UserPool", UserPoolProps::default()).unwrap();
    let function = Function::new(
        "MyLambdaFunction",
        FunctionProps::new(
            Runtime::Nodejs18,
            Code::from_inline("exports.main = async () => ({});").unwrap(),
            "index.main",
        ),
    )
    .unwrap();
    let authorizer =
        CognitoUserPoolsAuthorizer::new("CognitoAuthorizer", &[&pool], IdentitySource::default())
            .unwrap();

    let mut api = RestApi::new("MyApiGateway");
    let transactions = api.add_resource(api.root(), "transactions").unwrap();
    api.add_method(
        transactions,
        "GET",
        LambdaIntegration::new(&function),
        MethodOptions {
            authorization_type: Some(AuthorizationType::Cognito),
            authorizer: Some(authorizer),
            operation_name: Some("Get All Transactions".to_string()),
            ..MethodOptions::default()
        },
    )
    .unwrap();
    api
}

/// Start the gate and return its base URL
async fn start_gate(invoker: Arc<dyn Invoker>) -> (String, tokio::task::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let api = transactions_api();
    let router = create_router(GatewayState {
        routes: api.routes(),
        stage: api.stage_name().to_string(),
        verifier: Arc::new(TokenVerifier::from_secret(REGION, POOL, SECRET)),
        invoker,
        account_id: "000000000000".to_string(),
        api_id: "local".to_string(),
    });

    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    (format!("http://127.0.0.1:{port}"), handle)
}

fn issuer() -> TokenIssuer {
    TokenIssuer::new(REGION, POOL, SECRET)
}

#[tokio::test]
async fn test_request_without_token_never_reaches_function() {
    let invoker = Arc::new(CountingInvoker::default());
    let (base, handle) = start_gate(invoker.clone()).await;

    let response = reqwest::get(format!("{base}/prod/transactions")).await.unwrap();
    assert_eq!(response.status(), 401);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Unauthorized");
    assert_eq!(invoker.calls.load(Ordering::SeqCst), 0);

    handle.abort();
}

#[tokio::test]
async fn test_invalid_tokens_never_reach_function() {
    let invoker = Arc::new(CountingInvoker::default());
    let (base, handle) = start_gate(invoker.clone()).await;
    let client = reqwest::Client::new();

    let expired = issuer()
        .issue_id_token("user-1", "user@example.com", "client-1", -300)
        .unwrap();
    let foreign = TokenIssuer::new(REGION, "us-east-1_Elsewhere", SECRET)
        .issue_id_token("user-1", "user@example.com", "client-1", 300)
        .unwrap();
    let access = issuer()
        .issue_access_token("user-1", "client-1", &["openid"], 300)
        .unwrap();

    for token in ["garbage", expired.as_str(), foreign.as_str(), access.as_str()] {
        let response = client
            .get(format!("{base}/prod/transactions"))
            .header("Authorization", token)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 401);
    }
    assert_eq!(invoker.calls.load(Ordering::SeqCst), 0);

    handle.abort();
}

#[tokio::test]
async fn test_valid_token_is_forwarded() {
    let invoker = Arc::new(CountingInvoker::default());
    let (base, handle) = start_gate(invoker.clone()).await;

    let token = issuer()
        .issue_id_token("user-1", "user@example.com", "client-1", 300)
        .unwrap();
    let response = reqwest::Client::new()
        .get(format!("{base}/prod/transactions"))
        .header("Authorization", token)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert!(response.headers().contains_key("x-amzn-requestid"));
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["transactions"], json!([]));
    assert_eq!(body["operation"], "Get All Transactions");
    assert_eq!(body["caller"], "user-1");
    assert_eq!(invoker.calls.load(Ordering::SeqCst), 1);

    handle.abort();
}

#[tokio::test]
async fn test_undeclared_routes_are_rejected() {
    let invoker = Arc::new(CountingInvoker::default());
    let (base, handle) = start_gate(invoker.clone()).await;
    let client = reqwest::Client::new();

    let post = client.post(format!("{base}/prod/transactions")).send().await.unwrap();
    assert_eq!(post.status(), 403);
    let body: serde_json::Value = post.json().await.unwrap();
    assert_eq!(body["message"], "Missing Authentication Token");

    let other = client.get(format!("{base}/prod/accounts")).send().await.unwrap();
    assert_eq!(other.status(), 403);
    let unstaged = client.get(format!("{base}/transactions")).send().await.unwrap();
    assert_eq!(unstaged.status(), 403);
    assert_eq!(invoker.calls.load(Ordering::SeqCst), 0);

    handle.abort();
}

#[tokio::test]
async fn test_function_failure_is_bad_gateway() {
    let (base, handle) = start_gate(Arc::new(FailingInvoker)).await;

    let token = issuer()
        .issue_id_token("user-1", "user@example.com", "client-1", 300)
        .unwrap();
    let response = reqwest::Client::new()
        .get(format!("{base}/prod/transactions"))
        .header("Authorization", format!("Bearer {token}"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 502);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Internal server error");

    handle.abort();
}
