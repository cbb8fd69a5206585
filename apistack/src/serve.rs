//! Serving the declared API locally

use apistack_apigateway::{create_router, GatewayState};
use apistack_cognito::TokenVerifier;
use apistack_lambda::{EchoInvoker, Invoker};
use axum::Router;
use std::sync::Arc;

use crate::config::StackConfig;
use crate::stack::ApiStack;

/// Account id reported in proxy events when the stack has none
const LOCAL_ACCOUNT_ID: &str = "000000000000";

/// Gate router for the declared API, forwarding to `invoker`
pub fn gateway_router(api: &ApiStack, config: &StackConfig, invoker: Arc<dyn Invoker>) -> Router {
    let gateway = &config.gateway;
    let verifier = TokenVerifier::from_secret(
        &gateway.region,
        &gateway.user_pool_id,
        gateway.token_secret.as_bytes(),
    );

    create_router(GatewayState {
        routes: api.rest_api.routes(),
        stage: api.rest_api.stage_name().to_string(),
        verifier: Arc::new(verifier),
        invoker,
        account_id: api
            .stack
            .env()
            .account_id
            .clone()
            .unwrap_or_else(|| LOCAL_ACCOUNT_ID.to_string()),
        api_id: api.rest_api.logical_id().to_string(),
    })
}

/// Gate router with the handler replaced by an echo of the received event
pub fn echo_router(api: &ApiStack, config: &StackConfig) -> Router {
    gateway_router(api, config, Arc::new(EchoInvoker))
}
