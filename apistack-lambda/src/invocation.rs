//! Handing proxy events to function code

use async_trait::async_trait;
use serde_json::json;
use thiserror::Error;
use tracing::debug;

use crate::event::{ApiGatewayEvent, ApiGatewayResponse};

#[derive(Debug, Error)]
pub enum InvocationError {
    #[error("Function error: {0}")]
    FunctionError(String),

    #[error("Invalid response payload: {0}")]
    InvalidResponse(String),
}

/// Something that runs the function for one proxy event
#[async_trait]
pub trait Invoker: Send + Sync {
    async fn invoke(&self, event: ApiGatewayEvent) -> Result<ApiGatewayResponse, InvocationError>;
}

/// Returns the received event as the response body
///
/// Stands in for the opaque handler asset when running the gate locally,
/// like the console's test invocation.
#[derive(Debug, Default, Clone, Copy)]
pub struct EchoInvoker;

#[async_trait]
impl Invoker for EchoInvoker {
    async fn invoke(&self, event: ApiGatewayEvent) -> Result<ApiGatewayResponse, InvocationError> {
        debug!(path = %event.path, method = %event.http_method, "Echo invocation");
        let body = serde_json::to_value(&event)
            .map_err(|e| InvocationError::InvalidResponse(e.to_string()))?;
        Ok(ApiGatewayResponse::json(200, &json!({ "event": body })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{ApiGatewayIdentity, ApiGatewayRequestContext};
    use std::collections::HashMap;

    #[tokio::test]
    async fn test_echo_returns_event() {
        let event = ApiGatewayEvent {
            resource: "/transactions".to_string(),
            path: "/transactions".to_string(),
            http_method: "GET".to_string(),
            headers: HashMap::new(),
            multi_value_headers: HashMap::new(),
            query_string_parameters: None,
            multi_value_query_string_parameters: None,
            path_parameters: None,
            stage_variables: None,
            request_context: ApiGatewayRequestContext {
                account_id: "000000000000".to_string(),
                api_id: "local".to_string(),
                http_method: "GET".to_string(),
                identity: ApiGatewayIdentity::default(),
                path: "/transactions".to_string(),
                stage: "prod".to_string(),
                request_id: "req-1".to_string(),
                request_time: String::new(),
                request_time_epoch: 0,
                resource_id: "res".to_string(),
                resource_path: "/transactions".to_string(),
                operation_name: None,
                authorizer: None,
            },
            body: None,
            is_base64_encoded: false,
        };

        let response = EchoInvoker.invoke(event).await.unwrap();
        assert_eq!(response.status_code, 200);
        let body: serde_json::Value = serde_json::from_str(response.body.as_deref().unwrap()).unwrap();
        assert_eq!(body["event"]["resource"], "/transactions");
    }
}
