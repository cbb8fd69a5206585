//! API Gateway construct errors

use apistack_core::{ErrorCode, StackError};

#[derive(Debug, thiserror::Error)]
pub enum ApiGatewayError {
    #[error("Invalid path part '{0}'")]
    InvalidPathPart(String),

    #[error("Resource {0} already exists")]
    DuplicateResource(String),

    #[error("Method {0} {1} already exists")]
    DuplicateMethod(String, String),

    #[error("Unsupported HTTP method: {0}")]
    InvalidHttpMethod(String),

    #[error("Invalid method options: {0}")]
    InvalidMethodOptions(String),

    #[error("Unknown resource handle: {0}")]
    UnknownResource(usize),

    #[error("Invalid authorizer: {0}")]
    InvalidAuthorizer(String),
}

impl From<ApiGatewayError> for StackError {
    fn from(err: ApiGatewayError) -> Self {
        StackError::new(ErrorCode::ValidationError, err.to_string())
    }
}
