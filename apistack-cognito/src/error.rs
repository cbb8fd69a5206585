//! Cognito construct errors

use apistack_core::{ErrorCode, StackError};

#[derive(Debug, thiserror::Error)]
pub enum CognitoError {
    #[error("Invalid domain prefix '{0}': {1}")]
    InvalidDomainPrefix(String, &'static str),

    #[error("Invalid password policy: {0}")]
    InvalidPasswordPolicy(String),

    #[error("Invalid sign-in aliases: {0}")]
    InvalidSignInAliases(&'static str),

    #[error("Invalid client configuration: {0}")]
    InvalidClient(String),

    #[error("Invalid callback URL '{0}': {1}")]
    InvalidCallbackUrl(String, String),

    #[error("redirect_mismatch: {0} is not a registered callback URL")]
    RedirectMismatch(String),

    #[error("Token rejected: {0}")]
    TokenRejected(String),
}

impl From<CognitoError> for StackError {
    fn from(err: CognitoError) -> Self {
        StackError::new(ErrorCode::ValidationError, err.to_string())
    }
}
