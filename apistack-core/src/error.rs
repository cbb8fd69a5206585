//! Synthesis error types and formatting

use serde::Serialize;
use thiserror::Error;

/// Error codes raised while building or synthesizing a stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Construct validation
    ValidationError,
    DuplicateLogicalId,

    // Graph
    DanglingReference,
    DependencyCycle,

    // Assets and output
    AssetError,
    SerializationError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ValidationError => "ValidationError",
            Self::DuplicateLogicalId => "DuplicateLogicalId",
            Self::DanglingReference => "DanglingReference",
            Self::DependencyCycle => "DependencyCycle",
            Self::AssetError => "AssetError",
            Self::SerializationError => "SerializationError",
        }
    }

    /// Process exit code used by the CLI when synthesis fails with this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ValidationError | Self::DuplicateLogicalId => 2,
            Self::DanglingReference | Self::DependencyCycle => 3,
            Self::AssetError | Self::SerializationError => 4,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stack synthesis error
#[derive(Debug, Error)]
#[error("{code}: {message}")]
pub struct StackError {
    pub code: ErrorCode,
    pub message: String,
    pub resource: Option<String>,
}

impl StackError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            resource: None,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationError, message)
    }

    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    /// Format as a JSON error document
    pub fn to_json(&self) -> String {
        #[derive(Serialize)]
        struct JsonError<'a> {
            code: &'static str,
            message: &'a str,
            #[serde(skip_serializing_if = "Option::is_none")]
            resource: Option<&'a str>,
        }

        let error = JsonError {
            code: self.code.as_str(),
            message: &self.message,
            resource: self.resource.as_deref(),
        };

        serde_json::to_string(&error).unwrap_or_else(|_| {
            format!(r#"{{"code":"{}","message":"{}"}}"#, self.code.as_str(), self.message)
        })
    }
}

impl From<serde_json::Error> for StackError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(ErrorCode::SerializationError, err.to_string())
    }
}

impl From<serde_yaml::Error> for StackError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::new(ErrorCode::SerializationError, err.to_string())
    }
}
