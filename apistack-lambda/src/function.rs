//! Lambda function construct

use apistack_core::intrinsic::{get_att, join, partition, reference};
use apistack_core::{ErrorCode, LogicalId, Resource, StackError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::str::FromStr;
use thiserror::Error;

use crate::asset::Code;

pub const RESOURCE_TYPE: &str = "AWS::Lambda::Function";
pub const ROLE_RESOURCE_TYPE: &str = "AWS::IAM::Role";

const BASIC_EXECUTION_POLICY: &str = ":iam::aws:policy/service-role/AWSLambdaBasicExecutionRole";
const MAX_HANDLER_LEN: usize = 128;

#[derive(Debug, Error)]
pub enum LambdaError {
    #[error("Unknown runtime: {0}")]
    UnknownRuntime(String),

    #[error("Invalid function properties: {0}")]
    InvalidProps(String),

    #[error("Asset error: {0}")]
    Asset(String),
}

impl From<LambdaError> for StackError {
    fn from(err: LambdaError) -> Self {
        let code = match err {
            LambdaError::Asset(_) => ErrorCode::AssetError,
            LambdaError::UnknownRuntime(_) | LambdaError::InvalidProps(_) => {
                ErrorCode::ValidationError
            }
        };
        StackError::new(code, err.to_string())
    }
}

/// Supported Lambda runtimes
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Runtime {
    #[serde(rename = "python3.11")]
    Python311,
    #[serde(rename = "python3.12")]
    Python312,
    #[serde(rename = "nodejs18.x")]
    Nodejs18,
    #[serde(rename = "nodejs20.x")]
    Nodejs20,
    #[serde(rename = "nodejs22.x")]
    Nodejs22,
    #[serde(rename = "provided.al2023")]
    ProvidedAl2023,
}

impl Runtime {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Python311 => "python3.11",
            Self::Python312 => "python3.12",
            Self::Nodejs18 => "nodejs18.x",
            Self::Nodejs20 => "nodejs20.x",
            Self::Nodejs22 => "nodejs22.x",
            Self::ProvidedAl2023 => "provided.al2023",
        }
    }

    /// File extensions a handler module may have
    pub fn module_extensions(&self) -> &'static [&'static str] {
        match self {
            Self::Python311 | Self::Python312 => &["py"],
            Self::Nodejs18 | Self::Nodejs20 | Self::Nodejs22 => &["js", "mjs", "cjs"],
            Self::ProvidedAl2023 => &[],
        }
    }
}

impl FromStr for Runtime {
    type Err = LambdaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "python3.11" => Ok(Self::Python311),
            "python3.12" => Ok(Self::Python312),
            "nodejs18.x" => Ok(Self::Nodejs18),
            "nodejs20.x" => Ok(Self::Nodejs20),
            "nodejs22.x" => Ok(Self::Nodejs22),
            "provided.al2023" => Ok(Self::ProvidedAl2023),
            other => Err(LambdaError::UnknownRuntime(other.to_string())),
        }
    }
}

/// Function configuration
#[derive(Debug, Clone)]
pub struct FunctionProps {
    pub runtime: Runtime,
    pub code: Code,
    pub handler: String,
    pub memory_size: Option<u32>,
    pub timeout_secs: Option<u32>,
    pub environment: BTreeMap<String, String>,
    pub description: Option<String>,
}

impl FunctionProps {
    pub fn new(runtime: Runtime, code: Code, handler: impl Into<String>) -> Self {
        Self {
            runtime,
            code,
            handler: handler.into(),
            memory_size: None,
            timeout_secs: None,
            environment: BTreeMap::new(),
            description: None,
        }
    }

    fn validate(&self) -> Result<(), LambdaError> {
        if self.handler.is_empty()
            || self.handler.len() > MAX_HANDLER_LEN
            || self.handler.chars().any(char::is_whitespace)
        {
            return Err(LambdaError::InvalidProps(format!(
                "handler '{}' must be 1-{MAX_HANDLER_LEN} characters without whitespace",
                self.handler
            )));
        }
        if let Some(memory) = self.memory_size {
            if !(128..=10240).contains(&memory) {
                return Err(LambdaError::InvalidProps(format!(
                    "memorySize must be between 128 and 10240 MB, got {memory}"
                )));
            }
        }
        if let Some(timeout) = self.timeout_secs {
            if !(1..=900).contains(&timeout) {
                return Err(LambdaError::InvalidProps(format!(
                    "timeout must be between 1 and 900 seconds, got {timeout}"
                )));
            }
        }
        Ok(())
    }
}

/// A function plus the execution role created for it
#[derive(Debug, Clone)]
pub struct Function {
    construct_id: String,
    logical_id: LogicalId,
    role_logical_id: LogicalId,
    props: FunctionProps,
}

impl Function {
    pub fn new(construct_id: &str, props: FunctionProps) -> Result<Self, LambdaError> {
        props.validate()?;
        props.code.check_entry_point(&props.handler, props.runtime);

        Ok(Self {
            construct_id: construct_id.to_string(),
            logical_id: LogicalId::from_path(&[construct_id, "Resource"]),
            role_logical_id: LogicalId::from_path(&[construct_id, "ServiceRole", "Resource"]),
            props,
        })
    }

    pub fn construct_id(&self) -> &str {
        &self.construct_id
    }

    pub fn logical_id(&self) -> &LogicalId {
        &self.logical_id
    }

    pub fn role_logical_id(&self) -> &LogicalId {
        &self.role_logical_id
    }

    pub fn props(&self) -> &FunctionProps {
        &self.props
    }

    pub fn function_name(&self) -> Value {
        reference(self.logical_id.as_str())
    }

    pub fn arn(&self) -> Value {
        get_att(self.logical_id.as_str(), "Arn")
    }

    pub fn role_resource(&self) -> Resource {
        Resource::new(ROLE_RESOURCE_TYPE)
            .property(
                "AssumeRolePolicyDocument",
                json!({
                    "Statement": [{
                        "Action": "sts:AssumeRole",
                        "Effect": "Allow",
                        "Principal": { "Service": "lambda.amazonaws.com" },
                    }],
                    "Version": "2012-10-17",
                }),
            )
            .property(
                "ManagedPolicyArns",
                json!([join("", vec![json!("arn:"), partition(), json!(BASIC_EXECUTION_POLICY)])]),
            )
    }

    pub fn to_resource(&self) -> Resource {
        let props = &self.props;
        let mut resource = Resource::new(RESOURCE_TYPE)
            .property("Code", props.code.to_cfn())
            .property("Description", json!(props.description))
            .property("Handler", props.handler.as_str())
            .property("MemorySize", json!(props.memory_size))
            .property("Role", get_att(self.role_logical_id.as_str(), "Arn"))
            .property("Runtime", props.runtime.as_str())
            .property("Timeout", json!(props.timeout_secs));

        if !props.environment.is_empty() {
            resource = resource.property("Environment", json!({ "Variables": props.environment }));
        }

        // The role must exist before the function is created with it
        resource.depends_on(&self.role_logical_id)
    }
}
