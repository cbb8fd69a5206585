//! Cognito user pools authorizer

use apistack_cognito::UserPool;
use apistack_core::intrinsic::reference;
use apistack_core::{LogicalId, Resource};
use serde_json::{json, Value};

use crate::error::ApiGatewayError;

pub const RESOURCE_TYPE: &str = "AWS::ApiGateway::Authorizer";

const HEADER_PREFIX: &str = "method.request.header.";

/// Where the gateway reads the caller's token from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentitySource(String);

impl IdentitySource {
    pub fn header(name: &str) -> Self {
        Self(format!("{HEADER_PREFIX}{name}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn header_name(&self) -> Option<&str> {
        self.0.strip_prefix(HEADER_PREFIX)
    }
}

impl Default for IdentitySource {
    fn default() -> Self {
        Self::header("Authorization")
    }
}

#[derive(Debug, Clone)]
pub struct CognitoUserPoolsAuthorizer {
    construct_id: String,
    logical_id: LogicalId,
    provider_arns: Vec<Value>,
    identity_source: IdentitySource,
    results_cache_ttl_secs: Option<u32>,
}

impl CognitoUserPoolsAuthorizer {
    pub fn new(
        construct_id: &str,
        user_pools: &[&UserPool],
        identity_source: IdentitySource,
    ) -> Result<Self, ApiGatewayError> {
        if user_pools.is_empty() {
            return Err(ApiGatewayError::InvalidAuthorizer(
                "at least one user pool is required".to_string(),
            ));
        }
        if identity_source.header_name().is_none() {
            return Err(ApiGatewayError::InvalidAuthorizer(format!(
                "identity source must be a request header, got {}",
                identity_source.as_str()
            )));
        }

        Ok(Self {
            construct_id: construct_id.to_string(),
            logical_id: LogicalId::from_path(&[construct_id, "Resource"]),
            provider_arns: user_pools.iter().map(|p| p.arn()).collect(),
            identity_source,
            results_cache_ttl_secs: None,
        })
    }

    /// Cache authorization results for this long; 0 disables caching
    pub fn with_results_cache_ttl(mut self, secs: u32) -> Result<Self, ApiGatewayError> {
        if secs > 3600 {
            return Err(ApiGatewayError::InvalidAuthorizer(format!(
                "resultsCacheTtl must not exceed 3600 seconds, got {secs}"
            )));
        }
        self.results_cache_ttl_secs = Some(secs);
        Ok(self)
    }

    pub fn logical_id(&self) -> &LogicalId {
        &self.logical_id
    }

    pub fn identity_source(&self) -> &IdentitySource {
        &self.identity_source
    }

    /// Render bound to a REST API
    /// Stack-wide unique id, used as the authorizer's name
    pub fn unique_id(&self, stack_name: &str) -> LogicalId {
        LogicalId::from_path(&[stack_name, self.construct_id.as_str()])
    }

    pub fn to_resource(&self, rest_api_id: &LogicalId, name: &str) -> Resource {
        Resource::new(RESOURCE_TYPE)
            .property(
                "AuthorizerResultTtlInSeconds",
                json!(self.results_cache_ttl_secs),
            )
            .property("IdentitySource", self.identity_source.as_str())
            .property("Name", name)
            .property("ProviderARNs", json!(self.provider_arns))
            .property("RestApiId", reference(rest_api_id.as_str()))
            .property("Type", "COGNITO_USER_POOLS")
    }
}
