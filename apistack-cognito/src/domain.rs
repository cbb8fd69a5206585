//! Hosted UI domain

use apistack_core::intrinsic::reference;
use apistack_core::{LogicalId, Resource};
use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use crate::error::CognitoError;
use crate::user_pool::UserPool;

pub const RESOURCE_TYPE: &str = "AWS::Cognito::UserPoolDomain";

static PREFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?$").expect("valid regex"));

const RESERVED_WORDS: [&str; 3] = ["aws", "amazon", "cognito"];

/// A Cognito-hosted domain prefix bound to one pool
#[derive(Debug, Clone)]
pub struct UserPoolDomain {
    logical_id: LogicalId,
    user_pool_id: LogicalId,
    domain_prefix: String,
}

impl UserPoolDomain {
    pub fn new(
        construct_id: &str,
        user_pool: &UserPool,
        domain_prefix: &str,
    ) -> Result<Self, CognitoError> {
        validate_prefix(domain_prefix)?;
        Ok(Self {
            logical_id: LogicalId::from_path(&[construct_id, "Resource"]),
            user_pool_id: user_pool.logical_id().clone(),
            domain_prefix: domain_prefix.to_string(),
        })
    }

    pub fn logical_id(&self) -> &LogicalId {
        &self.logical_id
    }

    pub fn domain_prefix(&self) -> &str {
        &self.domain_prefix
    }

    /// `https://{prefix}.auth.{region}.amazoncognito.com`
    pub fn base_url(&self, region: &str) -> String {
        format!("https://{}.auth.{region}.amazoncognito.com", self.domain_prefix)
    }

    /// Hosted UI login URL for an authorization-code sign-in
    pub fn sign_in_url(
        &self,
        region: &str,
        client_id: &str,
        redirect_uri: &str,
    ) -> Result<String, CognitoError> {
        let mut url = Url::parse(&format!("{}/login", self.base_url(region)))
            .map_err(|e| CognitoError::InvalidClient(format!("cannot build sign-in URL: {e}")))?;
        url.query_pairs_mut()
            .append_pair("client_id", client_id)
            .append_pair("response_type", "code")
            .append_pair("redirect_uri", redirect_uri);
        Ok(url.to_string())
    }

    pub fn to_resource(&self) -> Resource {
        Resource::new(RESOURCE_TYPE)
            .property("Domain", self.domain_prefix.as_str())
            .property("UserPoolId", reference(self.user_pool_id.as_str()))
    }
}

fn validate_prefix(prefix: &str) -> Result<(), CognitoError> {
    if !PREFIX_RE.is_match(prefix) {
        return Err(CognitoError::InvalidDomainPrefix(
            prefix.to_string(),
            "must be 1-63 lowercase letters, digits or hyphens, not starting or ending with a hyphen",
        ));
    }
    if RESERVED_WORDS.iter().any(|w| prefix.contains(w)) {
        return Err(CognitoError::InvalidDomainPrefix(
            prefix.to_string(),
            "must not contain aws, amazon or cognito",
        ));
    }
    Ok(())
}
