//! User pool token verification
//!
//! Mirrors what a Cognito user pools authorizer checks before a request is
//! forwarded: signature, expiry, issuer, and the token use / scope rule.

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::debug;

use crate::error::CognitoError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenUse {
    Id,
    Access,
}

/// Claims carried by user pool tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CognitoClaims {
    pub sub: String,
    pub iss: String,
    pub token_use: TokenUse,
    pub exp: i64,
    #[serde(default)]
    pub iat: i64,
    /// Client id; present on ID tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
    /// Client id; present on access tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// Space separated; present on access tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(rename = "cognito:username", default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CognitoClaims {
    pub fn scopes(&self) -> impl Iterator<Item = &str> {
        self.scope.as_deref().unwrap_or_default().split_whitespace()
    }

    /// Flatten to the string map the gateway exposes as
    /// `requestContext.authorizer.claims`
    pub fn to_context(&self) -> BTreeMap<String, String> {
        let Ok(Value::Object(map)) = serde_json::to_value(self) else {
            return BTreeMap::new();
        };
        map.into_iter()
            .map(|(k, v)| {
                let v = match v {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                (k, v)
            })
            .collect()
    }
}

/// `https://cognito-idp.{region}.amazonaws.com/{user_pool_id}`
pub fn issuer_url(region: &str, user_pool_id: &str) -> String {
    format!("https://cognito-idp.{region}.amazonaws.com/{user_pool_id}")
}

pub struct TokenVerifier {
    issuer: String,
    key: DecodingKey,
    algorithm: Algorithm,
    leeway_secs: u64,
}

impl TokenVerifier {
    pub fn new(region: &str, user_pool_id: &str, key: DecodingKey, algorithm: Algorithm) -> Self {
        Self {
            issuer: issuer_url(region, user_pool_id),
            key,
            algorithm,
            leeway_secs: 0,
        }
    }

    /// Verifier for a pool's published RS256 signing key
    pub fn from_rsa_components(
        region: &str,
        user_pool_id: &str,
        modulus: &str,
        exponent: &str,
    ) -> Result<Self, CognitoError> {
        let key = DecodingKey::from_rsa_components(modulus, exponent)
            .map_err(|e| CognitoError::TokenRejected(format!("invalid RSA key: {e}")))?;
        Ok(Self::new(region, user_pool_id, key, Algorithm::RS256))
    }

    /// Verifier for tokens signed with a shared HS256 secret (local use)
    pub fn from_secret(region: &str, user_pool_id: &str, secret: &[u8]) -> Self {
        Self::new(
            region,
            user_pool_id,
            DecodingKey::from_secret(secret),
            Algorithm::HS256,
        )
    }

    pub fn with_leeway(mut self, leeway_secs: u64) -> Self {
        self.leeway_secs = leeway_secs;
        self
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Verify a raw token for a method with the given authorization scopes
    ///
    /// Without scopes only ID tokens are accepted. With scopes only access
    /// tokens carrying at least one of them are.
    pub fn verify(&self, token: &str, required_scopes: &[String]) -> Result<CognitoClaims, CognitoError> {
        let mut validation = Validation::new(self.algorithm);
        validation.set_issuer(&[&self.issuer]);
        // Any client of the pool may call the method
        validation.validate_aud = false;
        validation.leeway = self.leeway_secs;

        let claims = decode::<CognitoClaims>(token, &self.key, &validation)
            .map_err(|e| {
                debug!(error = %e, "Token failed validation");
                CognitoError::TokenRejected(e.to_string())
            })?
            .claims;

        if required_scopes.is_empty() {
            if claims.token_use != TokenUse::Id {
                return Err(CognitoError::TokenRejected(
                    "an ID token is required for this method".to_string(),
                ));
            }
        } else {
            if claims.token_use != TokenUse::Access {
                return Err(CognitoError::TokenRejected(
                    "an access token is required for this method".to_string(),
                ));
            }
            if !claims.scopes().any(|s| required_scopes.iter().any(|r| r == s)) {
                return Err(CognitoError::TokenRejected(
                    "token carries none of the method's scopes".to_string(),
                ));
            }
        }

        debug!(sub = %claims.sub, token_use = ?claims.token_use, "Token verified");
        Ok(claims)
    }
}

/// Issues HS256 tokens shaped like the pool's, for exercising the local gate
pub struct TokenIssuer {
    issuer: String,
    key: EncodingKey,
}

impl TokenIssuer {
    pub fn new(region: &str, user_pool_id: &str, secret: &[u8]) -> Self {
        Self {
            issuer: issuer_url(region, user_pool_id),
            key: EncodingKey::from_secret(secret),
        }
    }

    pub fn issue_id_token(
        &self,
        sub: &str,
        email: &str,
        client_id: &str,
        ttl_secs: i64,
    ) -> Result<String, CognitoError> {
        let now = Utc::now().timestamp();
        let claims = CognitoClaims {
            sub: sub.to_string(),
            iss: self.issuer.clone(),
            token_use: TokenUse::Id,
            exp: now + ttl_secs,
            iat: now,
            aud: Some(client_id.to_string()),
            client_id: None,
            scope: None,
            email: Some(email.to_string()),
            username: Some(sub.to_string()),
            extra: Map::new(),
        };
        self.sign(&claims)
    }

    pub fn issue_access_token(
        &self,
        sub: &str,
        client_id: &str,
        scopes: &[&str],
        ttl_secs: i64,
    ) -> Result<String, CognitoError> {
        let now = Utc::now().timestamp();
        let claims = CognitoClaims {
            sub: sub.to_string(),
            iss: self.issuer.clone(),
            token_use: TokenUse::Access,
            exp: now + ttl_secs,
            iat: now,
            aud: None,
            client_id: Some(client_id.to_string()),
            scope: Some(scopes.join(" ")),
            email: None,
            username: Some(sub.to_string()),
            extra: Map::new(),
        };
        self.sign(&claims)
    }

    fn sign(&self, claims: &CognitoClaims) -> Result<String, CognitoError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.key)
            .map_err(|e| CognitoError::TokenRejected(format!("cannot sign token: {e}")))
    }
}
