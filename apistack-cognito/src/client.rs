//! OAuth clients of a user pool

use apistack_core::intrinsic::reference;
use apistack_core::{LogicalId, Resource};
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::fmt;
use tracing::debug;
use url::Url;

use crate::error::CognitoError;
use crate::user_pool::UserPool;

pub const RESOURCE_TYPE: &str = "AWS::Cognito::UserPoolClient";

/// Standard OIDC attributes a client may read or write
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StandardAttribute {
    Address,
    Birthdate,
    Email,
    FamilyName,
    Gender,
    GivenName,
    Locale,
    MiddleName,
    Name,
    Nickname,
    PhoneNumber,
    Picture,
    PreferredUsername,
    Profile,
    UpdatedAt,
    Website,
    Zoneinfo,
}

impl StandardAttribute {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Address => "address",
            Self::Birthdate => "birthdate",
            Self::Email => "email",
            Self::FamilyName => "family_name",
            Self::Gender => "gender",
            Self::GivenName => "given_name",
            Self::Locale => "locale",
            Self::MiddleName => "middle_name",
            Self::Name => "name",
            Self::Nickname => "nickname",
            Self::PhoneNumber => "phone_number",
            Self::Picture => "picture",
            Self::PreferredUsername => "preferred_username",
            Self::Profile => "profile",
            Self::UpdatedAt => "updated_at",
            Self::Website => "website",
            Self::Zoneinfo => "zoneinfo",
        }
    }
}

/// Set of attributes, rendered sorted
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientAttributes {
    attributes: BTreeSet<&'static str>,
}

impl ClientAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_standard_attributes(mut self, attributes: &[StandardAttribute]) -> Self {
        self.attributes
            .extend(attributes.iter().map(StandardAttribute::as_str));
        self
    }

    pub fn contains(&self, attribute: StandardAttribute) -> bool {
        self.attributes.contains(attribute.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn to_vec(&self) -> Vec<&'static str> {
        self.attributes.iter().copied().collect()
    }
}

/// OAuth 2.0 grant types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OAuthFlows {
    pub authorization_code_grant: bool,
    pub implicit_code_grant: bool,
    pub client_credentials: bool,
}

impl OAuthFlows {
    fn to_vec(self) -> Vec<&'static str> {
        let mut flows = Vec::new();
        if self.authorization_code_grant {
            flows.push("code");
        }
        if self.implicit_code_grant {
            flows.push("implicit");
        }
        if self.client_credentials {
            flows.push("client_credentials");
        }
        flows
    }

    fn redirects_users(self) -> bool {
        self.authorization_code_grant || self.implicit_code_grant
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OAuthScope {
    Email,
    Phone,
    OpenId,
    Profile,
    CognitoAdmin,
    /// Resource server scope such as `transactions/read`
    Custom(String),
}

impl OAuthScope {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Email => "email",
            Self::Phone => "phone",
            Self::OpenId => "openid",
            Self::Profile => "profile",
            Self::CognitoAdmin => "aws.cognito.signin.user.admin",
            Self::Custom(scope) => scope,
        }
    }
}

impl fmt::Display for OAuthScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default)]
pub struct OAuthSettings {
    pub flows: OAuthFlows,
    pub scopes: Vec<OAuthScope>,
    pub callback_urls: Vec<String>,
    pub logout_urls: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UserPoolClientProps {
    pub write_attributes: ClientAttributes,
    pub read_attributes: ClientAttributes,
    pub o_auth: Option<OAuthSettings>,
    pub generate_secret: bool,
}

#[derive(Debug, Clone)]
pub struct UserPoolClient {
    logical_id: LogicalId,
    user_pool_id: LogicalId,
    props: UserPoolClientProps,
    scopes: Vec<OAuthScope>,
}

impl UserPoolClient {
    pub(crate) fn new(
        user_pool: &UserPool,
        construct_id: &str,
        props: UserPoolClientProps,
    ) -> Result<Self, CognitoError> {
        let scopes = match &props.o_auth {
            Some(o_auth) => validate_o_auth(o_auth)?,
            None => Vec::new(),
        };

        let logical_id =
            LogicalId::from_path(&[user_pool.construct_id(), construct_id, "Resource"]);
        debug!(client = %logical_id, scopes = scopes.len(), "Declared user pool client");

        Ok(Self {
            logical_id,
            user_pool_id: user_pool.logical_id().clone(),
            props,
            scopes,
        })
    }

    pub fn logical_id(&self) -> &LogicalId {
        &self.logical_id
    }

    /// Deploy-time client id
    pub fn client_id(&self) -> Value {
        reference(self.logical_id.as_str())
    }

    /// Allowed scopes, duplicates removed, declaration order kept
    pub fn scopes(&self) -> &[OAuthScope] {
        &self.scopes
    }

    pub fn allows_scope(&self, scope: &OAuthScope) -> bool {
        self.scopes.contains(scope)
    }

    pub fn callback_urls(&self) -> &[String] {
        self.props
            .o_auth
            .as_ref()
            .map(|o| o.callback_urls.as_slice())
            .unwrap_or_default()
    }

    pub fn write_attributes(&self) -> &ClientAttributes {
        &self.props.write_attributes
    }

    /// The authorize endpoint only redirects to an exact registered callback
    pub fn check_redirect(&self, redirect_uri: &str) -> Result<(), CognitoError> {
        if self.callback_urls().iter().any(|u| u == redirect_uri) {
            Ok(())
        } else {
            Err(CognitoError::RedirectMismatch(redirect_uri.to_string()))
        }
    }

    pub fn to_resource(&self) -> Resource {
        let props = &self.props;
        let mut resource = Resource::new(RESOURCE_TYPE)
            .property("UserPoolId", reference(self.user_pool_id.as_str()));

        if let Some(o_auth) = &props.o_auth {
            let flows = o_auth.flows.to_vec();
            let scopes: Vec<&str> = self.scopes.iter().map(OAuthScope::as_str).collect();
            resource = resource
                .property("AllowedOAuthFlows", json!(flows))
                .property("AllowedOAuthFlowsUserPoolClient", !flows.is_empty())
                .property("AllowedOAuthScopes", json!(scopes))
                .property("CallbackURLs", json!(o_auth.callback_urls));
            if !o_auth.logout_urls.is_empty() {
                resource = resource.property("LogoutURLs", json!(o_auth.logout_urls));
            }
        }

        if props.generate_secret {
            resource = resource.property("GenerateSecret", true);
        }
        if !props.read_attributes.is_empty() {
            resource = resource.property("ReadAttributes", json!(props.read_attributes.to_vec()));
        }

        resource = resource.property("SupportedIdentityProviders", json!(["COGNITO"]));
        if !props.write_attributes.is_empty() {
            resource = resource.property("WriteAttributes", json!(props.write_attributes.to_vec()));
        }
        resource
    }
}

fn validate_o_auth(o_auth: &OAuthSettings) -> Result<Vec<OAuthScope>, CognitoError> {
    let flows = o_auth.flows;
    if flows.client_credentials && flows.redirects_users() {
        return Err(CognitoError::InvalidClient(
            "clientCredentials cannot be combined with authorizationCodeGrant or implicitCodeGrant"
                .to_string(),
        ));
    }
    if flows.redirects_users() && o_auth.callback_urls.is_empty() {
        return Err(CognitoError::InvalidClient(
            "callbackUrls must not be empty when codeGrant or implicitGrant OAuth flows are enabled"
                .to_string(),
        ));
    }
    for url in o_auth.callback_urls.iter().chain(&o_auth.logout_urls) {
        validate_callback_url(url)?;
    }

    let mut scopes: Vec<OAuthScope> = Vec::with_capacity(o_auth.scopes.len());
    for scope in &o_auth.scopes {
        if !scopes.contains(scope) {
            scopes.push(scope.clone());
        }
    }
    if !flows.to_vec().is_empty() && scopes.is_empty() {
        return Err(CognitoError::InvalidClient(
            "at least one scope is required when OAuth flows are enabled".to_string(),
        ));
    }
    Ok(scopes)
}

/// Absolute URL without a fragment; plain http only for localhost
fn validate_callback_url(raw: &str) -> Result<(), CognitoError> {
    let invalid = |reason: &str| CognitoError::InvalidCallbackUrl(raw.to_string(), reason.to_string());

    let url = Url::parse(raw).map_err(|e| invalid(&e.to_string()))?;
    if url.fragment().is_some() {
        return Err(invalid("must not contain a fragment"));
    }
    match url.scheme() {
        "https" => Ok(()),
        "http" if url.host_str() == Some("localhost") => Ok(()),
        "http" => Err(invalid("http is only allowed for localhost")),
        // Custom schemes are used by native apps
        _ => Ok(()),
    }
}
