//! Cognito user pool constructs for apistack
//!
//! Declares the user pool, its hosted UI domain and OAuth clients, and checks
//! the tokens the pool issues the same way the gateway authorizer does.

pub mod client;
pub mod domain;
pub mod error;
pub mod password;
pub mod token;
pub mod user_pool;

pub use client::{ClientAttributes, OAuthFlows, OAuthScope, OAuthSettings, StandardAttribute, UserPoolClient, UserPoolClientProps};
pub use domain::UserPoolDomain;
pub use error::CognitoError;
pub use password::{PasswordPolicy, PasswordViolation};
pub use token::{CognitoClaims, TokenIssuer, TokenUse, TokenVerifier};
pub use user_pool::{AccountRecovery, SignInAliases, UserPool, UserPoolEmail, UserPoolProps};
