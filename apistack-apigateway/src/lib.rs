//! API Gateway REST API constructs for apistack
//!
//! Declares a REST API with its resource tree, methods, Cognito user pool
//! authorizers and Lambda proxy integrations, and can serve the declared
//! routes locally behind the same authorization rules.

pub mod authorizer;
pub mod error;
pub mod gateway;
pub mod integration;
pub mod rest_api;

pub use authorizer::{CognitoUserPoolsAuthorizer, IdentitySource};
pub use error::ApiGatewayError;
pub use gateway::{create_router, GatewayState};
pub use integration::LambdaIntegration;
pub use rest_api::{AuthorizationType, MethodOptions, ResourceHandle, RestApi, RouteSpec};
