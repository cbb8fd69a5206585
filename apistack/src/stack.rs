//! The transactions API stack

use apistack_apigateway::{
    AuthorizationType, CognitoUserPoolsAuthorizer, IdentitySource, LambdaIntegration,
    MethodOptions, RestApi,
};
use apistack_cognito::{
    AccountRecovery, ClientAttributes, OAuthFlows, OAuthScope, OAuthSettings, PasswordPolicy,
    SignInAliases, StandardAttribute, UserPool, UserPoolClient, UserPoolClientProps,
    UserPoolDomain, UserPoolEmail, UserPoolProps,
};
use apistack_core::intrinsic::sub;
use apistack_core::{DeletionPolicy, Output, Stack, StackError};
use apistack_lambda::{Code, Function, FunctionProps, Runtime};
use tracing::info;

use crate::config::StackConfig;

const DESCRIPTION: &str = "Transactions API protected by a Cognito user pool";

/// The declared constructs together with the stack they were rendered into
pub struct ApiStack {
    pub stack: Stack,
    pub user_pool: UserPool,
    pub domain: UserPoolDomain,
    pub client: UserPoolClient,
    pub function: Function,
    pub rest_api: RestApi,
}

/// Evaluate the stack definition
pub fn define(config: &StackConfig) -> Result<ApiStack, StackError> {
    let mut stack = Stack::new(config.stack_name.as_str(), config.env.clone())?
        .with_description(DESCRIPTION);

    let user_pool = UserPool::new(
        "UserPool",
        UserPoolProps {
            account_recovery: AccountRecovery::EmailOnly,
            email: UserPoolEmail::WithCognito { reply_to: None },
            sign_in_aliases: SignInAliases::email_only(),
            password_policy: PasswordPolicy {
                min_length: 6,
                require_digits: true,
                require_lowercase: true,
                require_uppercase: false,
                require_symbols: false,
                temp_password_validity_days: None,
            },
            deletion_protection: true,
            self_sign_up_enabled: true,
            removal_policy: DeletionPolicy::Delete,
        },
    )?;
    stack.add_resource(user_pool.logical_id(), user_pool.to_resource())?;

    let domain = UserPoolDomain::new("UserPoolDomain", &user_pool, &config.auth.domain_prefix)?;
    stack.add_resource(domain.logical_id(), domain.to_resource())?;

    let client = user_pool.add_client(
        "MyDemoAppClient",
        UserPoolClientProps {
            write_attributes: ClientAttributes::new()
                .with_standard_attributes(&[StandardAttribute::Email, StandardAttribute::Name]),
            o_auth: Some(OAuthSettings {
                flows: OAuthFlows {
                    authorization_code_grant: true,
                    implicit_code_grant: true,
                    client_credentials: false,
                },
                scopes: vec![OAuthScope::Email, OAuthScope::Phone, OAuthScope::OpenId],
                callback_urls: vec![config.auth.callback_url.clone()],
                logout_urls: Vec::new(),
            }),
            ..UserPoolClientProps::default()
        },
    )?;
    stack.add_resource(client.logical_id(), client.to_resource())?;

    let runtime: Runtime = config.handler.runtime.parse()?;
    let code = Code::from_asset(&config.handler.asset_path)?;
    let function = Function::new(
        "MyLambdaFunction",
        FunctionProps::new(runtime, code, config.handler.entry_point.as_str()),
    )?;
    stack.add_resource(function.role_logical_id(), function.role_resource())?;
    stack.add_resource(function.logical_id(), function.to_resource())?;

    let authorizer = CognitoUserPoolsAuthorizer::new(
        "CognitoAuthorizer",
        &[&user_pool],
        IdentitySource::header("Authorization"),
    )?;

    let mut rest_api = RestApi::new("MyApiGateway");
    let transactions = rest_api.add_resource(rest_api.root(), "transactions")?;
    rest_api.add_method(
        transactions,
        "GET",
        LambdaIntegration::new(&function).allow_test_invoke(true),
        MethodOptions {
            authorization_type: Some(AuthorizationType::Cognito),
            authorizer: Some(authorizer),
            operation_name: Some("Get All Transactions".to_string()),
            ..MethodOptions::default()
        },
    )?;
    rest_api.synthesize(&mut stack)?;

    stack.add_output(
        "UserPoolId",
        Output {
            value: user_pool.user_pool_id(),
            description: Some("Id of the user pool issuing API tokens".to_string()),
        },
    )?;
    stack.add_output(
        "UserPoolClientId",
        Output {
            value: client.client_id(),
            description: Some("OAuth client id for the hosted UI".to_string()),
        },
    )?;
    stack.add_output(
        "HostedUiBaseUrl",
        Output {
            value: sub(&domain.base_url(&stack.env().region_token())),
            description: Some("Base URL of the hosted sign-in UI".to_string()),
        },
    )?;

    info!(
        stack = %stack.name(),
        resources = stack.template().resources.len(),
        "Stack defined"
    );

    Ok(ApiStack {
        stack,
        user_pool,
        domain,
        client,
        function,
        rest_api,
    })
}

/// Evaluate the stack definition and return the rendered stack
pub fn build_stack(config: &StackConfig) -> Result<Stack, StackError> {
    Ok(define(config)?.stack)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn config_with_asset() -> (tempfile::TempDir, StackConfig) {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("default-handler.js"),
            "exports.main = async () => ({ statusCode: 200, body: '[]' });",
        )
        .unwrap();
        let mut config = StackConfig::default();
        config.handler.asset_path = dir.path().to_path_buf();
        (dir, config)
    }

    #[test]
    fn test_define_declares_every_construct() {
        let (_dir, config) = config_with_asset();
        let defined = define(&config).unwrap();
        assert_eq!(defined.user_pool.logical_id().as_str(), "UserPool6BA7E5F2");
        assert_eq!(defined.domain.logical_id().as_str(), "UserPoolDomain5479B217");
        assert_eq!(defined.client.logical_id().as_str(), "UserPoolMyDemoAppClientAF7E558C");
        assert_eq!(defined.function.logical_id().as_str(), "MyLambdaFunction67CCA873");
        assert_eq!(defined.rest_api.routes().len(), 1);
    }

    #[test]
    fn test_missing_asset_fails() {
        let mut config = StackConfig::default();
        config.handler.asset_path = "/nonexistent/apistack/resources".into();
        let err = build_stack(&config).err().unwrap();
        assert_eq!(err.code, apistack_core::ErrorCode::AssetError);
    }

    #[test]
    fn test_invalid_domain_prefix_fails() {
        let (_dir, mut config) = config_with_asset();
        config.auth.domain_prefix = "my-cognito-demo".to_string();
        let err = build_stack(&config).err().unwrap();
        assert_eq!(err.code, apistack_core::ErrorCode::ValidationError);
    }

    #[test]
    fn test_unknown_runtime_fails() {
        let (_dir, mut config) = config_with_asset();
        config.handler.runtime = "cobol85".to_string();
        assert!(build_stack(&config).is_err());
    }
}
