//! REST API construct
//!
//! Holds the resource tree, methods and authorizers of one API and renders
//! them, together with the deployment, stage and Lambda invoke permissions
//! they imply, into a stack.

use apistack_core::intrinsic::{account_id, get_att, join, partition, reference, region, url_suffix};
use apistack_core::{LogicalId, Output, Resource, Stack, StackError};
use md5::{Digest, Md5};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};
use tracing::debug;

use crate::authorizer::CognitoUserPoolsAuthorizer;
use crate::error::ApiGatewayError;
use crate::integration::LambdaIntegration;

pub const RESOURCE_TYPE: &str = "AWS::ApiGateway::RestApi";

const DEFAULT_STAGE: &str = "prod";
const HTTP_METHODS: [&str; 8] = ["ANY", "DELETE", "GET", "HEAD", "OPTIONS", "PATCH", "POST", "PUT"];

static PATH_PART_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9._\-]+$|^\{[a-zA-Z0-9._\-]+\+?\}$").expect("valid regex")
});

/// How callers of a method are authorized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthorizationType {
    #[default]
    None,
    Iam,
    Custom,
    Cognito,
}

impl AuthorizationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Iam => "AWS_IAM",
            Self::Custom => "CUSTOM",
            Self::Cognito => "COGNITO_USER_POOLS",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MethodOptions {
    pub authorization_type: Option<AuthorizationType>,
    pub authorizer: Option<CognitoUserPoolsAuthorizer>,
    pub authorization_scopes: Vec<String>,
    pub operation_name: Option<String>,
}

/// Index of a resource within its API; the root is always 0
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceHandle(usize);

#[derive(Debug, Clone)]
struct ApiResource {
    parent: Option<usize>,
    path_part: String,
    /// Construct path below the API, e.g. `["transactions"]`
    construct_path: Vec<String>,
}

#[derive(Debug, Clone)]
struct ApiMethod {
    resource: usize,
    http_method: String,
    integration: LambdaIntegration,
    authorization_type: AuthorizationType,
    authorizer: Option<usize>,
    authorization_scopes: Vec<String>,
    operation_name: Option<String>,
}

/// A declared route as the local gate sees it
#[derive(Debug, Clone)]
pub struct RouteSpec {
    pub http_method: String,
    pub resource_path: String,
    pub resource_id: String,
    pub operation_name: Option<String>,
    pub authorization_type: AuthorizationType,
    pub authorization_scopes: Vec<String>,
    /// Header carrying the token for Cognito-authorized routes
    pub identity_header: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RestApi {
    construct_id: String,
    logical_id: LogicalId,
    name: String,
    stage_name: String,
    resources: Vec<ApiResource>,
    methods: Vec<ApiMethod>,
    authorizers: Vec<CognitoUserPoolsAuthorizer>,
}

impl RestApi {
    pub fn new(construct_id: &str) -> Self {
        Self {
            construct_id: construct_id.to_string(),
            logical_id: LogicalId::from_path(&[construct_id, "Resource"]),
            name: construct_id.to_string(),
            stage_name: DEFAULT_STAGE.to_string(),
            resources: vec![ApiResource {
                parent: None,
                path_part: String::new(),
                construct_path: Vec::new(),
            }],
            methods: Vec::new(),
            authorizers: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_stage_name(mut self, stage_name: impl Into<String>) -> Self {
        self.stage_name = stage_name.into();
        self
    }

    pub fn logical_id(&self) -> &LogicalId {
        &self.logical_id
    }

    pub fn stage_name(&self) -> &str {
        &self.stage_name
    }

    pub fn root(&self) -> ResourceHandle {
        ResourceHandle(0)
    }

    pub fn add_resource(
        &mut self,
        parent: ResourceHandle,
        path_part: &str,
    ) -> Result<ResourceHandle, ApiGatewayError> {
        let parent_resource = self
            .resources
            .get(parent.0)
            .ok_or(ApiGatewayError::UnknownResource(parent.0))?;
        if !PATH_PART_RE.is_match(path_part) {
            return Err(ApiGatewayError::InvalidPathPart(path_part.to_string()));
        }
        if self
            .resources
            .iter()
            .any(|r| r.parent == Some(parent.0) && r.path_part == path_part)
        {
            return Err(ApiGatewayError::DuplicateResource(format!(
                "{}/{path_part}",
                self.full_path(parent.0).trim_end_matches('/')
            )));
        }

        let mut construct_path = parent_resource.construct_path.clone();
        construct_path.push(path_part.to_string());
        self.resources.push(ApiResource {
            parent: Some(parent.0),
            path_part: path_part.to_string(),
            construct_path,
        });
        Ok(ResourceHandle(self.resources.len() - 1))
    }

    pub fn add_method(
        &mut self,
        resource: ResourceHandle,
        http_method: &str,
        integration: LambdaIntegration,
        options: MethodOptions,
    ) -> Result<(), ApiGatewayError> {
        if resource.0 >= self.resources.len() {
            return Err(ApiGatewayError::UnknownResource(resource.0));
        }
        let http_method = http_method.to_uppercase();
        if !HTTP_METHODS.contains(&http_method.as_str()) {
            return Err(ApiGatewayError::InvalidHttpMethod(http_method));
        }
        if self
            .methods
            .iter()
            .any(|m| m.resource == resource.0 && m.http_method == http_method)
        {
            return Err(ApiGatewayError::DuplicateMethod(
                http_method,
                self.full_path(resource.0),
            ));
        }

        let authorization_type = resolve_authorization_type(&options)?;
        let authorizer = options.authorizer.map(|a| self.bind_authorizer(a));

        self.methods.push(ApiMethod {
            resource: resource.0,
            http_method,
            integration,
            authorization_type,
            authorizer,
            authorization_scopes: options.authorization_scopes,
            operation_name: options.operation_name,
        });
        Ok(())
    }

    /// Attach an authorizer to this API, reusing it if already attached
    fn bind_authorizer(&mut self, authorizer: CognitoUserPoolsAuthorizer) -> usize {
        if let Some(index) = self
            .authorizers
            .iter()
            .position(|a| a.logical_id() == authorizer.logical_id())
        {
            return index;
        }
        self.authorizers.push(authorizer);
        self.authorizers.len() - 1
    }

    /// Absolute path of a resource, `/` for the root
    fn full_path(&self, index: usize) -> String {
        let mut parts = Vec::new();
        let mut current = Some(index);
        while let Some(i) = current {
            let resource = &self.resources[i];
            if resource.parent.is_some() {
                parts.push(resource.path_part.as_str());
            }
            current = resource.parent;
        }
        parts.reverse();
        format!("/{}", parts.join("/"))
    }

    pub fn path_of(&self, resource: ResourceHandle) -> Option<String> {
        (resource.0 < self.resources.len()).then(|| self.full_path(resource.0))
    }

    /// Construct path of a resource relative to the stack
    fn resource_construct_path(&self, index: usize) -> Vec<String> {
        let mut path = vec![self.construct_id.clone(), "Default".to_string()];
        path.extend(self.resources[index].construct_path.iter().cloned());
        path
    }

    fn resource_logical_id(&self, index: usize) -> LogicalId {
        let mut path = self.resource_construct_path(index);
        path.push("Resource".to_string());
        LogicalId::from_path(&path)
    }

    /// `ResourceId`/`ParentId` value: root comes from the API itself
    fn resource_ref(&self, index: usize) -> Value {
        if self.resources[index].parent.is_none() {
            get_att(self.logical_id.as_str(), "RootResourceId")
        } else {
            reference(self.resource_logical_id(index).as_str())
        }
    }

    fn method_logical_id(&self, method: &ApiMethod) -> LogicalId {
        let mut path = self.resource_construct_path(method.resource);
        path.push(method.http_method.clone());
        path.push("Resource".to_string());
        LogicalId::from_path(&path)
    }

    /// Stack-wide unique id of the API, part of its permission ids
    pub fn unique_id(&self, stack_name: &str) -> LogicalId {
        LogicalId::from_path(&[stack_name, self.construct_id.as_str()])
    }

    fn permission_logical_id(&self, method: &ApiMethod, test: bool, api_id: &LogicalId) -> LogicalId {
        let suffix = format!(
            "ApiPermission.{}{api_id}.{}.{}",
            if test { "Test." } else { "" },
            method.http_method,
            self.full_path(method.resource).replace('/', ".")
        );
        let mut path = self.resource_construct_path(method.resource);
        path.push(method.http_method.clone());
        path.push(suffix);
        LogicalId::from_path(&path)
    }

    pub fn deployment_stage_logical_id(&self) -> LogicalId {
        LogicalId::from_path(&[
            self.construct_id.clone(),
            format!("DeploymentStage.{}", self.stage_name),
            "Resource".to_string(),
        ])
    }

    /// The deployment id embeds a hash of the API definition, so any change
    /// to methods or resources produces a new deployment
    fn deployment_logical_id(&self, definition: &[Value]) -> LogicalId {
        let base = LogicalId::from_path(&[self.construct_id.as_str(), "Deployment", "Resource"]);
        let digest = Md5::digest(Value::Array(definition.to_vec()).to_string().as_bytes());
        LogicalId::literal(format!("{base}{}", hex::encode(digest)))
    }

    /// `arn:...:execute-api:region:account:api/stage/METHOD/path`
    fn execute_api_arn(&self, stage: Value, method: &ApiMethod) -> Value {
        let verb = if method.http_method == "ANY" { "*" } else { method.http_method.as_str() };
        join("", vec![
            json!("arn:"),
            partition(),
            json!(":execute-api:"),
            region(),
            json!(":"),
            account_id(),
            json!(":"),
            reference(self.logical_id.as_str()),
            json!("/"),
            stage,
            json!(format!("/{verb}{}", self.full_path(method.resource))),
        ])
    }

    /// Routes as seen by callers, for serving the API locally
    pub fn routes(&self) -> Vec<RouteSpec> {
        self.methods
            .iter()
            .map(|m| RouteSpec {
                http_method: m.http_method.clone(),
                resource_path: self.full_path(m.resource),
                resource_id: self.resource_logical_id(m.resource).to_string(),
                operation_name: m.operation_name.clone(),
                authorization_type: m.authorization_type,
                authorization_scopes: m.authorization_scopes.clone(),
                identity_header: m
                    .authorizer
                    .and_then(|i| self.authorizers[i].identity_source().header_name())
                    .map(str::to_string),
            })
            .collect()
    }

    /// Add every resource of this API to the stack
    pub fn synthesize(&self, stack: &mut Stack) -> Result<(), StackError> {
        stack.add_resource(
            &self.logical_id,
            Resource::new(RESOURCE_TYPE).property("Name", self.name.as_str()),
        )?;

        let mut definition = Vec::new();
        let mut deployment_deps = Vec::new();

        for index in 1..self.resources.len() {
            let id = self.resource_logical_id(index);
            let resource = &self.resources[index];
            let parent = resource.parent.unwrap_or(0);
            let entry = Resource::new("AWS::ApiGateway::Resource")
                .property("ParentId", self.resource_ref(parent))
                .property("PathPart", resource.path_part.as_str())
                .property("RestApiId", reference(self.logical_id.as_str()));
            definition.push(json!({ "id": id.as_str(), "path": self.full_path(index) }));
            stack.add_resource(&id, entry)?;
            deployment_deps.push(id);
        }

        for authorizer in &self.authorizers {
            let name = authorizer.unique_id(stack.name());
            stack.add_resource(
                authorizer.logical_id(),
                authorizer.to_resource(&self.logical_id, name.as_str()),
            )?;
        }

        for method in &self.methods {
            let id = self.method_logical_id(method);
            let mut entry = Resource::new("AWS::ApiGateway::Method")
                .property("AuthorizationType", method.authorization_type.as_str());
            if !method.authorization_scopes.is_empty() {
                entry = entry.property("AuthorizationScopes", json!(method.authorization_scopes));
            }
            if let Some(index) = method.authorizer {
                entry = entry.property(
                    "AuthorizerId",
                    reference(self.authorizers[index].logical_id().as_str()),
                );
            }
            let entry = entry
                .property("HttpMethod", method.http_method.as_str())
                .property("Integration", method.integration.to_cfn())
                .property("OperationName", json!(method.operation_name))
                .property("ResourceId", self.resource_ref(method.resource))
                .property("RestApiId", reference(self.logical_id.as_str()));

            definition.push(json!({ "id": id.as_str(), "properties": entry.properties }));
            stack.add_resource(&id, entry)?;
            deployment_deps.push(id);

            let stage_ref = reference(self.deployment_stage_logical_id().as_str());
            self.add_permission(stack, method, false, stage_ref)?;
            if method.integration.allows_test_invoke() {
                self.add_permission(stack, method, true, json!("test-invoke-stage"))?;
            }
        }

        let deployment_id = self.deployment_logical_id(&definition);
        let mut deployment = Resource::new("AWS::ApiGateway::Deployment")
            .property("Description", "Automatically created by the RestApi construct")
            .property("RestApiId", reference(self.logical_id.as_str()));
        for dep in &deployment_deps {
            deployment = deployment.depends_on(dep);
        }
        stack.add_resource(&deployment_id, deployment)?;

        let stage_id = self.deployment_stage_logical_id();
        stack.add_resource(
            &stage_id,
            Resource::new("AWS::ApiGateway::Stage")
                .property("DeploymentId", reference(deployment_id.as_str()))
                .property("RestApiId", reference(self.logical_id.as_str()))
                .property("StageName", self.stage_name.as_str()),
        )?;

        let endpoint_id = LogicalId::from_path(&[self.construct_id.as_str(), "Endpoint"]);
        stack.add_output(
            endpoint_id.as_str(),
            Output {
                value: join("", vec![
                    json!("https://"),
                    reference(self.logical_id.as_str()),
                    json!(".execute-api."),
                    region(),
                    json!("."),
                    url_suffix(),
                    json!("/"),
                    reference(stage_id.as_str()),
                    json!("/"),
                ]),
                description: None,
            },
        )?;

        debug!(
            api = %self.logical_id,
            resources = self.resources.len() - 1,
            methods = self.methods.len(),
            "Synthesized REST API"
        );
        Ok(())
    }

    fn add_permission(
        &self,
        stack: &mut Stack,
        method: &ApiMethod,
        test: bool,
        stage: Value,
    ) -> Result<(), StackError> {
        stack.add_resource(
            &self.permission_logical_id(method, test, &self.unique_id(stack.name())),
            Resource::new("AWS::Lambda::Permission")
                .property("Action", "lambda:InvokeFunction")
                .property("FunctionName", method.integration.function_arn().clone())
                .property("Principal", "apigateway.amazonaws.com")
                .property("SourceArn", self.execute_api_arn(stage, method)),
        )
    }
}

/// Effective authorization type of a method; an authorizer decides it
fn resolve_authorization_type(options: &MethodOptions) -> Result<AuthorizationType, ApiGatewayError> {
    let resolved = match (&options.authorizer, options.authorization_type) {
        (Some(_), None | Some(AuthorizationType::Cognito)) => AuthorizationType::Cognito,
        (Some(_), Some(other)) => {
            return Err(ApiGatewayError::InvalidMethodOptions(format!(
                "authorizationType {} does not match the Cognito authorizer",
                other.as_str()
            )));
        }
        (None, Some(AuthorizationType::Cognito)) => {
            return Err(ApiGatewayError::InvalidMethodOptions(
                "authorizationType COGNITO_USER_POOLS requires an authorizer".to_string(),
            ));
        }
        (None, other) => other.unwrap_or_default(),
    };

    if !options.authorization_scopes.is_empty() && resolved != AuthorizationType::Cognito {
        return Err(ApiGatewayError::InvalidMethodOptions(
            "authorizationScopes can only be used with a Cognito authorizer".to_string(),
        ));
    }
    Ok(resolved)
}
