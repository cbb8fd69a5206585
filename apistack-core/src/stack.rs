//! A named stack holding one template

use tracing::info;

use crate::env::StackEnv;
use crate::error::{ErrorCode, StackError};
use crate::graph::DependencyGraph;
use crate::logical_id::LogicalId;
use crate::template::{Output, Resource, Template};

/// Stack names follow the provider's rules: letters, digits and hyphens,
/// starting with a letter, at most 128 characters.
fn validate_stack_name(name: &str) -> Result<(), StackError> {
    let valid = !name.is_empty()
        && name.len() <= 128
        && name.starts_with(|c: char| c.is_ascii_alphabetic())
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
    if valid {
        Ok(())
    } else {
        Err(StackError::new(
            ErrorCode::ValidationError,
            format!("Invalid stack name '{name}'"),
        ))
    }
}

#[derive(Debug, Clone)]
pub struct Stack {
    name: String,
    env: StackEnv,
    template: Template,
}

impl Stack {
    pub fn new(name: impl Into<String>, env: StackEnv) -> Result<Self, StackError> {
        let name = name.into();
        validate_stack_name(&name)?;
        Ok(Self {
            name,
            env,
            template: Template::new(),
        })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.template.description = Some(description.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn env(&self) -> &StackEnv {
        &self.env
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    pub fn add_resource(&mut self, id: &LogicalId, resource: Resource) -> Result<(), StackError> {
        self.template.add_resource(id, resource)
    }

    pub fn add_output(&mut self, name: &str, output: Output) -> Result<(), StackError> {
        self.template.add_output(name, output)
    }

    pub fn dependency_graph(&self) -> Result<DependencyGraph, StackError> {
        DependencyGraph::from_template(&self.template)
    }

    /// Validate the graph and render the template as JSON
    pub fn to_json(&self) -> Result<String, StackError> {
        self.dependency_graph()?;
        info!(stack = %self.name, resources = self.template.resources.len(), "Synthesized stack");
        self.template.to_json()
    }

    /// Validate the graph and render the template as YAML
    pub fn to_yaml(&self) -> Result<String, StackError> {
        self.dependency_graph()?;
        info!(stack = %self.name, resources = self.template.resources.len(), "Synthesized stack");
        self.template.to_yaml()
    }

    /// File name the orchestrator expects for this stack's template
    pub fn template_file_name(&self, extension: &str) -> String {
        format!("{}.template.{extension}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intrinsic::reference;

    #[test]
    fn test_stack_name_validation() {
        assert!(Stack::new("MyApiCdkStack", StackEnv::agnostic()).is_ok());
        assert!(Stack::new("my-api-stack", StackEnv::agnostic()).is_ok());
        assert!(Stack::new("", StackEnv::agnostic()).is_err());
        assert!(Stack::new("1stack", StackEnv::agnostic()).is_err());
        assert!(Stack::new("my_stack", StackEnv::agnostic()).is_err());
    }

    #[test]
    fn test_to_json_rejects_dangling_reference() {
        let mut stack = Stack::new("Test", StackEnv::agnostic()).unwrap();
        stack
            .add_resource(
                &LogicalId::literal("Client"),
                Resource::new("AWS::Cognito::UserPoolClient").property("UserPoolId", reference("Nope")),
            )
            .unwrap();
        assert_eq!(stack.to_json().unwrap_err().code, ErrorCode::DanglingReference);
    }

    #[test]
    fn test_template_file_name() {
        let stack = Stack::new("MyApiCdkStack", StackEnv::agnostic())
            .unwrap()
            .with_description("demo");
        assert_eq!(stack.template_file_name("json"), "MyApiCdkStack.template.json");
        assert_eq!(stack.template().description.as_deref(), Some("demo"));
        assert!(stack.to_yaml().unwrap().contains("AWSTemplateFormatVersion"));
    }
}
