//! CloudFormation template model

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ErrorCode, StackError};
use crate::logical_id::LogicalId;

pub const TEMPLATE_FORMAT_VERSION: &str = "2010-09-09";

/// What the provider does with a resource when it leaves the stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeletionPolicy {
    Delete,
    Retain,
    Snapshot,
}

/// A single resource entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Resource {
    #[serde(rename = "Type")]
    pub resource_type: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub properties: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_replace_policy: Option<DeletionPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_policy: Option<DeletionPolicy>,
}

impl Resource {
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            properties: Map::new(),
            depends_on: Vec::new(),
            update_replace_policy: None,
            deletion_policy: None,
        }
    }

    /// Set a property, skipping `null`
    pub fn property(mut self, name: &str, value: impl Into<Value>) -> Self {
        let value = value.into();
        if !value.is_null() {
            self.properties.insert(name.to_string(), value);
        }
        self
    }

    pub fn depends_on(mut self, logical_id: &LogicalId) -> Self {
        let id = logical_id.to_string();
        if !self.depends_on.contains(&id) {
            self.depends_on.push(id);
        }
        self
    }

    /// Apply the same policy on deletion and on replacement
    pub fn removal_policy(mut self, policy: DeletionPolicy) -> Self {
        self.update_replace_policy = Some(policy);
        self.deletion_policy = Some(policy);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }
}

/// A stack output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Output {
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A full template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    #[serde(rename = "AWSTemplateFormatVersion")]
    pub format_version: String,
    #[serde(rename = "Description", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "Resources")]
    pub resources: Map<String, Value>,
    #[serde(rename = "Outputs", default, skip_serializing_if = "Map::is_empty")]
    pub outputs: Map<String, Value>,
}

impl Default for Template {
    fn default() -> Self {
        Self::new()
    }
}

impl Template {
    pub fn new() -> Self {
        Self {
            format_version: TEMPLATE_FORMAT_VERSION.to_string(),
            description: None,
            resources: Map::new(),
            outputs: Map::new(),
        }
    }

    /// Add a resource; logical ids must be unique within the template
    pub fn add_resource(&mut self, id: &LogicalId, resource: Resource) -> Result<(), StackError> {
        if self.resources.contains_key(id.as_str()) {
            return Err(StackError::new(
                ErrorCode::DuplicateLogicalId,
                format!("Logical id {id} is already defined"),
            )
            .with_resource(id.as_str()));
        }
        self.resources
            .insert(id.to_string(), serde_json::to_value(resource)?);
        Ok(())
    }

    pub fn add_output(&mut self, name: &str, output: Output) -> Result<(), StackError> {
        if self.outputs.contains_key(name) {
            return Err(StackError::new(
                ErrorCode::DuplicateLogicalId,
                format!("Output {name} is already defined"),
            ));
        }
        self.outputs
            .insert(name.to_string(), serde_json::to_value(output)?);
        Ok(())
    }

    /// Typed view of a resource entry
    pub fn resource(&self, id: &str) -> Option<Resource> {
        self.resources
            .get(id)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// All resources of one type, in declaration order
    pub fn resources_of_type(&self, resource_type: &str) -> Vec<(String, Resource)> {
        self.resources
            .keys()
            .filter_map(|id| self.resource(id).map(|r| (id.clone(), r)))
            .filter(|(_, r)| r.resource_type == resource_type)
            .collect()
    }

    pub fn to_json(&self) -> Result<String, StackError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_yaml(&self) -> Result<String, StackError> {
        Ok(serde_yaml::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intrinsic::reference;

    #[test]
    fn test_resource_serialization() {
        let resource = Resource::new("AWS::Cognito::UserPoolDomain")
            .property("Domain", "mydemoauth123")
            .property("UserPoolId", reference("UserPool6BA7E5F2"))
            .property("CustomDomainConfig", Value::Null);

        let json = serde_json::to_value(&resource).unwrap();
        assert_eq!(json["Type"], "AWS::Cognito::UserPoolDomain");
        assert_eq!(json["Properties"]["Domain"], "mydemoauth123");
        assert!(json["Properties"].get("CustomDomainConfig").is_none());
        assert!(json.get("DependsOn").is_none());
        assert!(json.get("DeletionPolicy").is_none());
    }

    #[test]
    fn test_removal_policy_sets_both() {
        let resource = Resource::new("AWS::Cognito::UserPool").removal_policy(DeletionPolicy::Delete);
        let json = serde_json::to_value(&resource).unwrap();
        assert_eq!(json["DeletionPolicy"], "Delete");
        assert_eq!(json["UpdateReplacePolicy"], "Delete");
    }

    #[test]
    fn test_duplicate_logical_id_rejected() {
        let mut template = Template::new();
        let id = LogicalId::literal("Thing");
        template.add_resource(&id, Resource::new("AWS::SNS::Topic")).unwrap();
        let err = template
            .add_resource(&id, Resource::new("AWS::SNS::Topic"))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::DuplicateLogicalId);
    }

    #[test]
    fn test_template_round_trips_through_typed_view() {
        let mut template = Template::new();
        let id = LogicalId::literal("Role");
        template
            .add_resource(&id, Resource::new("AWS::IAM::Role").depends_on(&LogicalId::literal("Other")))
            .unwrap();

        let role = template.resource("Role").unwrap();
        assert_eq!(role.depends_on, vec!["Other".to_string()]);
        assert_eq!(template.resources_of_type("AWS::IAM::Role").len(), 1);
        assert!(template.to_json().unwrap().contains("AWSTemplateFormatVersion"));
    }
}
