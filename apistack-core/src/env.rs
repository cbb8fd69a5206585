//! Account and region the stack is synthesized for

use serde::{Deserialize, Serialize};

/// Target environment of a stack
///
/// When `account_id` or `region` are unset, the template refers to the
/// deploy-time pseudo parameters instead of literals.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct StackEnv {
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
}

impl StackEnv {
    pub fn new(account_id: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            account_id: Some(account_id.into()),
            region: Some(region.into()),
        }
    }

    /// Environment-agnostic stack
    pub fn agnostic() -> Self {
        Self::default()
    }

    /// Region literal, or `${AWS::Region}` for use inside `Fn::Sub`
    pub fn region_token(&self) -> String {
        self.region
            .clone()
            .unwrap_or_else(|| "${AWS::Region}".to_string())
    }

    /// Account literal, or `${AWS::AccountId}` for use inside `Fn::Sub`
    pub fn account_token(&self) -> String {
        self.account_id
            .clone()
            .unwrap_or_else(|| "${AWS::AccountId}".to_string())
    }

    pub fn is_agnostic(&self) -> bool {
        self.account_id.is_none() || self.region.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agnostic_tokens() {
        let env = StackEnv::agnostic();
        assert!(env.is_agnostic());
        assert_eq!(env.region_token(), "${AWS::Region}");
        assert_eq!(env.account_token(), "${AWS::AccountId}");
    }

    #[test]
    fn test_concrete_tokens() {
        let env = StackEnv::new("123456789012", "eu-west-1");
        assert!(!env.is_agnostic());
        assert_eq!(env.region_token(), "eu-west-1");
        assert_eq!(env.account_token(), "123456789012");
    }
}
