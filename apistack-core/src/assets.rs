//! Asset manifest written next to the template
//!
//! The manifest tells the publisher which staged files to upload and where.
//! Destinations name the bootstrap stack's assets bucket and publishing role,
//! with deploy-time placeholders for an environment-agnostic stack.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::env::StackEnv;
use crate::error::StackError;

/// Qualifier of the default bootstrap stack
pub const BOOTSTRAP_QUALIFIER: &str = "hnb659fds";

/// Bucket the bootstrap stack creates for file assets
pub const ASSETS_BUCKET: &str = "cdk-hnb659fds-assets-${AWS::AccountId}-${AWS::Region}";

/// Cloud assembly schema version of the manifest
pub const MANIFEST_VERSION: &str = "36.0.0";

/// How the publisher treats a staged source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Packaging {
    /// Upload the file as is
    File,
    /// Zip the directory before upload
    Zip,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetSource {
    /// Path relative to the output directory
    pub path: String,
    pub packaging: Packaging,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetDestination {
    pub bucket_name: String,
    pub object_key: String,
    pub assume_role_arn: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAsset {
    pub source: AssetSource,
    pub destinations: BTreeMap<String, AssetDestination>,
}

/// `<Stack>.assets.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetManifest {
    pub version: String,
    pub files: BTreeMap<String, FileAsset>,
    #[serde(default)]
    pub docker_images: BTreeMap<String, serde_json::Value>,
}

impl Default for AssetManifest {
    fn default() -> Self {
        Self {
            version: MANIFEST_VERSION.to_string(),
            files: BTreeMap::new(),
            docker_images: BTreeMap::new(),
        }
    }
}

impl AssetManifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a staged file under its content hash
    pub fn add_file(
        &mut self,
        env: &StackEnv,
        hash: impl Into<String>,
        source: AssetSource,
        object_key: impl Into<String>,
    ) {
        let destination = AssetDestination {
            bucket_name: ASSETS_BUCKET
                .replace("${AWS::AccountId}", &env.account_token())
                .replace("${AWS::Region}", &env.region_token()),
            object_key: object_key.into(),
            assume_role_arn: format!(
                "arn:${{AWS::Partition}}:iam::{}:role/cdk-{BOOTSTRAP_QUALIFIER}-file-publishing-role-{}-{}",
                env.account_token(),
                env.account_token(),
                env.region_token()
            ),
        };

        let mut destinations = BTreeMap::new();
        destinations.insert(destination_id(env), destination);
        self.files.insert(
            hash.into(),
            FileAsset {
                source,
                destinations,
            },
        );
    }

    pub fn to_json(&self) -> Result<String, StackError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// File name of a stack's asset manifest
pub fn manifest_file_name(stack_name: &str) -> String {
    format!("{stack_name}.assets.json")
}

fn destination_id(env: &StackEnv) -> String {
    match (&env.account_id, &env.region) {
        (Some(account), Some(region)) => format!("{account}-{region}"),
        _ => "current_account-current_region".to_string(),
    }
}
