//! Configuration management

use apistack_core::StackEnv;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct StackConfig {
    #[serde(default = "default_stack_name")]
    pub stack_name: String,

    /// Leave unset for an environment-agnostic template
    #[serde(default)]
    pub env: StackEnv,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub handler: HandlerConfig,

    #[serde(default)]
    pub gateway: GatewayConfig,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            stack_name: default_stack_name(),
            env: StackEnv::default(),
            auth: AuthConfig::default(),
            handler: HandlerConfig::default(),
            gateway: GatewayConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Hosted UI prefix; globally unique per region
    #[serde(default = "default_domain_prefix")]
    pub domain_prefix: String,

    #[serde(default = "default_callback_url")]
    pub callback_url: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            domain_prefix: default_domain_prefix(),
            callback_url: default_callback_url(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HandlerConfig {
    #[serde(default = "default_asset_path")]
    pub asset_path: PathBuf,

    #[serde(default = "default_entry_point")]
    pub entry_point: String,

    #[serde(default = "default_runtime")]
    pub runtime: String,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            asset_path: default_asset_path(),
            entry_point: default_entry_point(),
            runtime: default_runtime(),
        }
    }
}

/// Settings for serving the API locally
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_region")]
    pub region: String,

    #[serde(default = "default_user_pool_id")]
    pub user_pool_id: String,

    /// HS256 key shared by `issue-token` and the local gate
    #[serde(default = "default_token_secret")]
    pub token_secret: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            region: default_region(),
            user_pool_id: default_user_pool_id(),
            token_secret: default_token_secret(),
        }
    }
}

fn default_stack_name() -> String {
    "MyApiCdkStack".to_string()
}

fn default_domain_prefix() -> String {
    "mydemoauth123".to_string()
}

fn default_callback_url() -> String {
    "https://example.com/callback".to_string()
}

fn default_asset_path() -> PathBuf {
    PathBuf::from("resources")
}

fn default_entry_point() -> String {
    "default-handler.main".to_string()
}

fn default_runtime() -> String {
    "nodejs18.x".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_user_pool_id() -> String {
    "us-east-1_apistack".to_string()
}

fn default_token_secret() -> String {
    "apistack-local-secret".to_string()
}

impl StackConfig {
    /// Load configuration from file and environment
    ///
    /// Without an explicit path, `apistack.toml` in the working directory is
    /// used when present. `APISTACK_AUTH__DOMAIN_PREFIX` style variables
    /// override file values.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name("apistack").required(false),
        };

        let config = config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix("APISTACK")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        Ok(config.try_deserialize::<StackConfig>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StackConfig::default();
        assert_eq!(config.stack_name, "MyApiCdkStack");
        assert_eq!(config.auth.domain_prefix, "mydemoauth123");
        assert_eq!(config.auth.callback_url, "https://example.com/callback");
        assert_eq!(config.handler.asset_path, PathBuf::from("resources"));
        assert_eq!(config.handler.entry_point, "default-handler.main");
        assert_eq!(config.handler.runtime, "nodejs18.x");
        assert!(config.env.is_agnostic());
    }

    #[test]
    fn test_partial_sections_keep_defaults() {
        let config: StackConfig = serde_json::from_value(serde_json::json!({
            "auth": { "domain_prefix": "acme-auth" },
            "env": { "region": "eu-west-1" }
        }))
        .unwrap();
        assert_eq!(config.auth.domain_prefix, "acme-auth");
        assert_eq!(config.auth.callback_url, "https://example.com/callback");
        assert_eq!(config.env.region.as_deref(), Some("eu-west-1"));
        assert_eq!(config.gateway.port, 3000);
    }
}
