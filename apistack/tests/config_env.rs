//! Environment overrides of the stack configuration
//!
//! Kept in its own test binary since the process environment is shared by
//! every test in a binary.

use apistack::StackConfig;
use std::fs;

#[test]
fn test_environment_overrides_file_and_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("apistack.toml");
    fs::write(
        &path,
        r#"
stack_name = "FromFile"

[auth]
domain_prefix = "from-file"
"#,
    )
    .unwrap();

    std::env::set_var("APISTACK_AUTH__DOMAIN_PREFIX", "acme-auth");
    std::env::set_var("APISTACK_GATEWAY__REGION", "eu-west-1");
    std::env::set_var("APISTACK_STACK_NAME", "AcmeStack");

    let from_env = StackConfig::load(None);
    let from_file = StackConfig::load(Some(path.as_path()));

    std::env::remove_var("APISTACK_AUTH__DOMAIN_PREFIX");
    std::env::remove_var("APISTACK_GATEWAY__REGION");
    std::env::remove_var("APISTACK_STACK_NAME");

    let from_env = from_env.unwrap();
    assert_eq!(from_env.auth.domain_prefix, "acme-auth");
    assert_eq!(from_env.gateway.region, "eu-west-1");
    assert_eq!(from_env.stack_name, "AcmeStack");
    assert_eq!(from_env.auth.callback_url, "https://example.com/callback");

    let from_file = from_file.unwrap();
    assert_eq!(from_file.auth.domain_prefix, "acme-auth");
    assert_eq!(from_file.stack_name, "AcmeStack");

    let defaults = StackConfig::load(None).unwrap();
    assert_eq!(defaults.auth.domain_prefix, "mydemoauth123");
}
