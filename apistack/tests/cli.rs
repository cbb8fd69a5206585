//! Tests of the apistack commands, in process and through the binary

use std::fs;
use std::path::Path;
use std::process::Command as Process;

use apistack::cli::{self, Args};
use apistack::StackConfig;
use apistack_cognito::{TokenUse, TokenVerifier};
use clap::Parser;
use serde_json::Value;
use tempfile::TempDir;

/// Asset directory plus a config file pointing at it
fn workspace(extra: &str) -> (TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let asset = dir.path().join("resources");
    fs::create_dir_all(&asset).unwrap();
    fs::write(
        asset.join("default-handler.js"),
        "exports.main = async () => ({ statusCode: 200, body: '[]' });",
    )
    .unwrap();

    let config = dir.path().join("apistack.toml");
    fs::write(
        &config,
        format!("{extra}\n[handler]\nasset_path = '{}'\n", asset.display()),
    )
    .unwrap();
    (dir, config)
}

async fn run(args: &[&str]) -> (anyhow::Result<u8>, String) {
    let args = Args::try_parse_from(std::iter::once("apistack").chain(args.iter().copied())).unwrap();
    let mut out = Vec::new();
    let result = cli::run(args, &mut out).await;
    (result, String::from_utf8(out).unwrap())
}

fn read_json(path: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

#[tokio::test]
async fn test_synth_writes_template_archive_and_manifest() {
    let (dir, config) = workspace("");
    let out_dir = dir.path().join("cdk.out");
    let config = config.to_str().unwrap();
    let out_arg = out_dir.to_str().unwrap();

    let (result, stdout) = run(&["--config", config, "synth", "--out", out_arg]).await;
    assert_eq!(result.unwrap(), 0);

    let template_path = out_dir.join("MyApiCdkStack.template.json");
    assert_eq!(stdout.trim(), template_path.display().to_string());
    let template = read_json(&template_path);

    let function = template["Resources"]["MyLambdaFunction67CCA873"]["Properties"]["Code"].clone();
    let s3_key = function["S3Key"].as_str().unwrap();
    let hash = s3_key.strip_suffix(".zip").unwrap();

    let manifest = read_json(&out_dir.join("MyApiCdkStack.assets.json"));
    let asset = &manifest["files"][hash];
    let source = asset["source"]["path"].as_str().unwrap();
    assert_eq!(source, format!("asset.{hash}.zip"));
    assert_eq!(asset["source"]["packaging"], "file");
    let destination = &asset["destinations"]["current_account-current_region"];
    assert_eq!(destination["objectKey"], s3_key);
    assert_eq!(
        destination["bucketName"],
        "cdk-hnb659fds-assets-${AWS::AccountId}-${AWS::Region}"
    );
    assert_eq!(function["S3Bucket"]["Fn::Sub"], destination["bucketName"]);

    // The archive the manifest names exists and holds the handler
    let archive = fs::File::open(out_dir.join(source)).unwrap();
    let mut archive = zip::ZipArchive::new(archive).unwrap();
    assert!(archive.by_name("default-handler.js").is_ok());

    // The template itself is published too
    let template_entry = manifest["files"]
        .as_object()
        .unwrap()
        .values()
        .find(|f| f["source"]["path"] == "MyApiCdkStack.template.json")
        .unwrap();
    assert!(template_entry["destinations"]["current_account-current_region"]["objectKey"]
        .as_str()
        .unwrap()
        .ends_with(".json"));
}

#[tokio::test]
async fn test_synth_yaml_file_name() {
    let (dir, config) = workspace("stack_name = \"AcmeStack\"\n");
    let out_dir = dir.path().join("out");

    let (result, _) = run(&[
        "--config",
        config.to_str().unwrap(),
        "synth",
        "--out",
        out_dir.to_str().unwrap(),
        "--format",
        "yaml",
    ])
    .await;
    assert_eq!(result.unwrap(), 0);
    assert!(out_dir.join("AcmeStack.template.yaml").is_file());
    assert!(out_dir.join("AcmeStack.assets.json").is_file());
}

#[tokio::test]
async fn test_graph_orders_pool_around_children() {
    let (_dir, config) = workspace("");
    let (result, stdout) = run(&["--config", config.to_str().unwrap(), "graph"]).await;
    assert_eq!(result.unwrap(), 0);

    let (deploy, destroy) = stdout.split_once("Destroy order:").unwrap();
    assert!(deploy.starts_with("Deploy order:"));
    let position = |section: &str, id: &str| {
        section
            .lines()
            .position(|line| line.trim_end().ends_with(&format!(". {id}")))
            .unwrap()
    };

    let pool = "UserPool6BA7E5F2";
    for child in ["UserPoolDomain5479B217", "UserPoolMyDemoAppClientAF7E558C"] {
        assert!(position(deploy, pool) < position(deploy, child));
        assert!(position(destroy, child) < position(destroy, pool));
    }
    assert!(
        position(deploy, "MyLambdaFunctionServiceRole313A4D46")
            < position(deploy, "MyLambdaFunction67CCA873")
    );
    assert_eq!(deploy.lines().filter(|l| l.contains(". ")).count(), 13);
}

#[tokio::test]
async fn test_check_password_reports_violations() {
    let (_dir, config) = workspace("");
    let config = config.to_str().unwrap();

    let (result, stdout) = run(&["--config", config, "check-password", "ABC"]).await;
    assert_eq!(result.unwrap(), cli::EXIT_FAILURE);
    assert!(stdout.contains("Password must have length greater than or equal to 6"));
    assert!(stdout.contains("Password must have numeric characters"));
    assert!(stdout.contains("Password must have lowercase characters"));

    let (result, stdout) = run(&["--config", config, "check-password", "secret1"]).await;
    assert_eq!(result.unwrap(), 0);
    assert_eq!(stdout.trim(), "Password satisfies the user pool policy");
}

#[tokio::test]
async fn test_issue_token_is_accepted_by_verifier() {
    let (_dir, config_path) = workspace("");
    let config = StackConfig::load(Some(config_path.as_path())).unwrap();
    let verifier = TokenVerifier::from_secret(
        &config.gateway.region,
        &config.gateway.user_pool_id,
        config.gateway.token_secret.as_bytes(),
    );

    let (result, stdout) = run(&[
        "--config",
        config_path.to_str().unwrap(),
        "issue-token",
        "--sub",
        "alice",
        "--email",
        "alice@example.com",
    ])
    .await;
    assert_eq!(result.unwrap(), 0);
    let claims = verifier.verify(stdout.trim(), &[]).unwrap();
    assert_eq!(claims.sub, "alice");
    assert_eq!(claims.token_use, TokenUse::Id);
    assert_eq!(claims.email.as_deref(), Some("alice@example.com"));

    let (result, stdout) = run(&[
        "--config",
        config_path.to_str().unwrap(),
        "issue-token",
        "--scope",
        "transactions/read",
    ])
    .await;
    assert_eq!(result.unwrap(), 0);
    let claims = verifier
        .verify(stdout.trim(), &["transactions/read".to_string()])
        .unwrap();
    assert_eq!(claims.token_use, TokenUse::Access);
}

#[tokio::test]
async fn test_stack_errors_map_to_exit_codes() {
    let (_dir, config) = workspace("[auth]\ndomain_prefix = \"my-cognito-demo\"\n");
    let (result, _) = run(&["--config", config.to_str().unwrap(), "graph"]).await;
    let err = result.unwrap_err();
    assert_eq!(cli::exit_code(&err), 2);

    let (_dir, config) = workspace("");
    let missing = config.with_file_name("missing.toml");
    let (result, _) = run(&["--config", missing.to_str().unwrap(), "graph"]).await;
    assert_eq!(cli::exit_code(&result.unwrap_err()), cli::EXIT_FAILURE);
}

#[test]
fn test_binary_exit_codes() {
    let (dir, config) = workspace("");
    let binary = env!("CARGO_BIN_EXE_apistack");

    let weak = Process::new(binary)
        .args(["--config", config.to_str().unwrap(), "check-password", "abc"])
        .output()
        .unwrap();
    assert_eq!(weak.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&weak.stdout).contains("numeric characters"));

    let strong = Process::new(binary)
        .args(["--config", config.to_str().unwrap(), "check-password", "secret1"])
        .output()
        .unwrap();
    assert_eq!(strong.status.code(), Some(0));

    let broken = dir.path().join("broken.toml");
    fs::write(&broken, "[handler]\nasset_path = '/nonexistent/apistack/resources'\n").unwrap();
    let failed = Process::new(binary)
        .args(["--config", broken.to_str().unwrap(), "synth", "--out"])
        .arg(dir.path().join("cdk.out"))
        .output()
        .unwrap();
    assert_eq!(failed.status.code(), Some(4));
    // Logs share stderr; the error report is the last line
    let stderr = String::from_utf8_lossy(&failed.stderr);
    let error: Value = serde_json::from_str(stderr.lines().last().unwrap()).unwrap();
    assert_eq!(error["code"], "AssetError");
}
