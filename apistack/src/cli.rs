//! Command line interface

use anyhow::Context;
use apistack_cognito::TokenIssuer;
use apistack_core::StackError;
use clap::{Parser, Subcommand};
use std::io::Write;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::StackConfig;
use crate::synth::{synthesize, Assembly, TemplateFormat};
use crate::{serve, stack};

/// Exit status of a command that ran but reported a failure
pub const EXIT_FAILURE: u8 = 1;

#[derive(Parser, Debug)]
#[command(name = "apistack")]
#[command(about = "Cognito-protected transactions API stack", long_about = None)]
pub struct Args {
    /// Configuration file (defaults to ./apistack.toml when present)
    #[arg(short, long, env = "APISTACK_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "APISTACK_LOG_LEVEL", global = true)]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Write the template, staged assets and asset manifest
    Synth {
        /// Output directory
        #[arg(short, long, default_value = "cdk.out")]
        out: PathBuf,

        #[arg(long, value_enum, default_value_t = TemplateFormat::Json)]
        format: TemplateFormat,
    },

    /// Print deploy and destroy order of the stack's resources
    Graph,

    /// Check a password against the user pool's password policy
    CheckPassword { password: String },

    /// Serve the API locally behind the Cognito authorizer
    Serve {
        /// Port to listen on
        #[arg(short, long, env = "APISTACK_PORT")]
        port: Option<u16>,

        /// Host to bind to
        #[arg(long, env = "APISTACK_HOST")]
        host: Option<String>,
    },

    /// Issue a token accepted by the local gate
    IssueToken {
        #[arg(long, default_value = "local-user")]
        sub: String,

        #[arg(long, default_value = "local-user@example.com")]
        email: String,

        /// Issue an access token with these scopes instead of an ID token
        #[arg(long)]
        scope: Vec<String>,

        /// Lifetime in seconds
        #[arg(long, default_value = "3600")]
        ttl: i64,
    },
}

/// Run a parsed command, writing its report to `out`
///
/// Returns the process exit status. Errors carry a [`StackError`] when
/// synthesis failed; see [`exit_code`].
pub async fn run(args: Args, out: &mut impl Write) -> anyhow::Result<u8> {
    let config = StackConfig::load(args.config.as_deref())?;

    match args.command {
        Command::Synth { out: dir, format } => {
            let assembly = synth(&config, &dir, format)?;
            writeln!(out, "{}", assembly.template.display())?;
            Ok(0)
        }
        Command::Graph => {
            graph(&config, out)?;
            Ok(0)
        }
        Command::CheckPassword { password } => check_password(&config, &password, out),
        Command::Serve { port, host } => {
            serve_local(&config, host, port).await?;
            Ok(0)
        }
        Command::IssueToken {
            sub,
            email,
            scope,
            ttl,
        } => {
            let token = issue_token(&config, &sub, &email, &scope, ttl)?;
            writeln!(out, "{token}")?;
            Ok(0)
        }
    }
}

/// Exit status for an error returned by [`run`]
pub fn exit_code(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<StackError>()
        .and_then(|e| u8::try_from(e.code.exit_code()).ok())
        .unwrap_or(EXIT_FAILURE)
}

pub fn synth(config: &StackConfig, dir: &Path, format: TemplateFormat) -> anyhow::Result<Assembly> {
    let assembly = synthesize(config, dir, format)?;
    info!(path = %assembly.template.display(), "Template written");
    Ok(assembly)
}

/// Print the numbered deploy and destroy orders
pub fn graph(config: &StackConfig, out: &mut impl Write) -> anyhow::Result<()> {
    let built = stack::build_stack(config)?;
    let graph = built.dependency_graph()?;

    writeln!(out, "Deploy order:")?;
    for (i, id) in graph.deploy_order().iter().enumerate() {
        writeln!(out, "  {:>2}. {id}", i + 1)?;
    }
    writeln!(out, "Destroy order:")?;
    for (i, id) in graph.destroy_order().iter().enumerate() {
        writeln!(out, "  {:>2}. {id}", i + 1)?;
    }
    Ok(())
}

/// Print every policy violation; non-zero status when there are any
pub fn check_password(
    config: &StackConfig,
    password: &str,
    out: &mut impl Write,
) -> anyhow::Result<u8> {
    let defined = stack::define(config)?;
    if let Err(violations) = defined.user_pool.password_policy().validate(password) {
        for violation in violations {
            writeln!(out, "{violation}")?;
        }
        return Ok(EXIT_FAILURE);
    }
    writeln!(out, "Password satisfies the user pool policy")?;
    Ok(0)
}

/// Sign an ID token, or an access token when scopes are given
pub fn issue_token(
    config: &StackConfig,
    sub: &str,
    email: &str,
    scopes: &[String],
    ttl: i64,
) -> anyhow::Result<String> {
    let defined = stack::define(config)?;
    let gateway = &config.gateway;
    let issuer = TokenIssuer::new(
        &gateway.region,
        &gateway.user_pool_id,
        gateway.token_secret.as_bytes(),
    );
    let client_id = defined.client.logical_id().to_string();

    let token = if scopes.is_empty() {
        issuer.issue_id_token(sub, email, &client_id, ttl)?
    } else {
        let scopes: Vec<&str> = scopes.iter().map(String::as_str).collect();
        issuer.issue_access_token(sub, &client_id, &scopes, ttl)?
    };
    Ok(token)
}

async fn serve_local(
    config: &StackConfig,
    host: Option<String>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    let defined = stack::define(config)?;
    let app = serve::echo_router(&defined, config);

    let host = host.unwrap_or_else(|| config.gateway.host.clone());
    let port = port.unwrap_or(config.gateway.port);
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .with_context(|| format!("invalid listen address {host}:{port}"))?;

    for route in defined.rest_api.routes() {
        info!(
            method = %route.http_method,
            path = %format!("/{}{}", defined.rest_api.stage_name(), route.resource_path),
            authorization = route.authorization_type.as_str(),
            "Route"
        );
    }
    warn!("Requests are answered by an echo handler, not the function asset");
    info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
