//! apistack - synthesize and serve the transactions API stack

use apistack::cli::{self, Args};
use apistack_core::StackError;
use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("apistack={},tower_http=debug", args.log_level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut stdout = std::io::stdout();
    match cli::run(args, &mut stdout).await {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            match err.downcast_ref::<StackError>() {
                Some(stack_err) => eprintln!("{}", stack_err.to_json()),
                None => eprintln!("Error: {err:#}"),
            }
            ExitCode::from(cli::exit_code(&err))
        }
    }
}
