mod cli;
mod commands;
mod error;
mod output;

use clap::Parser;
use tickergate_core::RouterBuilder;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("TICKERGATE_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(error) = run().await {
        eprintln!("error: {error}");
        std::process::exit(error.exit_code());
    }
}

async fn run() -> Result<(), CliError> {
    let cli = Cli::parse();

    let builder = if cli.offline {
        RouterBuilder::offline()
    } else {
        RouterBuilder::from_env()
    };
    let router = builder.build();

    let envelope = commands::run(&cli, &router).await?;
    output::render(&envelope, cli.format, cli.pretty)?;

    if !envelope.is_success() {
        std::process::exit(4);
    }

    Ok(())
}
