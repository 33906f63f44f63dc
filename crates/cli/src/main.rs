//! pubsub-dispatch command-line entry point

mod adapter;
mod cli;
mod commands;
mod error;
mod replay;

use anyhow::Result;
use clap::Parser;
use observability::ObservabilityConfig;
use tracing::info;

use cli::{Cli, Commands};
use commands::{run_info, run_replay, run_validate};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    observability::init_with_config(
        ObservabilityConfig::for_verbosity(cli.verbose, cli.quiet).with_format(cli.log_format.into()),
    )?;

    info!(version = env!("CARGO_PKG_VERSION"), "pubsub-dispatch starting");

    let result = match &cli.command {
        Commands::Replay(args) => run_replay(args).await,
        Commands::Validate(args) => run_validate(args),
        Commands::Info(args) => run_info(args),
    };

    if let Err(ref e) = result {
        tracing::error!(error = %e, "Command failed");
    }
    result
}
