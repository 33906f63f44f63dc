//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// pubsub-dispatch - message-dispatch core of a pub/sub server
#[derive(Parser, Debug)]
#[command(
    name = "pubsub-dispatch",
    author,
    version,
    about = "Pub/sub message-dispatch core",
    long_about = "Validates dispatch settings, shows the stage stacks they compile to, \n\
                  and replays recorded client traffic through the dispatch service."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "PUBSUB_DISPATCH_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "PUBSUB_DISPATCH_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Replay recorded messages through the dispatch service
    Replay(ReplayArgs),

    /// Validate a settings file
    Validate(ValidateArgs),

    /// Show registered protocols and compiled stacks
    Info(InfoArgs),
}

/// Arguments for the `replay` command
#[derive(Parser, Debug, Clone)]
pub struct ReplayArgs {
    /// Path to settings file (TOML or JSON)
    #[arg(
        short,
        long,
        default_value = "dispatch.toml",
        env = "PUBSUB_DISPATCH_CONFIG"
    )]
    pub config: PathBuf,

    /// JSON-lines file of recorded messages ("-" for stdin)
    #[arg(short, long, default_value = "-")]
    pub input: PathBuf,

    /// Protocol for records that do not name one (default: current version)
    #[arg(long, env = "PUBSUB_DISPATCH_PROTOCOL")]
    pub protocol: Option<String>,

    /// Maximum number of records to replay (0 = unlimited)
    #[arg(long, default_value = "0")]
    pub limit: u64,

    /// Print every encoded response as a JSON line
    #[arg(long)]
    pub responses: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "PUBSUB_DISPATCH_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to settings file to validate
    #[arg(short, long, default_value = "dispatch.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to settings file
    #[arg(short, long, default_value = "dispatch.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Request options (JSON object) used when compiling the stacks
    #[arg(long)]
    pub options: Option<String>,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}
