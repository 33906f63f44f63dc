//! `replay` command implementation.

use anyhow::{Context, Result};
use tracing::info;

use crate::adapter::load_settings;
use crate::cli::ReplayArgs;
use crate::replay::{Replay, ReplayConfig};

/// Execute the `replay` command
pub async fn run_replay(args: &ReplayArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading settings");

    let settings = load_settings(&args.config)
        .with_context(|| format!("Failed to load settings from {}", args.config.display()))?;

    info!(
        current_protocol = %settings.protocol.current_key(),
        secure = settings.secure,
        logging = settings.logging_enabled,
        benchmark = settings.benchmark_enabled,
        input = %args.input.display(),
        "Settings loaded"
    );

    let config = ReplayConfig {
        settings,
        input: args.input.clone(),
        default_protocol: args.protocol.clone(),
        limit: if args.limit == 0 {
            None
        } else {
            Some(args.limit)
        },
        print_responses: args.responses,
        metrics_port: if args.metrics_port == 0 {
            None
        } else {
            Some(args.metrics_port)
        },
    };

    let stats = Replay::new(config)
        .run()
        .await
        .context("Replay failed")?;

    info!(
        processed = stats.processed,
        failed = stats.failed,
        malformed = stats.malformed,
        duration_secs = stats.duration.as_secs_f64(),
        "Replay completed"
    );
    stats.print_summary();

    Ok(())
}
