//! # Observability
//!
//! Tracing and Prometheus metrics for the dispatch core.
//!
//! ```ignore
//! use observability::{LogOutput, ObservabilityConfig};
//!
//! observability::init_with_config(ObservabilityConfig::for_verbosity(1, false))?;
//! observability::record_message_processed("inbound", "set", "success");
//! ```

pub mod metrics;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub use crate::metrics::{
    record_benchmark_latency_ms, record_message_processed, record_protocol_resolved,
    record_stack_cache_size, record_stage_failure, LatencyAggregator, LatencySummary,
    RunningStats, StatsSummary,
};

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// JSON structured logs
    #[default]
    Json,
    Pretty,
    Compact,
}

/// Where formatted log lines go
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogOutput {
    #[default]
    Stdout,
    /// Keeps stdout free for encoded responses
    Stderr,
}

#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub log_format: LogFormat,
    pub log_output: LogOutput,
    /// Filter used when `RUST_LOG` is unset
    pub default_log_level: String,
    /// Ignore `RUST_LOG` and always use `default_log_level`
    pub force_level: bool,
    /// Prometheus port (None = disabled)
    pub metrics_port: Option<u16>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Json,
            log_output: LogOutput::Stdout,
            default_log_level: "info".to_string(),
            force_level: false,
            metrics_port: None,
        }
    }
}

impl ObservabilityConfig {
    /// Command-line style setup: `-v` counts raise the level, quiet pins it
    /// to `warn`, logs go to stderr
    pub fn for_verbosity(verbose: u8, quiet: bool) -> Self {
        let level = match (quiet, verbose) {
            (true, _) => "warn",
            (false, 0) => "info",
            (false, 1) => "debug",
            (false, _) => "trace",
        };
        Self {
            log_output: LogOutput::Stderr,
            default_log_level: level.to_string(),
            force_level: quiet,
            ..Self::default()
        }
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.log_format = format;
        self
    }

    fn filter(&self) -> EnvFilter {
        if self.force_level {
            return EnvFilter::new(&self.default_log_level);
        }
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.default_log_level))
    }

    fn writer(&self) -> BoxMakeWriter {
        match self.log_output {
            LogOutput::Stdout => BoxMakeWriter::new(std::io::stdout),
            LogOutput::Stderr => BoxMakeWriter::new(std::io::stderr),
        }
    }
}

/// JSON logs on stdout, no metrics endpoint
pub fn init() -> Result<()> {
    init_with_config(ObservabilityConfig::default())
}

/// Install the global subscriber and, if configured, the Prometheus recorder
pub fn init_with_config(config: ObservabilityConfig) -> Result<()> {
    let writer = config.writer();
    let layer = match config.log_format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(writer)
            .with_target(true)
            .with_thread_names(true)
            .with_line_number(true)
            .boxed(),
        LogFormat::Pretty => fmt::layer().pretty().with_writer(writer).boxed(),
        LogFormat::Compact => fmt::layer().compact().with_writer(writer).boxed(),
    };

    tracing_subscriber::registry()
        .with(config.filter())
        .with(layer)
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    if let Some(port) = config.metrics_port {
        init_metrics_only(port)?;
    }

    tracing::debug!(
        log_format = ?config.log_format,
        log_output = ?config.log_output,
        metrics_port = ?config.metrics_port,
        "Observability initialized"
    );
    Ok(())
}

/// Install the Prometheus recorder with an HTTP listener on `port`
pub fn init_metrics_only(port: u16) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .context("Failed to install Prometheus recorder")?;

    tracing::info!(port, "Prometheus metrics endpoint initialized");
    Ok(())
}
