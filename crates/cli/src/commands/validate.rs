//! `validate` command implementation.

use anyhow::{Context, Result};
use config_loader::ConfigLoader;
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<SettingsSummary>,
}

#[derive(Serialize)]
struct SettingsSummary {
    current_protocol: String,
    secure: bool,
    logging_enabled: bool,
    benchmark_enabled: bool,
    audit_active: bool,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating settings");

    let result = validate_settings(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Settings validation failed")
    }
}

impl ValidationResult {
    fn invalid(config_path: String, error: String) -> Self {
        Self {
            valid: false,
            config_path,
            error: Some(error),
            warnings: None,
            summary: None,
        }
    }
}

fn validate_settings(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();
    if !args.config.exists() {
        let error = format!("File not found: {config_path}");
        return ValidationResult::invalid(config_path, error);
    }

    let settings = match ConfigLoader::load_from_path(&args.config) {
        Ok(settings) => settings,
        Err(e) => return ValidationResult::invalid(config_path, e.to_string()),
    };

    let warnings = ConfigLoader::warnings(&settings);
    ValidationResult {
        valid: true,
        config_path,
        error: None,
        warnings: (!warnings.is_empty()).then_some(warnings),
        summary: Some(SettingsSummary {
            current_protocol: settings.protocol.current_key(),
            secure: settings.secure,
            logging_enabled: settings.logging_enabled,
            benchmark_enabled: settings.benchmark_enabled,
            audit_active: settings.audit_active(),
        }),
    }
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Settings are valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Protocol: {}", summary.current_protocol);
            println!("  Secure: {}", summary.secure);
            println!("  Logging: {}", summary.logging_enabled);
            println!("  Benchmark: {}", summary.benchmark_enabled);
            println!("  Audit: {}", summary.audit_active);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Settings are invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
