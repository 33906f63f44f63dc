//! `info` command implementation.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use contracts::{Action, Options, Request};
use dispatcher::DispatchService;
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::adapter::{build_service, load_settings};
use crate::cli::InfoArgs;
use crate::error::CliError;

/// Service layout for JSON output
#[derive(Serialize)]
struct ServiceInfo {
    current_protocol: String,
    protocols: Vec<String>,
    /// Stage names per action, in execution order
    inbound: BTreeMap<String, Vec<String>>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading service info");

    let settings = load_settings(&args.config)
        .with_context(|| format!("Failed to load settings from {}", args.config.display()))?;
    let options = parse_options(args.options.as_deref())?;
    let service = build_service(settings)?;
    let info = build_service_info(&service, options.as_ref());

    if args.json {
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize service info")?;
        println!("{}", json);
    } else {
        print_service_info(&info);
    }

    Ok(())
}

fn parse_options(raw: Option<&str>) -> Result<Option<Options>, CliError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    match serde_json::from_str(raw) {
        Ok(Value::Object(options)) => Ok(Some(options)),
        Ok(_) => Err(CliError::invalid_argument("--options must be a JSON object")),
        Err(e) => Err(CliError::invalid_argument(format!("--options: {e}"))),
    }
}

fn build_service_info(service: &DispatchService, options: Option<&Options>) -> ServiceInfo {
    let inbound = Action::ALL
        .into_iter()
        .map(|action| {
            let mut request = Request::new(action);
            request.options = options.cloned();
            let stages = service
                .inbound_stack(&request)
                .iter()
                .map(|stage| stage.name().to_string())
                .collect();
            (action.as_str().to_string(), stages)
        })
        .collect();

    ServiceInfo {
        current_protocol: service.current_protocol().to_string(),
        protocols: service.stats().protocols,
        inbound,
    }
}

fn print_service_info(info: &ServiceInfo) {
    println!("=== Dispatch Service ===\n");
    println!("Protocols");
    println!("   ├─ Current: {}", info.current_protocol);
    println!("   └─ Registered: {}", info.protocols.join(", "));

    println!("\nInbound stacks ({})", info.inbound.len());
    let last = info.inbound.len().saturating_sub(1);
    for (i, (action, stages)) in info.inbound.iter().enumerate() {
        let prefix = if i == last { "└─" } else { "├─" };
        let stages = if stages.is_empty() {
            "(empty)".to_string()
        } else {
            stages.join(" → ")
        };
        println!("   {} {}: {}", prefix, action, stages);
    }
    println!();
}
