//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::HubConfig;
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;
use crate::settings::build_config;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    listen: Vec<String>,
    remote: Vec<String>,
    logging: Option<String>,
    status: Option<String>,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!("Validating configuration");

    let result = validate_config(args);

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
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    match build_config(&args.hub) {
        Ok(config) => {
            let warnings = collect_warnings(&config);
            ValidationResult {
                valid: true,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(summarize(&config)),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

fn summarize(config: &HubConfig) -> ConfigSummary {
    ConfigSummary {
        listen: config.listen.iter().map(ToString::to_string).collect(),
        remote: config.remote.iter().map(ToString::to_string).collect(),
        logging: config.logging.enabled.then(|| {
            format!(
                "{} -> {}",
                config.logging.format,
                config.logging.output_path().display()
            )
        }),
        status: config
            .status
            .enabled
            .then(|| format!("{:?}", config.status.format).to_lowercase()),
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(config: &HubConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.endpoint_count() == 1 {
        warnings.push("Only one endpoint configured - data is relayed between its own connections only".to_string());
    }

    for spec in &config.remote {
        if !spec.auto_reconnect {
            warnings.push(format!(
                "Remote {spec} will not reconnect after its first disconnect"
            ));
        }
    }

    if config.engine.chunk_size > config.engine.max_pending_bytes / 2 {
        warnings.push("engine.max_pending_bytes is close to chunk_size - slow peers will be dropped quickly".to_string());
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid");

        if let Some(ref summary) = result.summary {
            for listen in &summary.listen {
                println!("  Listen: {}", listen);
            }
            for remote in &summary.remote {
                println!("  Remote: {}", remote);
            }
            match &summary.logging {
                Some(logging) => println!("  Traffic log: {}", logging),
                None => println!("  Traffic log: disabled"),
            }
            if let Some(ref status) = summary.status {
                println!("  Status: {}", status);
            }
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid");
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
