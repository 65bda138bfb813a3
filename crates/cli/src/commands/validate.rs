//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{SinkKind, SourceKind, StreamerConfig};
use serde::Serialize;
use std::collections::HashSet;
use tracing::info;

use super::load_config;
use crate::cli::ValidateArgs;
use crate::error::CliError;

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
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    source: String,
    scale: f64,
    sink_count: usize,
    landmark_sink_count: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

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
        Err(CliError::config_invalid(result.error.unwrap_or_default()).into())
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    match load_config(&args.config) {
        Ok(config) => {
            let warnings = collect_warnings(&config);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: (!warnings.is_empty()).then_some(warnings),
                summary: Some(ConfigSummary {
                    version: format!("{:?}", config.version),
                    source: config.globals.source.to_string(),
                    scale: config.globals.scale,
                    sink_count: config.sinks.len(),
                    landmark_sink_count: config
                        .sinks
                        .iter()
                        .filter(|s| s.kind.detector_kind().is_some())
                        .count(),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(config: &StreamerConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.sinks.is_empty() {
        warnings.push("No sinks configured - nothing will be streamed".to_string());
    }

    if config.globals.source == SourceKind::None {
        warnings.push("No source selected - sinks receive blank frames".to_string());
    }

    let mut endpoints = HashSet::new();
    for (index, sink) in config.sinks.iter().enumerate() {
        if let Some(port) = sink.port {
            if !endpoints.insert((sink.address.as_str(), port)) {
                warnings.push(format!(
                    "Sink {index} shares {}:{port} with an earlier sink",
                    sink.address
                ));
            }
        }
        if sink.kind.detector_kind().is_some() && sink.settings.min_entities == 0 {
            warnings.push(format!(
                "Sink {index} ({}) has min_entities = 0 and sends empty payloads when nothing is detected",
                sink.kind
            ));
        }
        if sink.kind == SinkKind::RawVideo && config.globals.scale > 1.0 {
            warnings.push(format!(
                "Sink {index} streams upscaled frames (scale {}) and may exceed the datagram limit",
                config.globals.scale
            ));
        }
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Source: {}", summary.source);
            println!("  Scale: {}", summary.scale);
            println!("  Sinks: {}", summary.sink_count);
            println!("  Landmark sinks: {}", summary.landmark_sink_count);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{SinkSettings, SinkSpec};

    fn spec(kind: SinkKind, port: Option<u16>) -> SinkSpec {
        SinkSpec {
            address: "127.0.0.1".to_string(),
            port,
            kind,
            settings: SinkSettings::default(),
        }
    }

    #[test]
    fn test_warnings_for_empty_config() {
        let warnings = collect_warnings(&StreamerConfig::default());
        assert_eq!(warnings.len(), 2);
    }

    #[test]
    fn test_warns_on_shared_endpoint_and_zero_min_entities() {
        let mut hands = spec(SinkKind::HandLandmarks, Some(11111));
        hands.settings.min_entities = 0;
        let config = StreamerConfig {
            globals: contracts::GlobalSettings {
                source: SourceKind::Device { id: 0 },
                ..Default::default()
            },
            sinks: vec![spec(SinkKind::InfoDictionary, Some(11111)), hands],
            ..Default::default()
        };
        let warnings = collect_warnings(&config);
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].contains("shares 127.0.0.1:11111"));
        assert!(warnings[1].contains("min_entities = 0"));
    }

    #[test]
    fn test_missing_file_is_invalid() {
        let args = ValidateArgs {
            config: "/nonexistent/streamer.toml".into(),
            json: false,
        };
        let result = validate_config(&args);
        assert!(!result.valid);
        assert!(result.error.unwrap().contains("not found"));
    }
}
