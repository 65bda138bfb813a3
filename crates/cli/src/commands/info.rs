//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::ConfigSnapshot;
use dispatcher::SinkRegistry;
use serde::Serialize;
use tracing::info;

use super::load_config;
use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    globals: GlobalsInfo,
    sinks: Vec<SinkInfo>,
}

#[derive(Serialize)]
struct GlobalsInfo {
    source_type: String,
    source_file: String,
    scale: f64,
    flip_horizontal: bool,
    smoothing_enabled: bool,
}

#[derive(Serialize)]
struct SinkInfo {
    index: usize,
    sink_type: String,
    address: String,
    port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    settings: Option<SettingsInfo>,
}

#[derive(Serialize)]
struct SettingsInfo {
    smoothing: bool,
    smoothing_strength: f64,
    min_entities: usize,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    let config = load_config(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    // Resolve default ports the same way the running streamer does
    let snapshot = SinkRegistry::from_config(&config).snapshot();
    let info = build_config_info(&format!("{:?}", config.version), &snapshot, args.settings);

    if args.json {
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&info);
    }

    Ok(())
}

fn build_config_info(version: &str, snapshot: &ConfigSnapshot, settings: bool) -> ConfigInfo {
    let globals = &snapshot.globals;
    ConfigInfo {
        version: version.to_string(),
        globals: GlobalsInfo {
            source_type: globals.source.source_type().to_string(),
            source_file: globals.source.source_file(),
            scale: globals.scale,
            flip_horizontal: globals.flip_horizontal,
            smoothing_enabled: globals.smoothing_enabled,
        },
        sinks: snapshot
            .sinks
            .iter()
            .map(|s| SinkInfo {
                index: s.index,
                sink_type: s.kind.label().to_string(),
                address: s.address.clone(),
                port: s.port,
                settings: (settings && s.kind.detector_kind().is_some()).then(|| SettingsInfo {
                    smoothing: s.settings.smoothing,
                    smoothing_strength: s.settings.smoothing_strength,
                    min_entities: s.settings.min_entities,
                }),
            })
            .collect(),
    }
}

fn print_config_info(info: &ConfigInfo) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║               VML Streamer Configuration                     ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    let globals = &info.globals;
    println!("🎥 Source");
    println!("   ├─ Version: {}", info.version);
    if globals.source_file.is_empty() {
        println!("   ├─ Type: {}", globals.source_type);
    } else {
        println!("   ├─ Type: {} ({})", globals.source_type, globals.source_file);
    }
    println!("   ├─ Scale: {}", globals.scale);
    println!("   ├─ Flip Horizontal: {}", globals.flip_horizontal);
    println!("   └─ Smoothing: {}", globals.smoothing_enabled);

    println!("\n📤 Sinks ({})", info.sinks.len());
    for (i, sink) in info.sinks.iter().enumerate() {
        let is_last = i == info.sinks.len() - 1;
        let prefix = if is_last { "└─" } else { "├─" };
        let child_prefix = if is_last { "   " } else { "│  " };

        println!(
            "   {} [{}] {} -> {}:{}",
            prefix, sink.index, sink.sink_type, sink.address, sink.port
        );
        if let Some(ref settings) = sink.settings {
            println!(
                "   {}  └─ smoothing: {} (strength {}), min entities: {}",
                child_prefix, settings.smoothing, settings.smoothing_strength, settings.min_entities
            );
        }
    }

    println!();
}
