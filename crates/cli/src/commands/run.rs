//! `run` command implementation.

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::{info, warn};

use contracts::StreamerConfig;

use super::load_config;
use crate::cli::RunArgs;
use crate::error::CliError;
use crate::pipeline::{Pipeline, PipelineConfig};

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    let mut config = load_config(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;
    apply_overrides(&mut config, args)?;

    info!(
        source = %config.globals.source,
        scale = config.globals.scale,
        flip = config.globals.flip_horizontal,
        sinks = config.sinks.len(),
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&config);
        return Ok(());
    }

    if !(args.tick_hz.is_finite() && args.tick_hz > 0.0) {
        return Err(CliError::config_invalid(format!(
            "tick rate must be positive, got {}",
            args.tick_hz
        ))
        .into());
    }

    let pipeline_config = PipelineConfig {
        streamer: config,
        tick_interval: Duration::from_secs_f64(1.0 / args.tick_hz),
        max_ticks: (args.max_ticks > 0).then_some(args.max_ticks),
        timeout: (args.timeout > 0).then(|| Duration::from_secs(args.timeout)),
        metrics_port: (args.metrics_port > 0).then_some(args.metrics_port),
        bind: args.bind.clone(),
        mock_source: args.mock,
        detectors: args.detectors,
    };

    let pipeline = Pipeline::new(pipeline_config);

    info!("Starting streamer...");

    let stats = pipeline
        .run(shutdown_signal())
        .await
        .context("Streamer execution failed")?;

    info!(
        ticks = stats.ticks,
        duration_secs = stats.duration.as_secs_f64(),
        tick_rate = format!("{:.2}", stats.tick_rate()),
        "Streamer stopped"
    );
    stats.print_summary();

    info!("VML Streamer finished");
    Ok(())
}

/// Apply CLI overrides and re-validate
fn apply_overrides(config: &mut StreamerConfig, args: &RunArgs) -> Result<()> {
    if let Some(ref source) = args.source {
        info!(source = %source, "Overriding source from CLI");
        config.globals.source = source.clone();
    }
    if let Some(scale) = args.scale {
        info!(scale, "Overriding scale from CLI");
        config.globals.scale = scale;
    }
    config_loader::ConfigLoader::validate(config)
        .map_err(|e| CliError::config_invalid(e.to_string()))?;
    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    warn!("Received shutdown signal, stopping streamer...");
}

/// Print configuration summary for dry-run mode
fn print_config_summary(config: &StreamerConfig) {
    println!("\n=== Configuration Summary ===\n");
    println!("Globals:");
    println!("  Source: {}", config.globals.source);
    println!("  Scale: {}", config.globals.scale);
    println!("  Flip horizontal: {}", config.globals.flip_horizontal);
    println!("  Smoothing: {}", config.globals.smoothing_enabled);

    if !config.sinks.is_empty() {
        println!("\nSinks ({}):", config.sinks.len());
        for (index, sink) in config.sinks.iter().enumerate() {
            let port = sink
                .port
                .map(|p| p.to_string())
                .unwrap_or_else(|| "auto".to_string());
            println!("  [{index}] {} -> {}:{}", sink.kind, sink.address, port);
        }
    }

    println!();
}
