//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use contracts::SourceKind;
use std::path::PathBuf;

/// VML Streamer - real-time landmark streaming over UDP
#[derive(Parser, Debug)]
#[command(
    name = "vml-streamer",
    author,
    version,
    about = "Real-time landmark streamer",
    long_about = "Captures frames from a camera or video file, runs hand, body and face \n\
                  landmark detectors, and streams frames, source metadata and landmark \n\
                  sets as UDP datagrams to the configured sinks."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "VML_STREAMER_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "VML_STREAMER_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the streamer
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(
        short,
        long,
        default_value = "config.toml",
        env = "VML_STREAMER_CONFIG"
    )]
    pub config: PathBuf,

    /// Override the frame source: `none`, `device:<id>`, `file:<path>`, a device id or a path
    #[arg(long, value_parser = parse_source, env = "VML_STREAMER_SOURCE")]
    pub source: Option<SourceKind>,

    /// Override the output scale
    #[arg(long, env = "VML_STREAMER_SCALE")]
    pub scale: Option<f64>,

    /// Dispatch ticks per second
    #[arg(long, default_value = "30", env = "VML_STREAMER_TICK_HZ")]
    pub tick_hz: f64,

    /// Maximum number of ticks to run (0 = unlimited)
    #[arg(long, default_value = "0", env = "VML_STREAMER_MAX_TICKS")]
    pub max_ticks: u64,

    /// Run timeout in seconds (0 = no timeout)
    #[arg(long, default_value = "0", env = "VML_STREAMER_TIMEOUT")]
    pub timeout: u64,

    /// Local address of the UDP socket
    #[arg(long, default_value = "0.0.0.0:0", env = "VML_STREAMER_BIND")]
    pub bind: String,

    /// Replace capture devices and files with a synthetic test pattern
    #[arg(long, env = "VML_STREAMER_MOCK")]
    pub mock: bool,

    /// Landmark detector backend
    #[arg(long, value_enum, default_value = "threaded", env = "VML_STREAMER_DETECTORS")]
    pub detectors: DetectorBackend,

    /// Validate configuration and exit without streaming
    #[arg(long)]
    pub dry_run: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "9000", env = "VML_STREAMER_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show per-sink settings
    #[arg(long)]
    pub settings: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => observability::LogFormat::Json,
            LogFormat::Pretty => observability::LogFormat::Pretty,
            LogFormat::Compact => observability::LogFormat::Compact,
        }
    }
}

/// Which landmark detectors to register
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DetectorBackend {
    /// Synthetic detectors completing on worker threads
    #[default]
    Threaded,
    /// Synthetic detectors completing synchronously
    Inline,
    /// No detectors; landmark sinks stay idle
    None,
}

/// Parse a `--source` value
pub fn parse_source(value: &str) -> Result<SourceKind, String> {
    let value = value.trim();
    if value.is_empty() {
        return Err("source must not be empty".to_string());
    }
    if value.eq_ignore_ascii_case("none") {
        return Ok(SourceKind::None);
    }
    if let Some(id) = value.strip_prefix("device:") {
        return id
            .parse()
            .map(|id| SourceKind::Device { id })
            .map_err(|_| format!("invalid device id '{id}'"));
    }
    if let Some(path) = value.strip_prefix("file:") {
        return Ok(SourceKind::File {
            path: PathBuf::from(path),
        });
    }
    match value.parse() {
        Ok(id) => Ok(SourceKind::Device { id }),
        Err(_) => Ok(SourceKind::File {
            path: PathBuf::from(value),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_source_forms() {
        assert_eq!(parse_source("none").unwrap(), SourceKind::None);
        assert_eq!(parse_source("device:2").unwrap(), SourceKind::Device { id: 2 });
        assert_eq!(parse_source("1").unwrap(), SourceKind::Device { id: 1 });
        assert_eq!(
            parse_source("file:clip.mp4").unwrap(),
            SourceKind::File {
                path: PathBuf::from("clip.mp4")
            }
        );
        assert_eq!(
            parse_source("videos/take3.mjpeg").unwrap(),
            SourceKind::File {
                path: PathBuf::from("videos/take3.mjpeg")
            }
        );
    }

    #[test]
    fn test_parse_source_rejects_bad_values() {
        assert!(parse_source("").is_err());
        assert!(parse_source("device:cam").is_err());
    }

    #[test]
    fn test_run_args_defaults() {
        let cli = Cli::try_parse_from(["vml-streamer", "run", "--mock", "--source", "device:0"]).unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("expected run command");
        };
        assert!(args.mock);
        assert_eq!(args.source, Some(SourceKind::Device { id: 0 }));
        assert_eq!(args.tick_hz, 30.0);
        assert_eq!(args.detectors, DetectorBackend::Threaded);
        assert_eq!(args.config, PathBuf::from("config.toml"));
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["vml-streamer", "-q", "-v", "validate"]).is_err());
    }
}
