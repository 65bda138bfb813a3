//! Pipeline orchestrator - assembles and runs the streamer.
//!
//! Wires the frame source, sink registry, UDP transport and detectors into a
//! dispatcher and drives it until shutdown, timeout or the tick limit.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use contracts::{DetectorKind, LandmarkDetector, StreamerConfig};
use dispatcher::{DispatcherBuilder, DispatcherConfig, SinkRegistry, UdpTransport};
use ingestion::{FrameSource, FrameSourceConfig, MockOpener, SyntheticConfig};
use landmark_engine::{default_script, MockDetector};
use observability::{
    record_source_info, record_source_switch, record_tick_metrics, StreamMetricsAggregator,
};
use tracing::{info, warn};

use super::PipelineStats;
use crate::cli::DetectorBackend;
use crate::error::CliError;

/// Ticks between source status samples
const SOURCE_SAMPLE_TICKS: u64 = 30;

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Loaded and validated configuration
    pub streamer: StreamerConfig,

    pub tick_interval: Duration,

    /// Maximum number of ticks (None = unlimited)
    pub max_ticks: Option<u64>,

    /// Run timeout (None = no timeout)
    pub timeout: Option<Duration>,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,

    /// Local UDP address
    pub bind: String,

    /// Use synthetic capture instead of devices and files
    pub mock_source: bool,

    pub detectors: DetectorBackend,
}

/// Main pipeline orchestrator
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a new pipeline with the given configuration
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run until `shutdown` resolves, the timeout elapses or the tick limit is hit
    pub async fn run<S>(self, shutdown: S) -> Result<PipelineStats>
    where
        S: Future<Output = ()> + Send,
    {
        let start_time = Instant::now();
        let config = self.config;

        if let Some(port) = config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        let registry = Arc::new(SinkRegistry::from_config(&config.streamer));
        let source = Arc::new(build_source(config.mock_source));
        let transport = UdpTransport::bind_to("vml-streamer", &config.bind)
            .await
            .map_err(|e| CliError::transport(&config.bind, e.to_string()))?;
        let detectors = build_detectors(config.detectors)?;

        info!(
            sinks = registry.len(),
            detectors = detectors.len(),
            mock_source = config.mock_source,
            bind = %config.bind,
            "Streamer assembled"
        );

        let mut builder = DispatcherBuilder::new(registry.clone(), source.clone(), transport).config(
            DispatcherConfig {
                tick_interval: config.tick_interval,
                max_ticks: config.max_ticks,
                ..Default::default()
            },
        );
        let detector_count = detectors.len();
        for detector in detectors {
            builder = builder.detector(detector);
        }
        let dispatcher = builder.build();

        let mut aggregator = StreamMetricsAggregator::new();
        let mut last_ingestion = source.metrics();
        let sampled = source.clone();
        let on_tick = |report: &contracts::TickReport| {
            record_tick_metrics(report);
            aggregator.update(report);

            let ingestion = sampled.metrics();
            if ingestion.source_switches != last_ingestion.source_switches
                || ingestion.open_failures != last_ingestion.open_failures
            {
                let success = ingestion.open_failures == last_ingestion.open_failures;
                record_source_switch(sampled.kind().source_type(), success);
                last_ingestion = ingestion;
            }
            if report.tick % SOURCE_SAMPLE_TICKS == 0 {
                record_source_info(&sampled.info());
            }
        };

        let timeout = config.timeout;
        let stop = async move {
            match timeout {
                Some(limit) => {
                    tokio::select! {
                        _ = shutdown => {}
                        _ = tokio::time::sleep(limit) => {
                            warn!(timeout_secs = limit.as_secs(), "Streamer timeout reached");
                        }
                    }
                }
                None => shutdown.await,
            }
        };

        let dispatcher = dispatcher.run(on_tick, stop).await;

        let ticks = dispatcher.ticks();
        let sink_metrics = dispatcher.metrics();
        let ingestion = source.metrics();

        let stopping = source.clone();
        tokio::task::spawn_blocking(move || stopping.stop())
            .await
            .context("Frame source shutdown task failed")?;

        let stats = PipelineStats {
            ticks,
            duration: start_time.elapsed(),
            active_sinks: registry.len(),
            active_detectors: detector_count,
            frames_captured: ingestion.frames_captured,
            read_failures: ingestion.read_failures,
            stream_metrics: aggregator,
            sink_metrics,
        };

        info!(
            ticks = stats.ticks,
            frames_captured = stats.frames_captured,
            "Streamer shut down"
        );
        Ok(stats)
    }
}

fn build_source(mock: bool) -> FrameSource {
    let config = FrameSourceConfig::default();
    if mock {
        info!("Running with synthetic capture (no camera or video decoder required)");
        FrameSource::new(Arc::new(MockOpener::new(SyntheticConfig::default())), config)
    } else {
        FrameSource::with_default_opener(config)
    }
}

fn build_detectors(backend: DetectorBackend) -> Result<Vec<Arc<dyn LandmarkDetector>>> {
    let mut detectors: Vec<Arc<dyn LandmarkDetector>> = Vec::new();
    for kind in DetectorKind::ALL {
        match backend {
            DetectorBackend::None => {}
            DetectorBackend::Inline => {
                detectors.push(Arc::new(MockDetector::inline(kind, default_script(kind))));
            }
            DetectorBackend::Threaded => {
                let detector = MockDetector::threaded(kind, default_script(kind))
                    .map_err(|e| CliError::detector(kind.as_str(), e.to_string()))?;
                detectors.push(Arc::new(detector));
            }
        }
    }
    Ok(detectors)
}
