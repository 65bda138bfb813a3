//! Streamer metric recording and run statistics
//!
//! Recorders publish through the `metrics` facade; `StreamMetricsAggregator`
//! keeps an in-memory summary of a run.

use contracts::{SourceInfo, TickReport};
use metrics::{counter, gauge, histogram};

/// Record one dispatch tick
///
/// # Example
///
/// ```ignore
/// let report = dispatcher.tick().await;
/// record_tick_metrics(&report);
/// ```
pub fn record_tick_metrics(report: &TickReport) {
    counter!("vml_streamer_ticks_total").increment(1);
    gauge!("vml_streamer_last_tick").set(report.tick as f64);
    histogram!("vml_streamer_tick_duration_ms").record(report.duration_ms);

    if !report.frame_read {
        counter!("vml_streamer_ticks_skipped_total").increment(1);
        return;
    }

    if report.detections > 0 {
        counter!("vml_streamer_detections_total").increment(report.detections as u64);
    }
    if report.idle > 0 {
        counter!("vml_streamer_sinks_idle_total").increment(report.idle as u64);
    }
    if report.invalidated {
        counter!("vml_streamer_reindex_total").increment(1);
    }
    gauge!("vml_streamer_source_fps").set(report.source_fps);
}

/// Record the state of the frame source
pub fn record_source_info(info: &SourceInfo) {
    gauge!("vml_streamer_frame_width").set(info.width as f64);
    gauge!("vml_streamer_frame_height").set(info.height as f64);
    gauge!("vml_streamer_source_fps").set(info.fps);
    if info.kind.is_file() {
        gauge!("vml_streamer_playback_position").set(info.position as f64);
    }
}

/// Record a source switch attempt
pub fn record_source_switch(source_type: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "vml_streamer_source_switches_total",
        "source_type" => source_type.to_string(),
        "status" => status
    )
    .increment(1);
}

/// In-memory aggregate of tick reports
#[derive(Debug, Clone, Default)]
pub struct StreamMetricsAggregator {
    pub total_ticks: u64,

    /// Ticks that had a frame to dispatch
    pub ticks_with_frame: u64,

    pub total_sent: u64,
    pub total_replayed: u64,
    pub total_failed: u64,
    pub total_idle: u64,
    pub total_detections: u64,
    pub reindexes: u64,

    /// Tick wall time (ms)
    pub tick_duration: RunningStats,

    /// Source throughput sampled per tick
    pub source_fps: RunningStats,
}

impl StreamMetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, report: &TickReport) {
        self.total_ticks += 1;
        self.tick_duration.push(report.duration_ms);
        if !report.frame_read {
            return;
        }
        self.ticks_with_frame += 1;
        self.total_sent += report.sent as u64;
        self.total_replayed += report.replayed as u64;
        self.total_failed += report.failed as u64;
        self.total_idle += report.idle as u64;
        self.total_detections += report.detections as u64;
        if report.invalidated {
            self.reindexes += 1;
        }
        self.source_fps.push(report.source_fps);
    }

    pub fn summary(&self) -> MetricsSummary {
        let attempts = self.total_sent + self.total_replayed + self.total_failed;
        MetricsSummary {
            total_ticks: self.total_ticks,
            ticks_with_frame: self.ticks_with_frame,
            total_sent: self.total_sent,
            total_replayed: self.total_replayed,
            total_failed: self.total_failed,
            total_idle: self.total_idle,
            total_detections: self.total_detections,
            reindexes: self.reindexes,
            skip_rate: percent(self.total_ticks - self.ticks_with_frame, self.total_ticks),
            replay_rate: percent(self.total_replayed, attempts),
            tick_duration_ms: StatsSummary::from(&self.tick_duration),
            source_fps: StatsSummary::from(&self.source_fps),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

fn percent(part: u64, whole: u64) -> f64 {
    if whole > 0 {
        part as f64 / whole as f64 * 100.0
    } else {
        0.0
    }
}

/// Run summary
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub total_ticks: u64,
    pub ticks_with_frame: u64,
    pub total_sent: u64,
    pub total_replayed: u64,
    pub total_failed: u64,
    pub total_idle: u64,
    pub total_detections: u64,
    pub reindexes: u64,
    /// Ticks without a frame (%)
    pub skip_rate: f64,
    /// Delivered datagrams that were cache replays (%)
    pub replay_rate: f64,
    pub tick_duration_ms: StatsSummary,
    pub source_fps: StatsSummary,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Streamer Metrics Summary ===")?;
        writeln!(f, "Ticks: {} ({:.2}% skipped)", self.total_ticks, self.skip_rate)?;
        writeln!(f, "Datagrams sent: {}", self.total_sent)?;
        writeln!(
            f,
            "Cache replays: {} ({:.2}%)",
            self.total_replayed, self.replay_rate
        )?;
        writeln!(f, "Send failures: {}", self.total_failed)?;
        writeln!(f, "Idle sink ticks: {}", self.total_idle)?;
        writeln!(f, "Detections: {}", self.total_detections)?;
        writeln!(f, "Reindexes: {}", self.reindexes)?;
        writeln!(f, "Tick duration (ms): {}", self.tick_duration_ms)?;
        writeln!(f, "Source fps: {}", self.source_fps)?;
        Ok(())
    }
}

/// Statistics summary
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online statistics (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        if !value.is_finite() {
            return;
        }
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::default();
        for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
            stats.push(v);
        }
        stats.push(f64::NAN);

        assert_eq!(stats.count(), 5);
        assert!((stats.mean() - 3.0).abs() < 1e-10);
        assert!((stats.min() - 1.0).abs() < 1e-10);
        assert!((stats.max() - 5.0).abs() < 1e-10);
        assert!((stats.variance() - 2.5).abs() < 1e-10);
    }

    #[test]
    fn test_aggregator_update() {
        let mut aggregator = StreamMetricsAggregator::new();
        aggregator.update(&TickReport {
            tick: 1,
            frame_read: true,
            sent: 3,
            replayed: 1,
            idle: 1,
            detections: 2,
            invalidated: true,
            duration_ms: 4.0,
            source_fps: 30.0,
            ..Default::default()
        });
        aggregator.update(&TickReport {
            tick: 2,
            duration_ms: 1.0,
            ..Default::default()
        });

        let summary = aggregator.summary();
        assert_eq!(summary.total_ticks, 2);
        assert_eq!(summary.ticks_with_frame, 1);
        assert_eq!(summary.total_sent, 3);
        assert_eq!(summary.total_detections, 2);
        assert_eq!(summary.reindexes, 1);
        assert!((summary.skip_rate - 50.0).abs() < 1e-10);
        assert!((summary.replay_rate - 25.0).abs() < 1e-10);
        assert_eq!(summary.tick_duration_ms.count, 2);
        assert_eq!(summary.source_fps.count, 1);
    }

    #[test]
    fn test_summary_display() {
        let summary = MetricsSummary {
            total_ticks: 100,
            skip_rate: 5.0,
            total_sent: 300,
            ..Default::default()
        };
        let output = format!("{}", summary);
        assert!(output.contains("Ticks: 100"));
        assert!(output.contains("5.00%"));
        assert!(output.contains("Source fps: N/A"));
    }

    #[test]
    fn test_recorders_without_installed_recorder() {
        record_tick_metrics(&TickReport::default());
        record_source_info(&SourceInfo::default());
        record_source_switch("webcam", false);
    }
}
