//! Pipeline statistics and metrics.

use std::time::Duration;

use dispatcher::MetricsSnapshot;
use observability::StreamMetricsAggregator;

/// Statistics from a streamer run
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Dispatch ticks executed
    pub ticks: u64,

    /// Total duration of the run
    pub duration: Duration,

    /// Sinks registered at shutdown
    pub active_sinks: usize,

    /// Detectors registered with the dispatcher
    pub active_detectors: usize,

    /// Frames published by the acquisition thread
    pub frames_captured: u64,

    /// Failed capture reads
    pub read_failures: u64,

    /// Per-tick aggregate
    pub stream_metrics: StreamMetricsAggregator,

    /// Per-sink counters, keyed by sink name
    pub sink_metrics: Vec<(String, MetricsSnapshot)>,
}

impl PipelineStats {
    /// Achieved ticks per second
    pub fn tick_rate(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.ticks as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                    Streamer Statistics                       ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Ticks: {}", self.ticks);
        println!("   ├─ Tick rate: {:.2}/s", self.tick_rate());
        println!("   ├─ Frames captured: {}", self.frames_captured);
        println!("   ├─ Read failures: {}", self.read_failures);
        println!("   ├─ Active detectors: {}", self.active_detectors);
        println!("   └─ Active sinks: {}", self.active_sinks);

        let summary = self.stream_metrics.summary();

        println!("\n📈 Dispatch Metrics");
        println!(
            "   ├─ Ticks without frame: {} ({:.2}%)",
            summary.total_ticks - summary.ticks_with_frame,
            summary.skip_rate
        );
        println!("   ├─ Datagrams sent: {}", summary.total_sent);
        println!(
            "   ├─ Cache replays: {} ({:.2}%)",
            summary.total_replayed, summary.replay_rate
        );
        println!("   ├─ Send failures: {}", summary.total_failed);
        println!("   ├─ Detections: {}", summary.total_detections);
        println!("   ├─ Reindexes: {}", summary.reindexes);
        println!("   └─ Tick duration (ms): {}", summary.tick_duration_ms);

        if !self.sink_metrics.is_empty() {
            println!("\n📤 Sinks");
            for (i, (name, m)) in self.sink_metrics.iter().enumerate() {
                let prefix = if i == self.sink_metrics.len() - 1 { "└─" } else { "├─" };
                println!(
                    "   {} {}: sent={} replayed={} failed={} idle={} bytes={}",
                    prefix, name, m.sent_count, m.replayed_count, m.failure_count, m.idle_count, m.bytes_sent
                );
            }
        }

        println!();
    }
}
