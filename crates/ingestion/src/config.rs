//! Frame Source configuration and metrics

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Frame Source configuration
#[derive(Debug, Clone)]
pub struct FrameSourceConfig {
    /// Upper bound on waiting for the acquisition thread to exit
    pub stop_timeout: Duration,

    /// How long a device probe keeps retrying before giving up
    pub probe_timeout: Duration,

    /// Resolution of placeholder frames when no source is selected
    pub blank_resolution: (u32, u32),

    /// Playback rate assumed when a file does not declare one
    pub fallback_file_fps: f64,

    /// Throughput measurement window
    pub fps_window: Duration,
}

impl Default for FrameSourceConfig {
    fn default() -> Self {
        Self {
            stop_timeout: Duration::from_secs(5),
            probe_timeout: Duration::from_secs(5),
            blank_resolution: (320, 240),
            fallback_file_fps: 24.0,
            fps_window: Duration::from_secs(1),
        }
    }
}

/// Acquisition metrics
#[derive(Debug, Default)]
pub struct IngestionMetrics {
    /// Frames published into the latest-frame slot
    pub frames_captured: AtomicU64,

    /// Failed single-frame reads
    pub read_failures: AtomicU64,

    /// Successful source switches
    pub source_switches: AtomicU64,

    /// Failed source opens
    pub open_failures: AtomicU64,
}

impl IngestionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_captured(&self) {
        self.frames_captured.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_read_failure(&self) {
        self.read_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_switch(&self) {
        self.source_switches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_open_failure(&self) {
        self.open_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            frames_captured: self.frames_captured.load(Ordering::Relaxed),
            read_failures: self.read_failures.load(Ordering::Relaxed),
            source_switches: self.source_switches.load(Ordering::Relaxed),
            open_failures: self.open_failures.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub frames_captured: u64,
    pub read_failures: u64,
    pub source_switches: u64,
    pub open_failures: u64,
}
