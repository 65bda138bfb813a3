//! Sink metrics for observability

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics for a single sink
#[derive(Debug, Default)]
pub struct SinkMetrics {
    /// Fresh payloads sent
    sent_count: AtomicU64,
    /// Cached payloads replayed
    replayed_count: AtomicU64,
    /// Send failures
    failure_count: AtomicU64,
    /// Ticks with nothing to send
    idle_count: AtomicU64,
    /// Bytes handed to the transport
    bytes_sent: AtomicU64,
}

impl SinkMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent_count(&self) -> u64 {
        self.sent_count.load(Ordering::Relaxed)
    }

    pub fn inc_sent(&self, bytes: usize) {
        self.sent_count.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn replayed_count(&self) -> u64 {
        self.replayed_count.load(Ordering::Relaxed)
    }

    pub fn inc_replayed(&self, bytes: usize) {
        self.replayed_count.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::Relaxed)
    }

    pub fn inc_failure(&self) {
        self.failure_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn idle_count(&self) -> u64 {
        self.idle_count.load(Ordering::Relaxed)
    }

    pub fn inc_idle(&self) {
        self.idle_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent.load(Ordering::Relaxed)
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            sent_count: self.sent_count(),
            replayed_count: self.replayed_count(),
            failure_count: self.failure_count(),
            idle_count: self.idle_count(),
            bytes_sent: self.bytes_sent(),
        }
    }
}

/// Snapshot of sink metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub sent_count: u64,
    pub replayed_count: u64,
    pub failure_count: u64,
    pub idle_count: u64,
    pub bytes_sent: u64,
}
