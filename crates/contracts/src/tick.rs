//! TickReport - per-tick dispatch outcome
//!
//! Produced by the dispatch loop for every tick and consumed by metric
//! recorders and run summaries.

use serde::{Deserialize, Serialize};

/// What one dispatch tick did
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TickReport {
    /// Tick sequence number, starting at 1
    pub tick: u64,

    /// A frame was available; when false nothing was sent
    pub frame_read: bool,

    /// Fresh payloads sent
    pub sent: usize,

    /// Cached payloads replayed
    pub replayed: usize,

    /// Failed sends
    pub failed: usize,

    /// Sinks with nothing to send
    pub idle: usize,

    /// Detector submissions made this tick
    pub detections: usize,

    /// Registry reindex observed this tick
    pub invalidated: bool,

    /// Wall time spent in the tick (ms)
    pub duration_ms: f64,

    /// Frame source throughput at the time of the tick
    pub source_fps: f64,
}

impl TickReport {
    /// Datagrams handed to the transport successfully
    pub fn delivered(&self) -> usize {
        self.sent + self.replayed
    }
}
