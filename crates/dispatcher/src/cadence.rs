//! Cadence Gate
//!
//! Decides, per tick and per detector kind, whether detection must run. Each
//! kind's counter advances at most once per tick, so N ticks never trigger
//! more than N detections of one kind, however many sinks share it.

use std::collections::{HashMap, HashSet};

use contracts::DetectorKind;

#[derive(Debug, Default)]
pub struct CadenceGate {
    counters: HashMap<DetectorKind, u64>,
    last_processed: HashMap<DetectorKind, u64>,
    scheduled: HashSet<DetectorKind>,
    ticks: u64,
}

impl CadenceGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new tick
    pub fn begin_tick(&mut self) {
        self.scheduled.clear();
        self.ticks += 1;
    }

    /// Timestamp to run `kind`'s detector with, or `None` if it already ran
    /// this tick
    pub fn schedule(&mut self, kind: DetectorKind) -> Option<u64> {
        if !self.scheduled.insert(kind) {
            return None;
        }
        let counter = self.counters.entry(kind).or_insert(0);
        *counter += 1;
        let counter = *counter;

        let last = self.last_processed.entry(kind).or_insert(0);
        if counter > *last {
            *last = counter;
            Some(counter)
        } else {
            None
        }
    }

    /// Last timestamp handed out for `kind`
    pub fn last_processed(&self, kind: DetectorKind) -> u64 {
        self.last_processed.get(&kind).copied().unwrap_or(0)
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}
