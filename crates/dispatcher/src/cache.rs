//! LastGoodCache - last payload successfully sent to each sink
//!
//! Keyed by display index, so it must be cleared whenever the registry
//! reindexes.

use std::collections::HashMap;

use bytes::Bytes;

#[derive(Debug, Default)]
pub struct LastGoodCache {
    entries: HashMap<usize, Bytes>,
    epoch: u64,
}

impl LastGoodCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, index: usize) -> Option<Bytes> {
        self.entries.get(&index).cloned()
    }

    pub fn insert(&mut self, index: usize, payload: Bytes) {
        self.entries.insert(index, payload);
    }

    /// Drop every entry if `epoch` differs from the cached one
    ///
    /// Returns whether the cache was invalidated.
    pub fn sync_epoch(&mut self, epoch: u64) -> bool {
        if epoch == self.epoch {
            return false;
        }
        self.entries.clear();
        self.epoch = epoch;
        true
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
