//! Sink Registry
//!
//! Ordered sink configurations with contiguous indices. Every edit bumps the
//! version. Removal reindexes the sinks after the removed one and bumps the
//! epoch, which tells the dispatch loop to drop index-keyed state. An update
//! that retargets a sink (kind, address or port) bumps the epoch as well.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use contracts::{
    ConfigSnapshot, GlobalSettings, SinkConfig, SinkSpec, StreamerConfig, DEFAULT_ADDRESS,
    DEFAULT_BASE_PORT,
};
use tracing::{debug, info};

use crate::error::DispatcherError;

#[derive(Debug, Default)]
struct Inner {
    version: u64,
    epoch: u64,
    globals: GlobalSettings,
    sinks: Vec<SinkConfig>,
}

impl Inner {
    fn next_default_port(&self) -> u16 {
        let used: HashSet<u16> = self.sinks.iter().map(|s| s.port).collect();
        (DEFAULT_BASE_PORT..=u16::MAX)
            .find(|p| !used.contains(p))
            .unwrap_or(DEFAULT_BASE_PORT)
    }

    fn touch(&mut self) {
        self.version += 1;
    }
}

/// Shared, lock-protected sink registry
#[derive(Debug, Default)]
pub struct SinkRegistry {
    inner: Mutex<Inner>,
}

impl SinkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a registry from a loaded configuration file
    ///
    /// Sinks are indexed positionally; omitted ports get default assignment
    /// in file order.
    pub fn from_config(config: &StreamerConfig) -> Self {
        let registry = Self::new();
        registry.set_globals(config.globals.clone());
        for spec in &config.sinks {
            registry.insert(spec.clone());
        }
        registry
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Append a default sink (info dictionary on the next free port)
    pub fn add(&self) -> SinkConfig {
        let mut inner = self.lock();
        let sink = SinkConfig {
            index: inner.sinks.len(),
            address: DEFAULT_ADDRESS.to_string(),
            port: inner.next_default_port(),
            kind: Default::default(),
            settings: Default::default(),
        };
        inner.sinks.push(sink.clone());
        inner.touch();
        debug!(index = sink.index, port = sink.port, "sink added");
        sink
    }

    /// Append a fully described sink
    pub fn insert(&self, spec: SinkSpec) -> SinkConfig {
        let mut inner = self.lock();
        let port = spec.port.unwrap_or_else(|| inner.next_default_port());
        let sink = SinkConfig {
            index: inner.sinks.len(),
            address: spec.address,
            port,
            kind: spec.kind,
            settings: spec.settings,
        };
        inner.sinks.push(sink.clone());
        inner.touch();
        debug!(index = sink.index, port = sink.port, kind = %sink.kind, "sink inserted");
        sink
    }

    /// Delete the sink at `index` and close the gap
    ///
    /// # Errors
    /// `SinkIndex` if `index` is out of range.
    pub fn remove(&self, index: usize) -> Result<SinkConfig, DispatcherError> {
        let mut inner = self.lock();
        let len = inner.sinks.len();
        if index >= len {
            return Err(DispatcherError::sink_index(index, len));
        }
        let removed = inner.sinks.remove(index);
        for (i, sink) in inner.sinks.iter_mut().enumerate() {
            sink.index = i;
        }
        inner.epoch += 1;
        inner.touch();
        info!(index, remaining = inner.sinks.len(), epoch = inner.epoch, "sink removed");
        Ok(removed)
    }

    /// Edit the sink at `index` in place; its index cannot change
    ///
    /// Changing the kind, address or port bumps the epoch so payloads cached
    /// for the old target are never replayed to the new one.
    ///
    /// # Errors
    /// `SinkIndex` if `index` is out of range.
    pub fn update<F>(&self, index: usize, f: F) -> Result<SinkConfig, DispatcherError>
    where
        F: FnOnce(&mut SinkConfig),
    {
        let mut inner = self.lock();
        let len = inner.sinks.len();
        let sink = inner
            .sinks
            .get_mut(index)
            .ok_or_else(|| DispatcherError::sink_index(index, len))?;
        let before = (sink.kind, sink.address.clone(), sink.port);
        f(sink);
        sink.index = index;
        let updated = sink.clone();
        if before != (updated.kind, updated.address.clone(), updated.port) {
            inner.epoch += 1;
            info!(index, kind = %updated.kind, epoch = inner.epoch, "sink retargeted");
        }
        inner.touch();
        Ok(updated)
    }

    pub fn set_globals(&self, globals: GlobalSettings) {
        let mut inner = self.lock();
        inner.globals = globals;
        inner.touch();
    }

    pub fn update_globals<F>(&self, f: F)
    where
        F: FnOnce(&mut GlobalSettings),
    {
        let mut inner = self.lock();
        f(&mut inner.globals);
        inner.touch();
    }

    /// Consistent copy of the whole registry
    pub fn snapshot(&self) -> Arc<ConfigSnapshot> {
        let inner = self.lock();
        Arc::new(ConfigSnapshot {
            version: inner.version,
            epoch: inner.epoch,
            globals: inner.globals.clone(),
            sinks: inner.sinks.clone(),
        })
    }

    /// Smallest port ≥ 11110 not used by any sink
    pub fn next_default_port(&self) -> u16 {
        self.lock().next_default_port()
    }

    pub fn len(&self) -> usize {
        self.lock().sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().sinks.is_empty()
    }
}
