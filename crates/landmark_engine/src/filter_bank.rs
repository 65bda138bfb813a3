//! Smoothing Filter Bank
//!
//! One one-euro channel per (entity, point, axis), created lazily on first
//! observation. A channel whose output would be non-finite is dropped and the
//! raw value passed through; the next observation re-creates it.

use std::collections::HashMap;
use std::fmt;

use tracing::trace;

use crate::one_euro::{OneEuroParams, OneEuroState};

/// Coordinate axis of a landmark point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];
}

/// Filter channel identity
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelKey {
    pub entity: String,
    pub point: usize,
    pub axis: Axis,
}

impl ChannelKey {
    pub fn new(entity: impl Into<String>, point: usize, axis: Axis) -> Self {
        Self {
            entity: entity.into(),
            point,
            axis,
        }
    }
}

impl fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}].{:?}", self.entity, self.point, self.axis)
    }
}

/// Keyed collection of one-euro channels
#[derive(Debug, Clone, Default)]
pub struct FilterBank {
    params: OneEuroParams,
    channels: HashMap<ChannelKey, OneEuroState>,
    resets: u64,
}

impl FilterBank {
    pub fn new(params: OneEuroParams) -> Self {
        Self {
            params,
            channels: HashMap::new(),
            resets: 0,
        }
    }

    pub fn params(&self) -> &OneEuroParams {
        &self.params
    }

    /// Takes effect on the next call for every channel, existing ones included
    pub fn set_beta(&mut self, beta: f64) {
        self.params.beta = beta;
    }

    /// Filter one observation
    ///
    /// First use of `key` returns `raw`. A non-finite result, or a non-finite
    /// `raw`, drops the channel and returns `raw`, so the output is finite
    /// only for finite input. `DetectorState` never feeds it non-finite
    /// coordinates.
    pub fn filter(&mut self, key: &ChannelKey, timestamp: f64, raw: f64) -> f64 {
        if !raw.is_finite() {
            self.channels.remove(key);
            return raw;
        }

        let params = self.params;
        let stepped = self
            .channels
            .get_mut(key)
            .map(|state| state.step(&params, timestamp, raw));

        match stepped {
            None => {
                self.channels.insert(key.clone(), OneEuroState::new(timestamp, raw));
                raw
            }
            Some(Some(value)) => value,
            Some(None) => {
                self.channels.remove(key);
                self.resets += 1;
                metrics::counter!("vml_streamer_filter_resets_total").increment(1);
                trace!(channel = %key, timestamp, "filter channel reset");
                raw
            }
        }
    }

    /// Drop every channel
    pub fn clear(&mut self) {
        self.channels.clear();
    }

    /// Drop every channel of `entity`
    pub fn forget_entity(&mut self, entity: &str) {
        self.channels.retain(|key, _| key.entity != entity);
    }

    /// Live channel count
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Channels dropped because of non-finite output
    pub fn resets(&self) -> u64 {
        self.resets
    }
}
