//! ConfigSnapshot - immutable per-tick view of the configuration
//!
//! The dispatch loop never reads live configuration; it takes one snapshot
//! per tick and works from it.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{SinkConfig, SinkSpec, SourceKind};

/// Configuration file version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Configuration file contents - Config Loader output
///
/// Seeds the Sink Registry at startup; sinks are re-indexed positionally.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamerConfig {
    #[serde(default)]
    pub version: ConfigVersion,

    #[serde(default)]
    pub globals: GlobalSettings,

    #[serde(default)]
    pub sinks: Vec<SinkSpec>,
}

/// Global toggles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct GlobalSettings {
    /// Requested frame source
    #[serde(default)]
    pub source: SourceKind,

    /// Output scale relative to native resolution
    #[serde(default = "default_scale")]
    #[validate(range(exclusive_min = 0.0))]
    pub scale: f64,

    /// Mirror frames horizontally on acquisition
    #[serde(default = "default_true")]
    pub flip_horizontal: bool,

    /// Master switch for landmark smoothing
    #[serde(default = "default_true")]
    pub smoothing_enabled: bool,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            source: SourceKind::None,
            scale: default_scale(),
            flip_horizontal: true,
            smoothing_enabled: true,
        }
    }
}

fn default_scale() -> f64 {
    1.0
}

fn default_true() -> bool {
    true
}

/// Versioned configuration snapshot
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigSnapshot {
    /// Bumped on every edit
    pub version: u64,

    /// Bumped on every reindex; index-keyed state from an older epoch is invalid
    pub epoch: u64,

    pub globals: GlobalSettings,

    /// Sinks in index order
    pub sinks: Vec<SinkConfig>,
}

impl ConfigSnapshot {
    pub fn sink(&self, index: usize) -> Option<&SinkConfig> {
        self.sinks.get(index)
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}
