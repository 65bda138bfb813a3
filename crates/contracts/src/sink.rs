//! SinkConfig - Sink Registry entries
//!
//! A sink is a network destination plus a data kind and kind-specific settings.

use serde::{Deserialize, Serialize};
use std::fmt;
use validator::Validate;

use crate::DetectorKind;

/// First port handed out by default port assignment
pub const DEFAULT_BASE_PORT: u16 = 11110;

/// Default destination address
pub const DEFAULT_ADDRESS: &str = "127.0.0.1";

/// Default smoothing slider position
pub const DEFAULT_SMOOTHING_STRENGTH: f64 = 60.0;

/// Payload kind sent to a sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkKind {
    /// Source metadata and stream list (JSON)
    #[default]
    InfoDictionary,

    /// Compressed frame bytes, verbatim
    RawVideo,

    HandLandmarks,
    BodyLandmarks,
    FaceLandmarks,
}

impl SinkKind {
    /// Detector backing this kind, if any
    pub fn detector_kind(&self) -> Option<DetectorKind> {
        match self {
            SinkKind::HandLandmarks => Some(DetectorKind::Hands),
            SinkKind::BodyLandmarks => Some(DetectorKind::Body),
            SinkKind::FaceLandmarks => Some(DetectorKind::Face),
            SinkKind::InfoDictionary | SinkKind::RawVideo => None,
        }
    }

    /// Human-readable label, used in the info payload stream list
    pub fn label(&self) -> &'static str {
        match self {
            SinkKind::InfoDictionary => "Info Dictionary",
            SinkKind::RawVideo => "Raw Video",
            SinkKind::HandLandmarks => "Hand Landmarks",
            SinkKind::BodyLandmarks => "Body Landmarks",
            SinkKind::FaceLandmarks => "Face Landmarks",
        }
    }
}

impl fmt::Display for SinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Kind-specific settings
///
/// Ignored by kinds that do not use them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct SinkSettings {
    /// Apply the smoothing bank to landmark output
    #[serde(default = "default_true")]
    pub smoothing: bool,

    /// Smoothing slider, 0 (responsive) ..= 100 (smooth)
    #[serde(default = "default_strength")]
    #[validate(range(min = 0.0, max = 100.0))]
    pub smoothing_strength: f64,

    /// Minimum detected entities for a result to qualify (0 = always send)
    #[serde(default = "default_min_entities")]
    pub min_entities: usize,
}

impl Default for SinkSettings {
    fn default() -> Self {
        Self {
            smoothing: true,
            smoothing_strength: DEFAULT_SMOOTHING_STRENGTH,
            min_entities: default_min_entities(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_strength() -> f64 {
    DEFAULT_SMOOTHING_STRENGTH
}

fn default_min_entities() -> usize {
    1
}

fn default_address() -> String {
    DEFAULT_ADDRESS.to_string()
}

/// Registered sink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Display index, contiguous `0..N`
    pub index: usize,

    /// Destination host
    pub address: String,

    /// Destination UDP port
    pub port: u16,

    pub kind: SinkKind,

    #[serde(default)]
    pub settings: SinkSettings,
}

impl SinkConfig {
    /// `address:port`
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }

    /// Name used in logs and metric labels
    pub fn name(&self) -> String {
        format!("sink{}", self.index)
    }
}

/// Sink description as written in a configuration file
///
/// Index is positional; port may be omitted for default assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct SinkSpec {
    #[serde(default = "default_address")]
    #[validate(length(min = 1))]
    pub address: String,

    #[serde(default)]
    pub port: Option<u16>,

    #[serde(default)]
    pub kind: SinkKind,

    #[serde(default)]
    #[validate(nested)]
    pub settings: SinkSettings,
}

impl Default for SinkSpec {
    fn default() -> Self {
        Self {
            address: default_address(),
            port: None,
            kind: SinkKind::default(),
            settings: SinkSettings::default(),
        }
    }
}
