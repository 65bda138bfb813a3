//! Frame source selection and status

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Which source feeds the pipeline
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceKind {
    /// Blank placeholder frames
    #[default]
    None,

    /// Capture device by index (`/dev/video{id}` on Linux)
    Device { id: u32 },

    /// Video file
    File { path: PathBuf },
}

impl SourceKind {
    /// Wire name used in info payloads
    pub fn source_type(&self) -> &'static str {
        match self {
            SourceKind::None => "none",
            SourceKind::Device { .. } => "webcam",
            SourceKind::File { .. } => "video",
        }
    }

    /// Device id or file path, as reported in info payloads
    pub fn source_file(&self) -> String {
        match self {
            SourceKind::None => String::new(),
            SourceKind::Device { id } => id.to_string(),
            SourceKind::File { path } => path.display().to_string(),
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self, SourceKind::File { .. })
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::None => write!(f, "none"),
            SourceKind::Device { id } => write!(f, "device:{id}"),
            SourceKind::File { path } => write!(f, "file:{}", path.display()),
        }
    }
}

/// Point-in-time status of a frame source
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SourceInfo {
    /// Active source
    pub kind: SourceKind,

    /// Native capture resolution
    pub native_width: u32,
    pub native_height: u32,

    /// Output resolution (native × scale)
    pub width: u32,
    pub height: u32,

    /// Scale factor applied to native resolution
    pub scale: f64,

    /// Measured acquisition throughput (frames/sec)
    pub fps: f64,

    /// Current playback position (file sources only)
    pub position: u64,

    /// Total frame count (file sources only, 0 otherwise)
    pub frame_count: u64,

    /// Native playback rate (file sources only, 0 otherwise)
    pub source_fps: f64,
}

/// Largest accepted output scale
pub const MAX_SCALE: f64 = 8.0;

/// Compute output resolution, never smaller than 1×1
///
/// Invalid scales fall back to 1.0; scales above `MAX_SCALE` are clamped.
pub fn scaled_resolution(native: (u32, u32), scale: f64) -> (u32, u32) {
    let scale = if scale.is_finite() && scale > 0.0 {
        scale.min(MAX_SCALE)
    } else {
        1.0
    };
    let w = (native.0 as f64 * scale).round().max(1.0) as u32;
    let h = (native.1 as f64 * scale).round().max(1.0) as u32;
    (w, h)
}
