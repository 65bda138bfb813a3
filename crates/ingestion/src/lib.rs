//! # Ingestion
//!
//! Frame acquisition module.
//!
//! Responsibilities:
//! - Open frame sources (video files, V4L2 devices, synthetic patterns)
//! - Run one acquisition thread per active source
//! - Apply output scale and horizontal flip
//! - Publish the latest frame for non-blocking reads
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::{FrameSource, FrameSourceConfig};
//! use contracts::SourceKind;
//!
//! let source = FrameSource::with_default_opener(FrameSourceConfig::default());
//! source.change_source(SourceKind::File { path: "clip.mp4".into() }, 1.0)?;
//! if let Some(frame) = source.read() {
//!     // Dispatch frame
//! }
//! ```
//!
//! ## Mock Testing
//!
//! ```ignore
//! use ingestion::{FrameSource, FrameSourceConfig, MockOpener, SyntheticConfig};
//!
//! let opener = MockOpener::new(SyntheticConfig::default());
//! let source = FrameSource::new(std::sync::Arc::new(opener), FrameSourceConfig::default());
//! ```

mod backends;
mod capture;
mod config;
mod error;
mod frame_source;
mod mock;

// Re-exports
#[cfg(feature = "ffmpeg")]
pub use backends::FfmpegFileCapture;
#[cfg(feature = "v4l2")]
pub use backends::V4l2Capture;
pub use backends::{index_frames, MjpegFileCapture};
pub use capture::{Capture, CaptureOpener, Captured, DefaultOpener};
pub use config::{FrameSourceConfig, IngestionMetrics, MetricsSnapshot};
pub use error::{IngestionError, Result};
pub use frame_source::{process_frame, FrameSource};
pub use mock::{pattern, MockOpener, SyntheticCapture, SyntheticConfig};
