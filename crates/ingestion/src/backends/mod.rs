//! Capture backend implementations

#[cfg(feature = "ffmpeg")]
mod ffmpeg;
mod mjpeg;
#[cfg(feature = "v4l2")]
mod v4l2;

#[cfg(feature = "ffmpeg")]
pub use ffmpeg::FfmpegFileCapture;
pub use mjpeg::{index_frames, MjpegFileCapture};
#[cfg(feature = "v4l2")]
pub use v4l2::V4l2Capture;
