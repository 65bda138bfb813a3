//! Capture backends interface
//!
//! A `Capture` is a blocking, single-owner handle on one opened source. The
//! Frame Source moves it onto the acquisition thread and is the only caller.

use std::path::Path;

use bytes::Bytes;
use contracts::SourceKind;
use image::RgbImage;

use crate::backends::MjpegFileCapture;
use crate::error::{IngestionError, Result};

/// One grabbed image, in whatever form the backend produces
#[derive(Debug, Clone)]
pub enum Captured {
    /// Compressed JPEG bytes (MJPEG files, MJPEG cameras)
    Jpeg(Bytes),

    /// Decoded RGB pixels
    Pixels(RgbImage),
}

/// Opened capture handle
pub trait Capture: Send {
    /// Blocking read of the next frame
    ///
    /// For seekable sources this reads the frame at the current position
    /// without advancing it.
    fn grab(&mut self) -> Result<Captured>;

    /// Move to frame `n` (clamped to the last frame)
    fn seek(&mut self, _n: u64) -> Result<()> {
        Err(IngestionError::NotSeekable {
            source_desc: self.describe(),
        })
    }

    /// Total frames (0 for live sources)
    fn frame_count(&self) -> u64 {
        0
    }

    /// Native playback rate (0 for live sources)
    fn native_fps(&self) -> f64 {
        0.0
    }

    /// Live sources retry the probe read; files do not
    fn is_live(&self) -> bool {
        true
    }

    /// Human-readable description for logs
    fn describe(&self) -> String;
}

/// Opens capture handles for a `SourceKind`
pub trait CaptureOpener: Send + Sync {
    /// # Errors
    /// `IngestionError::NoOpenableSource` if the source cannot be opened.
    fn open(&self, kind: &SourceKind) -> Result<Box<dyn Capture>>;
}

/// Opener for real sources
///
/// Files go through FFmpeg with the `ffmpeg` feature, falling back to the
/// MJPEG reader for anything FFmpeg rejects; without it only MJPEG files
/// open. Devices need the `v4l2` feature.
#[derive(Debug, Clone)]
pub struct DefaultOpener {
    fallback_file_fps: f64,
}

impl DefaultOpener {
    pub fn new(fallback_file_fps: f64) -> Self {
        Self { fallback_file_fps }
    }
}

impl Default for DefaultOpener {
    fn default() -> Self {
        Self::new(24.0)
    }
}

impl CaptureOpener for DefaultOpener {
    fn open(&self, kind: &SourceKind) -> Result<Box<dyn Capture>> {
        match kind {
            SourceKind::None => Err(IngestionError::no_openable_source(
                kind.to_string(),
                "no source selected",
            )),
            SourceKind::File { path } => open_file(path, self.fallback_file_fps),
            SourceKind::Device { id } => open_device(*id),
        }
    }
}

#[cfg(feature = "ffmpeg")]
fn open_file(path: &Path, fps: f64) -> Result<Box<dyn Capture>> {
    match crate::backends::FfmpegFileCapture::open(path, fps) {
        Ok(capture) => Ok(Box::new(capture)),
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "ffmpeg rejected file, trying mjpeg");
            Ok(Box::new(MjpegFileCapture::open(path, fps)?))
        }
    }
}

#[cfg(not(feature = "ffmpeg"))]
fn open_file(path: &Path, fps: f64) -> Result<Box<dyn Capture>> {
    match MjpegFileCapture::open(path, fps) {
        Ok(capture) => Ok(Box::new(capture)),
        Err(IngestionError::NoOpenableSource {
            source_desc,
            message,
        }) => Err(IngestionError::no_openable_source(
            source_desc,
            format!("{message}; video containers require the `ffmpeg` feature"),
        )),
        Err(e) => Err(e),
    }
}

#[cfg(feature = "v4l2")]
fn open_device(id: u32) -> Result<Box<dyn Capture>> {
    Ok(Box::new(crate::backends::V4l2Capture::open(id)?))
}

#[cfg(not(feature = "v4l2"))]
fn open_device(id: u32) -> Result<Box<dyn Capture>> {
    Err(IngestionError::no_openable_source(
        format!("device:{id}"),
        "device capture requires the `v4l2` feature",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    #[test]
    fn test_default_opener_rejects_none() {
        let err = DefaultOpener::default().open(&SourceKind::None).err().unwrap();
        assert!(matches!(err, IngestionError::NoOpenableSource { .. }));
    }

    #[test]
    fn test_default_opener_missing_file() {
        let kind = SourceKind::File {
            path: PathBuf::from("/nonexistent/clip.mjpeg"),
        };
        let err = DefaultOpener::default().open(&kind).err().unwrap();
        assert!(matches!(err, IngestionError::NoOpenableSource { .. }));
    }

    fn mjpeg_clip(frames: usize) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".mjpeg").tempfile().unwrap();
        for i in 0..frames {
            let frame = contracts::Frame::blank(16 + 8 * i as u32, 8).unwrap();
            file.write_all(&frame.jpeg).unwrap();
        }
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_default_opener_reads_mjpeg_clip() {
        let clip = mjpeg_clip(3);
        let kind = SourceKind::File {
            path: clip.path().to_path_buf(),
        };
        let mut capture = DefaultOpener::default().open(&kind).unwrap();
        assert!(!capture.is_live());
        assert!(capture.native_fps() > 0.0);
        assert!(capture.grab().is_ok());
    }

    #[cfg(not(feature = "ffmpeg"))]
    #[test]
    fn test_container_without_feature_names_ffmpeg() {
        let mut file = tempfile::Builder::new().suffix(".mp4").tempfile().unwrap();
        file.write_all(b"\x00\x00\x00\x18ftypmp42").unwrap();
        let kind = SourceKind::File {
            path: file.path().to_path_buf(),
        };
        let err = DefaultOpener::default().open(&kind).err().unwrap();
        assert!(matches!(err, IngestionError::NoOpenableSource { .. }));
        assert!(err.to_string().contains("ffmpeg"));
    }

    #[cfg(not(feature = "v4l2"))]
    #[test]
    fn test_device_without_feature() {
        let err = DefaultOpener::default()
            .open(&SourceKind::Device { id: 0 })
            .err()
            .unwrap();
        assert!(err.to_string().contains("v4l2"));
    }
}
