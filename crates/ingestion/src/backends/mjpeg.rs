//! MJPEG file capture
//!
//! A file of concatenated baseline JPEG images. The whole file is loaded once
//! and frames are sliced out of the shared buffer without copying.

use std::ops::Range;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tracing::debug;

use crate::capture::{Capture, Captured};
use crate::error::{IngestionError, Result};

const SOI: u8 = 0xD8;
const EOI: u8 = 0xD9;
const SOS: u8 = 0xDA;

/// Seekable capture over an MJPEG file
pub struct MjpegFileCapture {
    path: PathBuf,
    data: Bytes,
    frames: Vec<Range<usize>>,
    position: usize,
    fps: f64,
}

impl std::fmt::Debug for MjpegFileCapture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MjpegFileCapture")
            .field("path", &self.path)
            .field("frames", &self.frames.len())
            .field("position", &self.position)
            .field("fps", &self.fps)
            .finish()
    }
}

impl MjpegFileCapture {
    /// Open and index an MJPEG file
    ///
    /// # Errors
    /// `NoOpenableSource` if the file cannot be read or holds no JPEG frame.
    pub fn open(path: &Path, fps: f64) -> Result<Self> {
        let data = std::fs::read(path)
            .map(Bytes::from)
            .map_err(|e| IngestionError::no_openable_source(path.display().to_string(), e.to_string()))?;
        Self::from_bytes(path.to_path_buf(), data, fps)
    }

    /// Index an in-memory MJPEG stream
    pub fn from_bytes(path: PathBuf, data: Bytes, fps: f64) -> Result<Self> {
        let frames = index_frames(&data);
        if frames.is_empty() {
            return Err(IngestionError::no_openable_source(
                path.display().to_string(),
                "no JPEG frames found",
            ));
        }
        let fps = if fps.is_finite() && fps > 0.0 { fps } else { 24.0 };
        debug!(path = %path.display(), frames = frames.len(), fps, "indexed mjpeg file");
        Ok(Self {
            path,
            data,
            frames,
            position: 0,
            fps,
        })
    }
}

impl Capture for MjpegFileCapture {
    fn grab(&mut self) -> Result<Captured> {
        let range = self.frames.get(self.position).cloned().ok_or_else(|| {
            IngestionError::read_failed(self.describe(), format!("no frame {}", self.position))
        })?;
        Ok(Captured::Jpeg(self.data.slice(range)))
    }

    fn seek(&mut self, n: u64) -> Result<()> {
        let last = self.frames.len().saturating_sub(1);
        self.position = usize::try_from(n).unwrap_or(usize::MAX).min(last);
        Ok(())
    }

    fn frame_count(&self) -> u64 {
        self.frames.len() as u64
    }

    fn native_fps(&self) -> f64 {
        self.fps
    }

    fn is_live(&self) -> bool {
        false
    }

    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }
}

/// Locate every complete JPEG image in `data`
///
/// Marker segments are skipped by their declared length so that embedded
/// thumbnails do not split a frame; entropy-coded data is scanned for EOI.
pub fn index_frames(data: &[u8]) -> Vec<Range<usize>> {
    let mut frames = Vec::new();
    let mut i = 0;
    while let Some(start) = find_soi(data, i) {
        match frame_end(data, start) {
            Some(end) => {
                frames.push(start..end);
                i = end;
            }
            None => break,
        }
    }
    frames
}

fn find_soi(data: &[u8], from: usize) -> Option<usize> {
    data.get(from..)?
        .windows(2)
        .position(|w| w == [0xFF, SOI])
        .map(|p| from + p)
}

/// End offset (exclusive) of the image starting at `start`
fn frame_end(data: &[u8], start: usize) -> Option<usize> {
    let mut i = start + 2;
    loop {
        // Marker segments up to start of scan
        while *data.get(i)? == 0xFF && *data.get(i + 1)? == 0xFF {
            i += 1;
        }
        if *data.get(i)? != 0xFF {
            return None;
        }
        let marker = *data.get(i + 1)?;
        if marker == EOI {
            return Some(i + 2);
        }
        let len = u16::from_be_bytes([*data.get(i + 2)?, *data.get(i + 3)?]) as usize;
        i += 2 + len;
        if marker != SOS {
            continue;
        }
        // Entropy-coded segment: FF00 is stuffing, FFD0..=FFD7 are restarts
        loop {
            if *data.get(i)? == 0xFF {
                let next = *data.get(i + 1)?;
                if next == 0x00 || (0xD0..=0xD7).contains(&next) {
                    i += 2;
                    continue;
                }
                break;
            }
            i += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::Frame;

    fn mjpeg_stream(n: usize) -> Vec<u8> {
        let mut out = Vec::new();
        for i in 0..n {
            let frame = Frame::blank(16 + i as u32 * 8, 8).unwrap();
            out.extend_from_slice(&frame.jpeg);
        }
        out
    }

    #[test]
    fn test_index_concatenated_jpegs() {
        let data = mjpeg_stream(3);
        let frames = index_frames(&data);
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].start, 0);
        assert_eq!(frames[2].end, data.len());
        for pair in frames.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
    }

    #[test]
    fn test_index_ignores_truncated_tail() {
        let mut data = mjpeg_stream(2);
        let full = data.len();
        data.extend_from_slice(&mjpeg_stream(1)[..20]);
        let frames = index_frames(&data);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].end, full);
    }

    #[test]
    fn test_grab_and_seek() {
        let data = Bytes::from(mjpeg_stream(3));
        let mut capture = MjpegFileCapture::from_bytes(PathBuf::from("clip.mjpeg"), data, 0.0).unwrap();
        assert_eq!(capture.frame_count(), 3);
        assert_eq!(capture.native_fps(), 24.0);

        capture.seek(2).unwrap();
        let Captured::Jpeg(jpeg) = capture.grab().unwrap() else {
            panic!("expected jpeg");
        };
        let frame = Frame::from_jpeg(0, jpeg).unwrap();
        assert_eq!(frame.resolution(), (32, 8));

        // Clamped to last frame
        capture.seek(99).unwrap();
        assert!(capture.grab().is_ok());
    }

    #[test]
    fn test_open_from_disk() {
        use std::io::Write;

        let mut file = tempfile::Builder::new().suffix(".mjpeg").tempfile().unwrap();
        file.write_all(&mjpeg_stream(4)).unwrap();
        let capture = MjpegFileCapture::open(file.path(), 30.0).unwrap();
        assert_eq!(capture.frame_count(), 4);
        assert_eq!(capture.native_fps(), 30.0);

        let err = MjpegFileCapture::open(Path::new("/nonexistent/clip.mjpeg"), 30.0).unwrap_err();
        assert!(matches!(err, IngestionError::NoOpenableSource { .. }));
    }

    #[test]
    fn test_empty_file_is_unopenable() {
        let err = MjpegFileCapture::from_bytes(PathBuf::from("x.mjpeg"), Bytes::new(), 24.0).unwrap_err();
        assert!(matches!(err, IngestionError::NoOpenableSource { .. }));
    }
}
