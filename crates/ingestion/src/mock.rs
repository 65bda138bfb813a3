//! Synthetic capture sources
//!
//! For tests and running without a camera or video file.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use contracts::SourceKind;
use image::{Rgb, RgbImage};
use tracing::debug;

use crate::capture::{Capture, CaptureOpener, Captured};
use crate::error::{IngestionError, Result};

/// Synthetic source configuration
#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    pub width: u32,
    pub height: u32,

    /// Pacing for live sources, and native rate for file sources
    pub fps: f64,

    /// Frames in a file source
    pub file_frames: u64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            width: 320,
            height: 240,
            fps: 30.0,
            file_frames: 48,
        }
    }
}

/// Moving gradient test pattern
///
/// Live when `frame_count` is 0; otherwise seekable and deterministic per
/// position.
pub struct SyntheticCapture {
    config: SyntheticConfig,
    live: bool,
    label: String,
    position: u64,
    counter: u64,
    next_due: Option<Instant>,
}

impl SyntheticCapture {
    pub fn live(label: impl Into<String>, config: SyntheticConfig) -> Self {
        Self {
            config,
            live: true,
            label: label.into(),
            position: 0,
            counter: 0,
            next_due: None,
        }
    }

    pub fn file(label: impl Into<String>, config: SyntheticConfig) -> Self {
        Self {
            live: false,
            ..Self::live(label, config)
        }
    }

    fn pace(&mut self) {
        if self.config.fps <= 0.0 {
            return;
        }
        let period = Duration::from_secs_f64(1.0 / self.config.fps);
        let now = Instant::now();
        let due = self.next_due.unwrap_or(now);
        if due > now {
            thread::sleep(due - now);
        }
        self.next_due = Some(due.max(now) + period);
    }
}

/// Render the test pattern for step `t`
pub fn pattern(width: u32, height: u32, t: u64) -> RgbImage {
    let shift = (t % 256) as u32;
    RgbImage::from_fn(width.max(1), height.max(1), |x, y| {
        Rgb([
            ((x + shift * 4) % 256) as u8,
            ((y + shift * 2) % 256) as u8,
            128,
        ])
    })
}

impl Capture for SyntheticCapture {
    fn grab(&mut self) -> Result<Captured> {
        let t = if self.live {
            self.pace();
            self.counter += 1;
            self.counter
        } else {
            self.position
        };
        Ok(Captured::Pixels(pattern(self.config.width, self.config.height, t)))
    }

    fn seek(&mut self, n: u64) -> Result<()> {
        if self.live {
            return Err(IngestionError::NotSeekable {
                source_desc: self.describe(),
            });
        }
        self.position = n.min(self.config.file_frames.saturating_sub(1));
        Ok(())
    }

    fn frame_count(&self) -> u64 {
        if self.live {
            0
        } else {
            self.config.file_frames
        }
    }

    fn native_fps(&self) -> f64 {
        if self.live {
            0.0
        } else {
            self.config.fps
        }
    }

    fn is_live(&self) -> bool {
        self.live
    }

    fn describe(&self) -> String {
        format!("synthetic:{}", self.label)
    }
}

/// Opener that serves synthetic captures for every source kind
///
/// Devices become live patterns, files become seekable patterns of
/// `file_frames` frames (the path is not read).
#[derive(Debug, Clone, Default)]
pub struct MockOpener {
    config: SyntheticConfig,
    unopenable: Arc<Mutex<HashSet<SourceKind>>>,
    opened: Arc<AtomicUsize>,
}

impl MockOpener {
    pub fn new(config: SyntheticConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Make `kind` fail to open
    pub fn fail(&self, kind: SourceKind) {
        self.unopenable
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(kind);
    }

    /// Number of successful opens so far
    pub fn open_count(&self) -> usize {
        self.opened.load(Ordering::Relaxed)
    }
}

impl CaptureOpener for MockOpener {
    fn open(&self, kind: &SourceKind) -> Result<Box<dyn Capture>> {
        let refused = self
            .unopenable
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(kind);
        if refused || *kind == SourceKind::None {
            return Err(IngestionError::no_openable_source(
                kind.to_string(),
                "refused by mock opener",
            ));
        }
        self.opened.fetch_add(1, Ordering::Relaxed);
        debug!(source = %kind, "opening synthetic capture");
        let capture: Box<dyn Capture> = match kind {
            SourceKind::File { .. } => {
                Box::new(SyntheticCapture::file(kind.to_string(), self.config.clone()))
            }
            _ => Box::new(SyntheticCapture::live(kind.to_string(), self.config.clone())),
        };
        Ok(capture)
    }
}
