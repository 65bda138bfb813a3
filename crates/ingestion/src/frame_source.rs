//! Frame Source
//!
//! Owns at most one acquisition thread. The thread reads from a `Capture`,
//! applies scale and flip, and publishes into a latest-frame slot that
//! `read()` copies out without blocking on the capture.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use contracts::{scaled_resolution, ContractError, Frame, SourceInfo, SourceKind, MAX_SCALE};
use image::imageops::{self, FilterType};
use image::RgbImage;
use tracing::{debug, info, instrument, trace, warn};

use crate::capture::{Capture, CaptureOpener, Captured, DefaultOpener};
use crate::config::{FrameSourceConfig, IngestionMetrics};
use crate::error::{IngestionError, Result};

/// Sleep between polls while a file source is paused
const IDLE_POLL: Duration = Duration::from_millis(5);

/// Back-off after a failed live read
const READ_RETRY: Duration = Duration::from_millis(10);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Controls that survive source switches
#[derive(Debug)]
struct Controls {
    flip: AtomicBool,
    playing: AtomicBool,
    metrics: IngestionMetrics,
}

/// State shared with one acquisition thread
#[derive(Debug, Default)]
struct WorkerShared {
    stop: AtomicBool,
    latest: Mutex<Option<Frame>>,
    fps_bits: AtomicU64,
    position: AtomicU64,
    pending_seek: Mutex<Option<u64>>,
}

impl WorkerShared {
    fn fps(&self) -> f64 {
        f64::from_bits(self.fps_bits.load(Ordering::Relaxed))
    }
}

struct Worker {
    shared: Arc<WorkerShared>,
    handle: JoinHandle<()>,
    /// Disconnects when the thread exits
    exited: mpsc::Receiver<()>,
}

struct SourceState {
    info: SourceInfo,
    /// Placeholder served while kind is `None`; cleared during a switch
    blank: Option<Frame>,
    worker: Option<Worker>,
}

/// Threaded, hot-swappable frame producer
///
/// All methods take `&self`; switches are serialized internally so the
/// source can be shared behind an `Arc` and switched from a blocking task.
pub struct FrameSource {
    config: FrameSourceConfig,
    opener: Arc<dyn CaptureOpener>,
    controls: Arc<Controls>,
    switch: Mutex<()>,
    state: Mutex<SourceState>,
}

impl FrameSource {
    /// Create a source in the `None` state
    pub fn new(opener: Arc<dyn CaptureOpener>, config: FrameSourceConfig) -> Self {
        let controls = Arc::new(Controls {
            flip: AtomicBool::new(true),
            playing: AtomicBool::new(true),
            metrics: IngestionMetrics::new(),
        });
        let state = none_state(&config, 1.0);
        Self {
            config,
            opener,
            controls,
            switch: Mutex::new(()),
            state: Mutex::new(state),
        }
    }

    /// Create a source backed by real files and devices
    pub fn with_default_opener(config: FrameSourceConfig) -> Self {
        let opener = Arc::new(DefaultOpener::new(config.fallback_file_fps));
        Self::new(opener, config)
    }

    /// Replace the active source
    ///
    /// Stops the running acquisition, opens `kind`, probes one frame to learn
    /// the native resolution and starts a new acquisition thread. Blocks for
    /// up to the stop timeout plus the probe timeout.
    ///
    /// # Errors
    /// `NoOpenableSource` if `kind` cannot be opened or probed; the source is
    /// left in the `None` state.
    #[instrument(name = "frame_source_change", skip(self, kind), fields(source = %kind))]
    pub fn change_source(&self, kind: SourceKind, scale: f64) -> Result<SourceInfo> {
        let _switching = lock(&self.switch);
        let scale = sanitize_scale(scale);

        let previous = {
            let mut state = lock(&self.state);
            state.blank = None;
            state.worker.take()
        };
        if let Some(worker) = previous {
            self.join_worker(worker);
        }

        if kind == SourceKind::None {
            let state = none_state(&self.config, scale);
            let info = state.info.clone();
            *lock(&self.state) = state;
            self.controls.metrics.record_switch();
            info!(width = info.width, height = info.height, "frame source set to none");
            return Ok(info);
        }

        match self.start(&kind, scale) {
            Ok(state) => {
                let info = state.info.clone();
                *lock(&self.state) = state;
                self.controls.metrics.record_switch();
                info!(
                    native_width = info.native_width,
                    native_height = info.native_height,
                    width = info.width,
                    height = info.height,
                    frame_count = info.frame_count,
                    "frame source started"
                );
                Ok(info)
            }
            Err(e) => {
                self.controls.metrics.record_open_failure();
                metrics::counter!("vml_streamer_source_open_failures_total").increment(1);
                warn!(error = %e, "failed to open frame source, falling back to none");
                *lock(&self.state) = none_state(&self.config, scale);
                Err(e)
            }
        }
    }

    /// Latest frame, never blocking on acquisition
    ///
    /// Returns a blank frame when no source is selected, and `None` when a live
    /// source has not published yet or its last read failed.
    pub fn read(&self) -> Option<Frame> {
        let state = lock(&self.state);
        match &state.worker {
            Some(worker) => lock(&worker.shared.latest).clone(),
            None => state.blank.clone(),
        }
    }

    /// Jump to frame `n` (file sources only, applied on the next iteration)
    pub fn set_frame(&self, n: u64) {
        let state = lock(&self.state);
        if !state.info.kind.is_file() {
            return;
        }
        if let Some(worker) = &state.worker {
            *lock(&worker.shared.pending_seek) = Some(n);
        }
    }

    /// Step one frame forward, wrapping at the end (file sources only)
    pub fn advance_one_frame(&self) {
        let state = lock(&self.state);
        if !state.info.kind.is_file() || state.info.frame_count == 0 {
            return;
        }
        if let Some(worker) = &state.worker {
            let mut pending = lock(&worker.shared.pending_seek);
            let current = pending.unwrap_or_else(|| worker.shared.position.load(Ordering::Relaxed));
            *pending = Some((current + 1) % state.info.frame_count);
        }
    }

    /// Resume file playback at the native rate
    pub fn play(&self) {
        self.controls.playing.store(true, Ordering::Relaxed);
    }

    /// Hold the current file frame
    pub fn pause(&self) {
        self.controls.playing.store(false, Ordering::Relaxed);
    }

    pub fn is_playing(&self) -> bool {
        self.controls.playing.load(Ordering::Relaxed)
    }

    /// Mirror frames horizontally from the next acquired frame on
    pub fn set_flip(&self, flip: bool) {
        self.controls.flip.store(flip, Ordering::Relaxed);
    }

    /// Measured acquisition throughput
    pub fn fps(&self) -> f64 {
        let state = lock(&self.state);
        state.worker.as_ref().map_or(0.0, |w| w.shared.fps())
    }

    /// Current status
    pub fn info(&self) -> SourceInfo {
        let state = lock(&self.state);
        let mut info = state.info.clone();
        if let Some(worker) = &state.worker {
            info.fps = worker.shared.fps();
            info.position = worker.shared.position.load(Ordering::Relaxed);
        }
        info
    }

    pub fn kind(&self) -> SourceKind {
        lock(&self.state).info.kind.clone()
    }

    pub fn metrics(&self) -> crate::MetricsSnapshot {
        self.controls.metrics.snapshot()
    }

    /// Stop acquisition and release the capture handle
    #[instrument(name = "frame_source_stop", skip(self))]
    pub fn stop(&self) {
        let _switching = lock(&self.switch);
        let worker = {
            let mut state = lock(&self.state);
            let scale = state.info.scale;
            std::mem::replace(&mut *state, none_state(&self.config, scale)).worker
        };
        if let Some(worker) = worker {
            self.join_worker(worker);
        }
    }

    fn start(&self, kind: &SourceKind, scale: f64) -> Result<SourceState> {
        let (capture, first) = self.open_and_probe(kind)?;
        let flip = self.controls.flip.load(Ordering::Relaxed);
        let (frame, native) = process_frame(0, first, scale, flip)
            .map_err(|e| IngestionError::no_openable_source(kind.to_string(), e.to_string()))?;

        let info = SourceInfo {
            kind: kind.clone(),
            native_width: native.0,
            native_height: native.1,
            width: frame.width,
            height: frame.height,
            scale,
            fps: 0.0,
            position: 0,
            frame_count: capture.frame_count(),
            source_fps: capture.native_fps(),
        };

        let shared = Arc::new(WorkerShared::default());
        *lock(&shared.latest) = Some(frame);
        let worker = self.spawn_worker(capture, shared, scale, flip)?;

        Ok(SourceState {
            info,
            blank: None,
            worker: Some(worker),
        })
    }

    /// Open `kind` and read its first frame
    ///
    /// Live sources retry until the probe deadline; files get one attempt.
    fn open_and_probe(&self, kind: &SourceKind) -> Result<(Box<dyn Capture>, Captured)> {
        let mut capture = self.opener.open(kind)?;
        if !capture.is_live() {
            capture.seek(0)?;
        }

        let deadline = Instant::now() + self.config.probe_timeout;
        loop {
            match capture.grab() {
                Ok(first) => return Ok((capture, first)),
                Err(e) if capture.is_live() && Instant::now() < deadline => {
                    trace!(error = %e, "probe read failed, retrying");
                    thread::sleep(READ_RETRY);
                }
                Err(e) => {
                    return Err(IngestionError::no_openable_source(
                        capture.describe(),
                        format!("probe read failed: {e}"),
                    ))
                }
            }
        }
    }

    fn spawn_worker(
        &self,
        capture: Box<dyn Capture>,
        shared: Arc<WorkerShared>,
        scale: f64,
        shown_flip: bool,
    ) -> Result<Worker> {
        let (exit_tx, exited) = mpsc::channel();
        let thread_shared = shared.clone();
        let controls = self.controls.clone();
        let fps_window = self.config.fps_window;

        let handle = thread::Builder::new()
            .name("frame-source".to_string())
            .spawn(move || {
                let _exit = exit_tx;
                let mut acquisition = Acquisition {
                    capture,
                    shared: thread_shared,
                    controls,
                    scale,
                    fps_window,
                    shown_flip,
                };
                acquisition.run();
            })
            .map_err(IngestionError::Spawn)?;

        Ok(Worker {
            shared,
            handle,
            exited,
        })
    }

    /// Signal stop and wait up to the stop timeout
    ///
    /// A thread that does not exit in time is detached; it holds its own
    /// `WorkerShared`, so it can no longer publish into the new source.
    fn join_worker(&self, worker: Worker) {
        worker.shared.stop.store(true, Ordering::Release);
        match worker.exited.recv_timeout(self.config.stop_timeout) {
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    timeout_ms = self.config.stop_timeout.as_millis() as u64,
                    "acquisition thread did not stop in time, detaching"
                );
            }
            _ => {
                if worker.handle.join().is_err() {
                    warn!("acquisition thread panicked");
                }
                debug!("acquisition thread stopped");
            }
        }
    }
}

impl Drop for FrameSource {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Acquisition thread body
struct Acquisition {
    capture: Box<dyn Capture>,
    shared: Arc<WorkerShared>,
    controls: Arc<Controls>,
    scale: f64,
    fps_window: Duration,
    shown_flip: bool,
}

impl Acquisition {
    fn run(&mut self) {
        let live = self.capture.is_live();
        let frame_count = self.capture.frame_count();
        let period = frame_period(self.capture.native_fps());
        let source = self.capture.describe();

        let mut seq: u64 = 1;
        let mut counted: u64 = 0;
        let mut window_start = Instant::now();
        let mut next_advance = Instant::now() + period;

        debug!(source = %source, live, frame_count, "acquisition started");

        while !self.shared.stop.load(Ordering::Acquire) {
            let flip = self.controls.flip.load(Ordering::Relaxed);

            let advanced = if live {
                true
            } else {
                match self.next_position(frame_count, flip, period, &mut next_advance) {
                    Some(advanced) => advanced,
                    None => {
                        thread::sleep(IDLE_POLL.min(period));
                        self.update_fps(&mut counted, &mut window_start);
                        continue;
                    }
                }
            };

            let result = self
                .capture
                .grab()
                .and_then(|captured| Ok(process_frame(seq, captured, self.scale, flip)?));
            match result {
                Ok((frame, _)) => {
                    *lock(&self.shared.latest) = Some(frame);
                    self.controls.metrics.record_captured();
                    self.shown_flip = flip;
                    seq += 1;
                    if advanced {
                        counted += 1;
                    }
                }
                Err(e) => {
                    *lock(&self.shared.latest) = None;
                    self.controls.metrics.record_read_failure();
                    metrics::counter!("vml_streamer_source_read_failures_total").increment(1);
                    trace!(source = %source, error = %e, "frame read failed");
                    if live {
                        thread::sleep(READ_RETRY);
                    }
                }
            }

            self.update_fps(&mut counted, &mut window_start);
        }

        debug!(source = %source, "acquisition stopped");
    }

    /// Decide which file frame to read next, if any
    ///
    /// Returns `Some(true)` when the position moved, `Some(false)` for a
    /// re-read of the current frame (flip changed), `None` when idle.
    fn next_position(
        &mut self,
        frame_count: u64,
        flip: bool,
        period: Duration,
        next_advance: &mut Instant,
    ) -> Option<bool> {
        let current = self.shared.position.load(Ordering::Relaxed);
        let now = Instant::now();

        let target = if let Some(n) = lock(&self.shared.pending_seek).take() {
            n.min(frame_count.saturating_sub(1))
        } else if self.controls.playing.load(Ordering::Relaxed) && now >= *next_advance {
            *next_advance = (*next_advance + period).max(now);
            (current + 1) % frame_count.max(1)
        } else if flip != self.shown_flip {
            current
        } else {
            return None;
        };

        if let Err(e) = self.capture.seek(target) {
            warn!(error = %e, target, "seek failed");
            return None;
        }
        self.shared.position.store(target, Ordering::Relaxed);
        Some(target != current)
    }

    fn update_fps(&self, counted: &mut u64, window_start: &mut Instant) {
        let elapsed = window_start.elapsed();
        if elapsed < self.fps_window {
            return;
        }
        let fps = *counted as f64 / elapsed.as_secs_f64();
        self.shared.fps_bits.store(fps.to_bits(), Ordering::Relaxed);
        metrics::gauge!("vml_streamer_source_fps").set(fps);
        *counted = 0;
        *window_start = Instant::now();
    }
}

fn frame_period(fps: f64) -> Duration {
    if fps.is_finite() && fps > 0.0 {
        Duration::from_secs_f64(1.0 / fps)
    } else {
        Duration::from_secs_f64(1.0 / 24.0)
    }
}

fn sanitize_scale(scale: f64) -> f64 {
    if scale.is_finite() && scale > 0.0 {
        scale.min(MAX_SCALE)
    } else {
        1.0
    }
}

fn none_state(config: &FrameSourceConfig, scale: f64) -> SourceState {
    let native = config.blank_resolution;
    let (width, height) = scaled_resolution(native, scale);
    let blank = match Frame::blank(width, height) {
        Ok(frame) => Some(frame),
        Err(e) => {
            warn!(error = %e, "failed to build placeholder frame");
            None
        }
    };
    SourceState {
        info: SourceInfo {
            kind: SourceKind::None,
            native_width: native.0,
            native_height: native.1,
            width,
            height,
            scale,
            ..Default::default()
        },
        blank,
        worker: None,
    }
}

/// Decode, scale and flip one captured image
///
/// Returns the frame and the native resolution. Compressed input that needs
/// no transformation is passed through without re-encoding.
pub fn process_frame(
    seq: u64,
    captured: Captured,
    scale: f64,
    flip: bool,
) -> std::result::Result<(Frame, (u32, u32)), ContractError> {
    let (jpeg, pixels) = match captured {
        Captured::Jpeg(jpeg) => {
            let pixels = contracts::decode_jpeg(&jpeg)?;
            (Some(jpeg), pixels)
        }
        Captured::Pixels(pixels) => (None, pixels),
    };
    let native = pixels.dimensions();
    let output = scaled_resolution(native, scale);

    if let (Some(jpeg), false, true) = (&jpeg, flip, output == native) {
        let frame = Frame {
            seq,
            width: native.0,
            height: native.1,
            jpeg: jpeg.clone(),
            pixels: Arc::new(pixels),
        };
        return Ok((frame, native));
    }

    let mut pixels: RgbImage = if output == native {
        pixels
    } else {
        imageops::resize(&pixels, output.0, output.1, FilterType::Triangle)
    };
    if flip {
        imageops::flip_horizontal_in_place(&mut pixels);
    }
    Ok((Frame::from_pixels(seq, pixels)?, native))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{pattern, MockOpener, SyntheticConfig};
    use std::path::PathBuf;

    fn synthetic(fps: f64, file_frames: u64) -> SyntheticConfig {
        SyntheticConfig {
            width: 32,
            height: 24,
            fps,
            file_frames,
        }
    }

    fn source_with(opener: MockOpener) -> FrameSource {
        let config = FrameSourceConfig {
            stop_timeout: Duration::from_secs(2),
            probe_timeout: Duration::from_millis(200),
            fps_window: Duration::from_millis(100),
            ..Default::default()
        };
        FrameSource::new(Arc::new(opener), config)
    }

    fn file_kind() -> SourceKind {
        SourceKind::File {
            path: PathBuf::from("clip.mjpeg"),
        }
    }

    fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(3);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn test_none_source_serves_blank_frames() {
        let source = source_with(MockOpener::default());
        let frame = source.read().unwrap();
        assert_eq!(frame.resolution(), (320, 240));
        assert!(frame.pixels.pixels().all(|p| p.0 == [0, 0, 0]));

        let info = source.change_source(SourceKind::None, 0.5).unwrap();
        assert_eq!((info.width, info.height), (160, 120));
        assert_eq!(source.read().unwrap().resolution(), (160, 120));
        assert_eq!(source.fps(), 0.0);
    }

    #[test]
    fn test_oversized_scale_is_clamped() {
        let source = source_with(MockOpener::new(synthetic(200.0, 0)));
        let info = source.change_source(SourceKind::Device { id: 0 }, 1e6).unwrap();
        assert_eq!(info.scale, MAX_SCALE);
        assert_eq!((info.width, info.height), (256, 192));
        source.stop();
    }

    #[test]
    fn test_device_switch_reports_native_and_output() {
        let source = source_with(MockOpener::new(synthetic(200.0, 0)));
        let info = source.change_source(SourceKind::Device { id: 0 }, 0.5).unwrap();
        assert_eq!((info.native_width, info.native_height), (32, 24));
        assert_eq!((info.width, info.height), (16, 12));
        assert_eq!(info.frame_count, 0);

        let frame = source.read().unwrap();
        assert_eq!(frame.resolution(), (16, 12));
        assert!(wait_until(|| source.fps() > 0.0));
    }

    #[test]
    fn test_open_failure_falls_back_to_none() {
        let opener = MockOpener::new(synthetic(200.0, 0));
        opener.fail(SourceKind::Device { id: 7 });
        let source = source_with(opener);
        source.change_source(SourceKind::Device { id: 0 }, 1.0).unwrap();

        let err = source.change_source(SourceKind::Device { id: 7 }, 1.0).unwrap_err();
        assert!(matches!(err, IngestionError::NoOpenableSource { .. }));
        assert_eq!(source.kind(), SourceKind::None);
        assert_eq!(source.read().unwrap().resolution(), (320, 240));
        assert_eq!(source.metrics().open_failures, 1);
    }

    #[test]
    fn test_switching_keeps_one_worker() {
        let opener = MockOpener::new(synthetic(200.0, 10));
        let source = source_with(opener.clone());
        for id in 0..3 {
            source.change_source(SourceKind::Device { id }, 1.0).unwrap();
        }
        source.change_source(file_kind(), 1.0).unwrap();
        assert_eq!(opener.open_count(), 4);
        assert_eq!(source.metrics().source_switches, 4);
        assert!(source.info().kind.is_file());
    }

    #[test]
    fn test_file_seek_and_advance() {
        let source = source_with(MockOpener::new(synthetic(0.0, 5)));
        source.set_flip(false);
        source.pause();
        let info = source.change_source(file_kind(), 1.0).unwrap();
        assert_eq!(info.frame_count, 5);

        source.set_frame(3);
        assert!(wait_until(|| source.info().position == 3));
        assert!(wait_until(|| {
            source.read().map(|f| *f.pixels == pattern(32, 24, 3)).unwrap_or(false)
        }));

        source.advance_one_frame();
        assert!(wait_until(|| source.info().position == 4));
        source.advance_one_frame();
        assert!(wait_until(|| source.info().position == 0));

        source.set_frame(99);
        assert!(wait_until(|| source.info().position == 4));
    }

    #[test]
    fn test_paused_file_reports_zero_fps() {
        let source = source_with(MockOpener::new(synthetic(0.0, 5)));
        source.pause();
        source.change_source(file_kind(), 1.0).unwrap();
        thread::sleep(Duration::from_millis(250));
        assert_eq!(source.fps(), 0.0);
        assert_eq!(source.info().position, 0);
    }

    #[test]
    fn test_playing_file_wraps() {
        let source = source_with(MockOpener::new(synthetic(200.0, 3)));
        source.play();
        source.change_source(file_kind(), 1.0).unwrap();
        let mut seen = std::collections::HashSet::new();
        assert!(wait_until(|| {
            seen.insert(source.info().position);
            seen.len() == 3
        }));
    }

    #[test]
    fn test_set_frame_ignored_for_devices() {
        let source = source_with(MockOpener::new(synthetic(200.0, 0)));
        source.change_source(SourceKind::Device { id: 0 }, 1.0).unwrap();
        source.set_frame(3);
        source.advance_one_frame();
        assert_eq!(source.info().position, 0);
    }

    #[test]
    fn test_process_frame_flips_and_scales() {
        let image = pattern(8, 4, 0);
        let (frame, native) = process_frame(1, Captured::Pixels(image.clone()), 1.0, true).unwrap();
        assert_eq!(native, (8, 4));
        assert_eq!(frame.resolution(), (8, 4));
        let mut flipped = image;
        imageops::flip_horizontal_in_place(&mut flipped);
        assert_eq!(*frame.pixels, flipped);

        let (scaled, native) =
            process_frame(2, Captured::Pixels(pattern(8, 4, 0)), 0.5, false).unwrap();
        assert_eq!(native, (8, 4));
        assert_eq!(scaled.resolution(), (4, 2));
    }

    #[test]
    fn test_process_frame_passes_jpeg_through() {
        let source = Frame::blank(10, 10).unwrap();
        let (frame, _) = process_frame(1, Captured::Jpeg(source.jpeg.clone()), 1.0, false).unwrap();
        assert_eq!(frame.jpeg, source.jpeg);
    }
}
