//! Mock landmark detectors
//!
//! Implements `LandmarkDetector` without any detection model. Entities are
//! synthesised so that their image points are the projection of their mirrored
//! model points through the frame's approximate intrinsics, which lets the
//! reconstructor recover a known translation. Used for tests and for running
//! the streamer without models.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use contracts::{
    CameraIntrinsics, ContractError, DetectedEntity, DetectionCallback, DetectionResult,
    DetectorKind, Frame, LandmarkDetector, Point2, Point3,
};
use tracing::{debug, trace, warn};

use crate::pnp::project;

/// Points per entity for each detector family
pub fn points_per_entity(kind: DetectorKind) -> usize {
    match kind {
        DetectorKind::Hands => 21,
        DetectorKind::Body => 33,
        DetectorKind::Face => 478,
    }
}

/// Entity name for the `i`-th detection of `kind`
pub fn entity_name(kind: DetectorKind, i: usize) -> String {
    match (kind, i) {
        (DetectorKind::Hands, 0) => "Left".to_string(),
        (DetectorKind::Hands, 1) => "Right".to_string(),
        (DetectorKind::Hands, i) => format!("Hand{i}"),
        (DetectorKind::Body, i) => format!("Body{i}"),
        (DetectorKind::Face, i) => format!("Face{i}"),
    }
}

/// Default script: two hands, one body, one face
pub fn default_script(kind: DetectorKind) -> Vec<usize> {
    match kind {
        DetectorKind::Hands => vec![2],
        DetectorKind::Body | DetectorKind::Face => vec![1],
    }
}

/// Synthesise `count` entities of `kind` for a frame of `resolution`
pub fn synthetic_entities(
    kind: DetectorKind,
    count: usize,
    resolution: (u32, u32),
    timestamp: u64,
) -> BTreeMap<String, DetectedEntity> {
    let intrinsics = CameraIntrinsics::from_resolution(resolution.0, resolution.1);
    let (w, h) = (resolution.0.max(1) as f64, resolution.1.max(1) as f64);
    let n = points_per_entity(kind);
    let wobble = 0.01 * (timestamp as f64 * 0.3).sin();

    (0..count)
        .map(|e| {
            let model_points: Vec<Point3> = (0..n)
                .map(|i| {
                    let f = i as f64;
                    Point3::new(
                        0.012 * (f % 5.0) - 0.024,
                        0.012 * (f / 5.0).floor() - 0.03,
                        0.002 * (f % 3.0),
                    )
                })
                .collect();
            let translation = [-0.15 + 0.3 * e as f64 + wobble, 0.02, 0.5 + 0.05 * e as f64];
            let image_points = model_points
                .iter()
                .map(|p| {
                    let px = project(&Point3::new(-p.x, -p.y, -p.z), translation, &intrinsics);
                    Point2 { x: px.x / w, y: px.y / h }
                })
                .collect();
            (
                entity_name(kind, e),
                DetectedEntity {
                    image_points,
                    model_points,
                },
            )
        })
        .collect()
}

type Job = (Frame, u64, usize);
type CallbackCell = Arc<Mutex<Option<DetectionCallback>>>;

enum Mode {
    /// Completes inside `submit_frame`
    Inline,

    /// Completes on a worker thread; at most one job queued
    Threaded {
        jobs: async_channel::Sender<Job>,
        worker: Mutex<Option<JoinHandle<()>>>,
    },
}

/// Scripted mock detector
///
/// The `i`-th submission yields `script[i % script.len()]` entities (none for
/// an empty script).
pub struct MockDetector {
    kind: DetectorKind,
    script: Arc<[usize]>,
    callback: CallbackCell,
    submissions: AtomicU64,
    dropped: AtomicU64,
    mode: Mode,
}

impl MockDetector {
    /// Detector that invokes the callback synchronously
    pub fn inline(kind: DetectorKind, script: Vec<usize>) -> Self {
        Self {
            kind,
            script: script.into(),
            callback: Arc::new(Mutex::new(None)),
            submissions: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            mode: Mode::Inline,
        }
    }

    /// Detector that completes on its own thread, dropping frames while busy
    ///
    /// # Errors
    /// `Io` if the worker thread cannot be spawned.
    pub fn threaded(kind: DetectorKind, script: Vec<usize>) -> Result<Self, ContractError> {
        let script: Arc<[usize]> = script.into();
        let callback: CallbackCell = Arc::new(Mutex::new(None));
        let (jobs, rx) = async_channel::bounded::<Job>(1);

        let worker = {
            let script = script.clone();
            let callback = callback.clone();
            thread::Builder::new()
                .name(format!("mock-{kind}"))
                .spawn(move || {
                    while let Ok((frame, timestamp, call)) = rx.recv_blocking() {
                        complete(kind, &script, &callback, frame, timestamp, call);
                    }
                    debug!(kind = %kind, "mock detector worker exited");
                })?
        };

        Ok(Self {
            kind,
            script,
            callback,
            submissions: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            mode: Mode::Threaded {
                jobs,
                worker: Mutex::new(Some(worker)),
            },
        })
    }

    /// Inline detector with the default script
    pub fn with_defaults(kind: DetectorKind) -> Self {
        Self::inline(kind, default_script(kind))
    }

    /// Accepted submissions
    pub fn submissions(&self) -> u64 {
        self.submissions.load(Ordering::Relaxed)
    }

    /// Submissions dropped because the worker was busy
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

fn complete(
    kind: DetectorKind,
    script: &[usize],
    callback: &CallbackCell,
    frame: Frame,
    timestamp: u64,
    call: usize,
) {
    let count = if script.is_empty() {
        0
    } else {
        script[call % script.len()]
    };
    let entities = synthetic_entities(kind, count, frame.resolution(), timestamp);
    let cb = callback.lock().unwrap_or_else(|e| e.into_inner()).clone();
    match cb {
        Some(cb) => {
            trace!(kind = %kind, timestamp, entities = count, "mock detection complete");
            cb(DetectionResult {
                timestamp,
                entities,
                frame,
            });
        }
        None => trace!(kind = %kind, timestamp, "no listener, result discarded"),
    }
}

impl LandmarkDetector for MockDetector {
    fn kind(&self) -> DetectorKind {
        self.kind
    }

    fn listen(&self, callback: DetectionCallback) {
        *self.callback.lock().unwrap_or_else(|e| e.into_inner()) = Some(callback);
    }

    fn submit_frame(&self, frame: &Frame, timestamp: u64) -> Result<(), ContractError> {
        let call = self.submissions.fetch_add(1, Ordering::Relaxed) as usize;
        match &self.mode {
            Mode::Inline => {
                complete(self.kind, &self.script, &self.callback, frame.clone(), timestamp, call);
                Ok(())
            }
            Mode::Threaded { jobs, .. } => match jobs.try_send((frame.clone(), timestamp, call)) {
                Ok(()) => Ok(()),
                Err(async_channel::TrySendError::Full(_)) => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    trace!(kind = %self.kind, timestamp, "mock detector busy, frame dropped");
                    Ok(())
                }
                Err(async_channel::TrySendError::Closed(_)) => Err(ContractError::Detector {
                    kind: self.kind.to_string(),
                    message: "detector stopped".to_string(),
                }),
            },
        }
    }

    fn stop(&self) {
        if let Mode::Threaded { jobs, worker } = &self.mode {
            jobs.close();
            let handle = worker.lock().unwrap_or_else(|e| e.into_inner()).take();
            if let Some(handle) = handle {
                if handle.join().is_err() {
                    warn!(kind = %self.kind, "mock detector worker panicked");
                }
            }
        }
    }
}

impl Drop for MockDetector {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn test_synthetic_entities_shape() {
        let hands = synthetic_entities(DetectorKind::Hands, 3, (320, 240), 1);
        assert_eq!(hands.keys().collect::<Vec<_>>(), vec!["Hand2", "Left", "Right"]);
        assert!(hands.values().all(|e| e.image_points.len() == 21 && e.model_points.len() == 21));

        let face = synthetic_entities(DetectorKind::Face, 1, (320, 240), 1);
        assert_eq!(face["Face0"].model_points.len(), 478);
    }

    #[test]
    fn test_inline_follows_script() {
        let detector = MockDetector::inline(DetectorKind::Hands, vec![2, 1]);
        let (tx, rx) = mpsc::channel();
        detector.listen(Arc::new(move |r: DetectionResult| {
            let _ = tx.send((r.timestamp, r.entities.len()));
        }));

        let frame = Frame::blank(32, 24).unwrap();
        for ts in 1..=3 {
            detector.submit_frame(&frame, ts).unwrap();
        }
        let got: Vec<_> = rx.try_iter().collect();
        assert_eq!(got, vec![(1, 2), (2, 1), (3, 2)]);
        assert_eq!(detector.submissions(), 3);
    }

    #[test]
    fn test_threaded_completes_off_thread() {
        let detector = MockDetector::threaded(DetectorKind::Body, vec![1]).unwrap();
        let (tx, rx) = mpsc::channel();
        detector.listen(Arc::new(move |r: DetectionResult| {
            let _ = tx.send((r.timestamp, thread::current().name().map(str::to_string)));
        }));

        detector.submit_frame(&Frame::blank(16, 16).unwrap(), 7).unwrap();
        let (ts, name) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(ts, 7);
        assert_eq!(name.as_deref(), Some("mock-body"));
    }

    #[test]
    fn test_threaded_rejects_after_stop() {
        let detector = MockDetector::threaded(DetectorKind::Face, vec![1]).unwrap();
        detector.stop();
        let err = detector
            .submit_frame(&Frame::blank(8, 8).unwrap(), 1)
            .unwrap_err();
        assert!(matches!(err, ContractError::Detector { .. }));
        // Idempotent
        detector.stop();
    }
}
