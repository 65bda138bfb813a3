//! Per-kind detector state
//!
//! One `DetectorState` per detector family. It owns the detector handle, the
//! slot the detector's callback publishes into, the optional reconstructor and
//! one smoothing bank per sink. Detection is submitted without waiting;
//! `refresh` turns the most recent completed result into landmarks and
//! `landmarks_for` smooths them with one sink's settings.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use contracts::{ContractError, DetectionResult, DetectorKind, Frame, LandmarkDetector, Landmarks, Point3};
use tracing::{debug, instrument, trace};

use crate::filter_bank::{Axis, ChannelKey, FilterBank};
use crate::one_euro::{smoothing_beta, OneEuroParams};
use crate::reconstruct::Reconstructor;

/// Latest completed detection for one kind
///
/// Written by the detector callback, read by the dispatch loop. A result
/// carrying an older timestamp than the stored one is dropped.
#[derive(Debug, Default)]
pub struct ResultSlot {
    latest: Mutex<Option<Arc<DetectionResult>>>,
    rejected: AtomicU64,
}

impl ResultSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `result` unless it is older than the current one
    pub fn publish(&self, result: DetectionResult) -> bool {
        let mut latest = self.latest.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(current) = latest.as_ref() {
            if result.timestamp < current.timestamp {
                self.rejected.fetch_add(1, Ordering::Relaxed);
                trace!(
                    stale = result.timestamp,
                    current = current.timestamp,
                    "stale detection result dropped"
                );
                return false;
            }
        }
        *latest = Some(Arc::new(result));
        true
    }

    pub fn latest(&self) -> Option<Arc<DetectionResult>> {
        self.latest.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn clear(&self) {
        *self.latest.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    /// Results dropped as stale
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }
}

/// Smoothing channels and last output of one sink
#[derive(Debug)]
struct SinkSmoothing {
    bank: FilterBank,
    shapes: HashMap<String, usize>,
    last_refreshed: Option<u64>,
    output: Option<Arc<Landmarks>>,
}

impl SinkSmoothing {
    fn new(params: OneEuroParams) -> Self {
        Self {
            bank: FilterBank::new(params),
            shapes: HashMap::new(),
            last_refreshed: None,
            output: None,
        }
    }

    fn apply(&mut self, timestamp: u64, raw: &Landmarks) -> Arc<Landmarks> {
        let t = timestamp as f64;
        let mut landmarks = Landmarks::new();
        for (name, points) in raw {
            if let Some(previous) = self.shapes.insert(name.clone(), points.len()) {
                if previous != points.len() {
                    self.bank.forget_entity(name);
                }
            }
            let smoothed = points
                .iter()
                .enumerate()
                .map(|(i, p)| {
                    let mut v = p.to_array();
                    for (axis, value) in Axis::ALL.iter().zip(v.iter_mut()) {
                        *value = self.bank.filter(&ChannelKey::new(name.as_str(), i, *axis), t, *value);
                    }
                    Point3::from_array(v)
                })
                .collect();
            landmarks.insert(name.clone(), smoothed);
        }

        let output = Arc::new(landmarks);
        self.output = Some(output.clone());
        self.last_refreshed = Some(timestamp);
        output
    }
}

/// Detector, result slot and smoothing state for one detector kind
///
/// The unsmoothed landmarks are computed once per result. Every sink that
/// asks for smoothing owns its own filter bank, keyed by sink index, so two
/// sinks of the same kind never share channels or settings.
pub struct DetectorState {
    kind: DetectorKind,
    detector: Arc<dyn LandmarkDetector>,
    slot: Arc<ResultSlot>,
    reconstructor: Option<Reconstructor>,
    params: OneEuroParams,

    last_processed: u64,

    output: Option<Arc<Landmarks>>,
    last_refreshed: Option<u64>,
    sinks: HashMap<usize, SinkSmoothing>,
    pnp_failures: u64,
    non_finite: u64,
}

impl std::fmt::Debug for DetectorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectorState")
            .field("kind", &self.kind)
            .field("last_processed", &self.last_processed)
            .field("smoothed_sinks", &self.sinks.len())
            .field("last_refreshed", &self.last_refreshed)
            .finish_non_exhaustive()
    }
}

impl DetectorState {
    /// Wrap `detector` and route its completions into a fresh result slot
    ///
    /// With `reconstructor == None` the detector's model points are passed
    /// through unchanged.
    pub fn new(
        detector: Arc<dyn LandmarkDetector>,
        reconstructor: Option<Reconstructor>,
        params: OneEuroParams,
    ) -> Self {
        let slot = Arc::new(ResultSlot::new());
        let sink = slot.clone();
        detector.listen(Arc::new(move |result| {
            sink.publish(result);
        }));

        Self {
            kind: detector.kind(),
            detector,
            slot,
            reconstructor,
            params,
            last_processed: 0,
            output: None,
            last_refreshed: None,
            sinks: HashMap::new(),
            pnp_failures: 0,
            non_finite: 0,
        }
    }

    pub fn kind(&self) -> DetectorKind {
        self.kind
    }

    /// Submit `frame` for detection if `timestamp` is newer than the last
    /// submission; returns whether the detector was invoked
    ///
    /// # Errors
    /// Propagates the detector's refusal to accept work.
    pub fn submit(&mut self, frame: &Frame, timestamp: u64) -> Result<bool, ContractError> {
        if timestamp <= self.last_processed {
            return Ok(false);
        }
        self.detector.submit_frame(frame, timestamp)?;
        self.last_processed = timestamp;
        metrics::counter!("vml_streamer_detections_submitted_total", "kind" => self.kind.as_str())
            .increment(1);
        Ok(true)
    }

    pub fn last_processed(&self) -> u64 {
        self.last_processed
    }

    pub fn slot(&self) -> &Arc<ResultSlot> {
        &self.slot
    }

    /// Unsmoothed landmarks for the latest completed result
    ///
    /// Recomputed at most once per result timestamp; returns `None` until the
    /// detector has produced anything. Entities that fail reconstruction or
    /// carry a non-finite coordinate are left out.
    pub fn refresh(&mut self) -> Option<Arc<Landmarks>> {
        self.refresh_result().map(|(_, landmarks)| landmarks)
    }

    /// Landmarks for the sink at `sink`, smoothed with that sink's settings
    ///
    /// `smoothing == false` returns the unsmoothed landmarks and drops the
    /// sink's channels, so re-enabling starts from fresh filters.
    pub fn landmarks_for(
        &mut self,
        sink: usize,
        smoothing: bool,
        strength: f64,
    ) -> Option<Arc<Landmarks>> {
        let (timestamp, raw) = self.refresh_result()?;
        if !smoothing {
            self.sinks.remove(&sink);
            return Some(raw);
        }

        let params = self.params;
        let view = self
            .sinks
            .entry(sink)
            .or_insert_with(|| SinkSmoothing::new(params));
        view.bank.set_beta(smoothing_beta(strength));
        if view.last_refreshed == Some(timestamp) {
            return view.output.clone();
        }
        Some(view.apply(timestamp, &raw))
    }

    fn refresh_result(&mut self) -> Option<(u64, Arc<Landmarks>)> {
        let result = self.slot.latest()?;
        if self.last_refreshed == Some(result.timestamp) {
            return self.output.clone().map(|output| (result.timestamp, output));
        }

        let resolution = result.frame.resolution();
        let mut landmarks = Landmarks::new();

        for (name, entity) in &result.entities {
            let points = match &self.reconstructor {
                Some(reconstructor) => match reconstructor.reconstruct(entity, resolution) {
                    Ok(points) => points,
                    Err(e) => {
                        self.pnp_failures += 1;
                        metrics::counter!("vml_streamer_pnp_failures_total", "kind" => self.kind.as_str())
                            .increment(1);
                        debug!(kind = %self.kind, entity = %name, error = %e, "entity skipped");
                        continue;
                    }
                },
                None => entity.model_points.clone(),
            };

            if !points.iter().all(|p| p.to_array().iter().all(|v| v.is_finite())) {
                self.non_finite += 1;
                metrics::counter!("vml_streamer_non_finite_entities_total", "kind" => self.kind.as_str())
                    .increment(1);
                debug!(kind = %self.kind, entity = %name, "entity with non-finite coordinates skipped");
                continue;
            }
            landmarks.insert(name.clone(), points);
        }

        trace!(
            kind = %self.kind,
            timestamp = result.timestamp,
            entities = landmarks.len(),
            "landmarks refreshed"
        );
        let output = Arc::new(landmarks);
        self.output = Some(output.clone());
        self.last_refreshed = Some(result.timestamp);
        Some((result.timestamp, output))
    }

    /// Most recent unsmoothed refresh output
    pub fn output(&self) -> Option<Arc<Landmarks>> {
        self.output.clone()
    }

    /// Beta in use for the sink at `sink`, if it is being smoothed
    pub fn beta(&self, sink: usize) -> Option<f64> {
        self.sinks.get(&sink).map(|view| view.bank.params().beta)
    }

    /// Drop every sink's smoothing state and the cached output
    ///
    /// The next `refresh` recomputes from the latest result with fresh channels.
    #[instrument(skip(self), fields(kind = %self.kind))]
    pub fn reset(&mut self) {
        self.sinks.clear();
        self.output = None;
        self.last_refreshed = None;
        debug!("detector state reset");
    }

    /// Live filter channels across all sinks
    pub fn filter_channels(&self) -> usize {
        self.sinks.values().map(|view| view.bank.len()).sum()
    }

    pub fn filter_resets(&self) -> u64 {
        self.sinks.values().map(|view| view.bank.resets()).sum()
    }

    pub fn pnp_failures(&self) -> u64 {
        self.pnp_failures
    }

    /// Entities dropped for non-finite coordinates
    pub fn non_finite_entities(&self) -> u64 {
        self.non_finite
    }

    pub fn stop(&self) {
        self.detector.stop();
    }
}
