//! Dispatcher - per-tick orchestration
//!
//! Each tick: snapshot the registry, apply the requested source, read one
//! frame, then serve every sink in index order. Landmark sinks share one
//! detector per kind through the cadence gate; sinks with nothing fresh fall
//! back to their last good payload.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, trace, warn};

use contracts::{
    ConfigSnapshot, DatagramTransport, DetectorKind, Frame, LandmarkDetector, Landmarks,
    PnpSolver, SinkConfig, SinkKind, SourceInfo, SourceKind, TickReport,
};
use ingestion::FrameSource;
use landmark_engine::{
    reconstructs_by_default, DetectorState, OneEuroParams, ReconstructOptions, Reconstructor,
    TranslationPnp,
};

use crate::cache::LastGoodCache;
use crate::cadence::CadenceGate;
use crate::error::DispatcherError;
use crate::metrics::{MetricsSnapshot, SinkMetrics};
use crate::payload::{encode_json, landmarks_payload, InfoPayload};
use crate::registry::SinkRegistry;

/// Dispatcher configuration
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Tick period of `run`
    pub tick_interval: Duration,

    /// Stop `run` after this many ticks (None = until shutdown)
    pub max_ticks: Option<u64>,

    /// Smoothing parameters for every detector kind (beta is overridden per sink)
    pub filter: OneEuroParams,

    pub reconstruct: ReconstructOptions,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs_f64(1.0 / 30.0),
            max_ticks: None,
            filter: OneEuroParams::default(),
            reconstruct: ReconstructOptions::default(),
        }
    }
}

/// Builder for creating a Dispatcher
pub struct DispatcherBuilder<T> {
    config: DispatcherConfig,
    registry: Arc<SinkRegistry>,
    source: Arc<FrameSource>,
    transport: T,
    detectors: Vec<Arc<dyn LandmarkDetector>>,
    solver: Arc<dyn PnpSolver>,
}

impl<T: DatagramTransport> DispatcherBuilder<T> {
    pub fn new(registry: Arc<SinkRegistry>, source: Arc<FrameSource>, transport: T) -> Self {
        Self {
            config: DispatcherConfig::default(),
            registry,
            source,
            transport,
            detectors: Vec::new(),
            solver: Arc::new(TranslationPnp),
        }
    }

    pub fn config(mut self, config: DispatcherConfig) -> Self {
        self.config = config;
        self
    }

    /// Register the detector for its kind (a later one replaces an earlier one)
    pub fn detector(mut self, detector: Arc<dyn LandmarkDetector>) -> Self {
        self.detectors.push(detector);
        self
    }

    pub fn solver(mut self, solver: Arc<dyn PnpSolver>) -> Self {
        self.solver = solver;
        self
    }

    #[instrument(name = "dispatcher_builder_build", skip(self), fields(detectors = self.detectors.len()))]
    pub fn build(self) -> Dispatcher<T> {
        let mut detectors = BTreeMap::new();
        for detector in self.detectors {
            let kind = detector.kind();
            let reconstructor = reconstructs_by_default(kind)
                .then(|| Reconstructor::new(self.solver.clone(), self.config.reconstruct));
            let state = DetectorState::new(detector, reconstructor, self.config.filter);
            if detectors.insert(kind, state).is_some() {
                warn!(kind = %kind, "detector replaced");
            }
        }

        Dispatcher {
            config: self.config,
            registry: self.registry,
            source: self.source,
            transport: self.transport,
            detectors,
            gate: CadenceGate::new(),
            cache: LastGoodCache::new(),
            sink_metrics: HashMap::new(),
            requested_source: None,
            ticks: 0,
        }
    }
}

/// The dispatch loop
pub struct Dispatcher<T> {
    config: DispatcherConfig,
    registry: Arc<SinkRegistry>,
    source: Arc<FrameSource>,
    transport: T,
    detectors: BTreeMap<DetectorKind, DetectorState>,
    gate: CadenceGate,
    cache: LastGoodCache,
    sink_metrics: HashMap<usize, Arc<SinkMetrics>>,
    requested_source: Option<(SourceKind, f64)>,
    ticks: u64,
}

impl<T> Dispatcher<T>
where
    T: DatagramTransport + Sync + 'static,
{
    pub fn registry(&self) -> &Arc<SinkRegistry> {
        &self.registry
    }

    pub fn source(&self) -> &Arc<FrameSource> {
        &self.source
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn detector_state(&self, kind: DetectorKind) -> Option<&DetectorState> {
        self.detectors.get(&kind)
    }

    /// Per-sink metrics since the last reindex, in index order
    pub fn metrics(&self) -> Vec<(String, MetricsSnapshot)> {
        let mut entries: Vec<_> = self.sink_metrics.iter().collect();
        entries.sort_by_key(|(index, _)| **index);
        entries
            .into_iter()
            .map(|(index, m)| (format!("sink{index}"), m.snapshot()))
            .collect()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Run one tick
    pub async fn tick(&mut self) -> TickReport {
        let started = Instant::now();
        self.ticks += 1;
        let mut report = TickReport {
            tick: self.ticks,
            ..Default::default()
        };

        let snapshot = self.registry.snapshot();
        self.apply_source(&snapshot).await;
        self.source.set_flip(snapshot.globals.flip_horizontal);

        let Some(frame) = self.source.read() else {
            trace!(tick = self.ticks, "no frame available, tick skipped");
            report.duration_ms = started.elapsed().as_secs_f64() * 1000.0;
            return report;
        };
        report.frame_read = true;

        if self.cache.sync_epoch(snapshot.epoch) {
            for state in self.detectors.values_mut() {
                state.reset();
            }
            self.sink_metrics.clear();
            report.invalidated = true;
            info!(epoch = snapshot.epoch, "registry reindexed, index-keyed state dropped");
        }

        let info = self.source.info();
        report.source_fps = info.fps;
        self.gate.begin_tick();

        for sink in &snapshot.sinks {
            self.serve(sink, &frame, &info, &snapshot, &mut report).await;
        }

        report.duration_ms = started.elapsed().as_secs_f64() * 1000.0;
        report
    }

    async fn apply_source(&mut self, snapshot: &ConfigSnapshot) {
        let requested = (snapshot.globals.source.clone(), snapshot.globals.scale);
        if self.requested_source.as_ref() == Some(&requested) {
            return;
        }
        self.requested_source = Some(requested.clone());

        let (kind, scale) = requested;
        let source = self.source.clone();
        match tokio::task::spawn_blocking(move || source.change_source(kind, scale)).await {
            Ok(Ok(info)) => info!(
                source = %info.kind,
                width = info.width,
                height = info.height,
                "source applied"
            ),
            Ok(Err(e)) => warn!(error = %e, "requested source unavailable"),
            Err(e) => error!(error = %e, "source switch task failed"),
        }
    }

    async fn serve(
        &mut self,
        sink: &SinkConfig,
        frame: &Frame,
        info: &SourceInfo,
        snapshot: &ConfigSnapshot,
        report: &mut TickReport,
    ) {
        let stats = self.sink_metrics.entry(sink.index).or_default().clone();

        let fresh = match self.build_payload(sink, frame, info, snapshot, report) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(sink = %sink.name(), error = %e, "payload build failed");
                None
            }
        };

        let (payload, replay) = match fresh {
            Some(payload) => (payload, false),
            None => match self.cache.get(sink.index) {
                Some(payload) => (payload, true),
                None => {
                    stats.inc_idle();
                    report.idle += 1;
                    return;
                }
            },
        };

        match self
            .transport
            .send_to(&payload, &sink.address, sink.port)
            .await
        {
            Ok(bytes) => {
                if replay {
                    stats.inc_replayed(bytes);
                    report.replayed += 1;
                } else {
                    stats.inc_sent(bytes);
                    report.sent += 1;
                }
                metrics::counter!(
                    "vml_streamer_datagrams_sent_total",
                    "kind" => sink.kind.label(),
                    "replay" => if replay { "true" } else { "false" }
                )
                .increment(1);
                self.cache.insert(sink.index, payload);
            }
            Err(e) => {
                stats.inc_failure();
                report.failed += 1;
                metrics::counter!("vml_streamer_send_failures_total", "kind" => sink.kind.label())
                    .increment(1);
                warn!(sink = %sink.name(), endpoint = %sink.endpoint(), error = %e, "send failed");
            }
        }
    }

    fn build_payload(
        &mut self,
        sink: &SinkConfig,
        frame: &Frame,
        info: &SourceInfo,
        snapshot: &ConfigSnapshot,
        report: &mut TickReport,
    ) -> Result<Option<Bytes>, DispatcherError> {
        match sink.kind {
            SinkKind::InfoDictionary => {
                encode_json(sink, &InfoPayload::new(info, frame, snapshot)).map(Some)
            }
            SinkKind::RawVideo => Ok(Some(frame.jpeg.clone())),
            SinkKind::HandLandmarks | SinkKind::BodyLandmarks | SinkKind::FaceLandmarks => {
                let Some(kind) = sink.kind.detector_kind() else {
                    return Ok(None);
                };
                self.landmarks(sink, kind, frame, snapshot.globals.smoothing_enabled, report)
            }
        }
    }

    fn landmarks(
        &mut self,
        sink: &SinkConfig,
        kind: DetectorKind,
        frame: &Frame,
        smoothing_enabled: bool,
        report: &mut TickReport,
    ) -> Result<Option<Bytes>, DispatcherError> {
        let Some(state) = self.detectors.get_mut(&kind) else {
            trace!(sink = %sink.name(), kind = %kind, "no detector registered");
            return Ok(None);
        };

        if let Some(timestamp) = self.gate.schedule(kind) {
            match state.submit(frame, timestamp) {
                Ok(true) => report.detections += 1,
                Ok(false) => {}
                Err(e) => warn!(kind = %kind, timestamp, error = %e, "detector refused frame"),
            }
        }

        let landmarks = state.landmarks_for(
            sink.index,
            sink.settings.smoothing && smoothing_enabled,
            sink.settings.smoothing_strength,
        );
        let count = landmarks.as_ref().map_or(0, |l| l.len());
        if count < sink.settings.min_entities {
            debug!(
                sink = %sink.name(),
                entities = count,
                min_entities = sink.settings.min_entities,
                "not enough entities"
            );
            return Ok(None);
        }

        let empty = Landmarks::new();
        landmarks_payload(sink, landmarks.as_deref().unwrap_or(&empty)).map(Some)
    }

    /// Tick at the configured interval until `max_ticks` or `shutdown`
    ///
    /// `on_tick` sees every report. Detectors are stopped on return.
    #[instrument(name = "dispatcher_run", skip_all, fields(interval_ms = self.config.tick_interval.as_millis() as u64))]
    pub async fn run<F, S>(mut self, mut on_tick: F, shutdown: S) -> Self
    where
        F: FnMut(&TickReport) + Send,
        S: std::future::Future<Output = ()> + Send,
    {
        info!(sinks = self.registry.len(), "Dispatcher started");
        let mut interval = tokio::time::interval(self.config.tick_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        loop {
            if self.config.max_ticks.is_some_and(|max| self.ticks >= max) {
                info!(ticks = self.ticks, "Reached max ticks");
                break;
            }
            tokio::select! {
                _ = &mut shutdown => {
                    info!(ticks = self.ticks, "Dispatcher shutdown requested");
                    break;
                }
                _ = interval.tick() => {
                    let report = self.tick().await;
                    on_tick(&report);
                    if self.ticks % 300 == 0 {
                        debug!(ticks = self.ticks, "Dispatcher progress");
                    }
                }
            }
        }

        self.stop();
        self
    }

    /// Spawn `run` as a background task
    pub fn spawn<S>(self, shutdown: S) -> JoinHandle<Self>
    where
        T: Send,
        S: std::future::Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(async move { self.run(|_| {}, shutdown).await })
    }

    /// Stop every detector
    pub fn stop(&self) {
        for state in self.detectors.values() {
            state.stop();
        }
        info!("Dispatcher detectors stopped");
    }
}
