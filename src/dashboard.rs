//! Application shell.
//!
//! Wires the video source, detector, detection loop, overlay and scene
//! together. The detector and the video source come up independently; the
//! loop starts as soon as both are available, whichever finishes last.

use std::fmt;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};

use crate::config::DashboardConfig;
use crate::detect::{load_backend, DetectionUpdate, SharedDetector};
use crate::detection_loop::{lock, DetectionLoop, LoopStats};
use crate::frame::FrameDimensions;
use crate::ingest::{open_source, share_source, SharedSource, VideoSource};
use crate::overlay::{DrawSurface, OverlayRenderer};
use crate::scene::{SceneComposer, SceneFrame};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModelState {
    Loading,
    Loaded,
    Failed(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VideoState {
    Initializing,
    Ready(FrameDimensions),
    Failed(String),
}

/// Status shown in the dashboard header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    LoadingModel,
    ModelUnavailable,
    InitializingCamera,
    ReadyToStart,
    Active,
}

impl Status {
    pub fn message(self) -> &'static str {
        match self {
            Status::LoadingModel => "Loading AI model...",
            Status::ModelUnavailable => "AI model unavailable",
            Status::InitializingCamera => "Initializing camera...",
            Status::ReadyToStart => "Ready to start detection.",
            Status::Active => "AR Vision System Active",
        }
    }

    pub fn is_active(self) -> bool {
        self == Status::Active
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

type Subscribers = Arc<Mutex<Vec<mpsc::Sender<DetectionUpdate>>>>;

pub struct Dashboard {
    config: DashboardConfig,
    model: ModelState,
    detection: Option<DetectionLoop>,
    video: VideoState,
    source: Option<SharedSource>,
    latest: Arc<Mutex<Option<DetectionUpdate>>>,
    subscribers: Subscribers,
    composer: SceneComposer,
    overlay: OverlayRenderer,
}

impl Dashboard {
    pub fn new(config: DashboardConfig) -> Self {
        Self {
            config,
            model: ModelState::Loading,
            detection: None,
            video: VideoState::Initializing,
            source: None,
            latest: Arc::new(Mutex::new(None)),
            subscribers: Arc::new(Mutex::new(Vec::new())),
            composer: SceneComposer::new(),
            overlay: OverlayRenderer::new(),
        }
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    pub fn model_state(&self) -> &ModelState {
        &self.model
    }

    pub fn video_state(&self) -> &VideoState {
        &self.video
    }

    /// Load the configured detector. A failure is kept as `ModelState::Failed`.
    pub fn load_model(&mut self) -> Result<()> {
        let input = FrameDimensions::new(self.config.source.width, self.config.source.height);
        match load_backend(&self.config.detector, input) {
            Ok(detector) => self.attach_detector(detector),
            Err(err) => {
                log::error!("Failed to load model: {:#}", err);
                self.model = ModelState::Failed(format!("{:#}", err));
                Err(err)
            }
        }
    }

    /// Use an already loaded detector instead of the configured backend.
    pub fn attach_detector(&mut self, detector: SharedDetector) -> Result<()> {
        if let Some(previous) = self.detection.take() {
            previous.stop();
        }
        self.detection = Some(DetectionLoop::new(detector, self.config.refresh_hz)?);
        self.model = ModelState::Loaded;
        self.start_if_ready()?;
        Ok(())
    }

    /// Open and connect the source named in the configuration.
    pub fn open_configured_source(&mut self) -> Result<()> {
        let source = match open_source(&self.config.source) {
            Ok(source) => source,
            Err(err) => {
                log::error!("Error accessing camera: {:#}", err);
                self.video = VideoState::Failed(format!("{:#}", err));
                return Err(err);
            }
        };
        self.attach_source(source)
    }

    /// Connect `source` and record its dimensions for the session.
    pub fn attach_source<S: VideoSource + 'static>(&mut self, mut source: S) -> Result<()> {
        if let Err(err) = source
            .connect()
            .with_context(|| format!("connecting to {}", source.describe()))
        {
            log::error!("Error accessing camera: {:#}", err);
            self.video = VideoState::Failed(format!("{:#}", err));
            return Err(err);
        }
        let dims = source.dimensions().unwrap_or_else(|| {
            FrameDimensions::new(self.config.source.width, self.config.source.height)
        });
        log::info!("video source {} ready ({})", source.describe(), dims);

        if let Some(detection) = &self.detection {
            detection.stop();
        }
        self.source = Some(share_source(source));
        self.video = VideoState::Ready(dims);
        self.start_if_ready()?;
        Ok(())
    }

    fn start_if_ready(&mut self) -> Result<bool> {
        if self.model != ModelState::Loaded || self.source.is_none() {
            return Ok(false);
        }
        if self.is_running() {
            return Ok(false);
        }
        log::info!("Starting detection...");
        self.start_detection()
    }

    /// Start the detection loop. Returns `Ok(false)` if it is already running.
    pub fn start_detection(&mut self) -> Result<bool> {
        let detection = self
            .detection
            .as_ref()
            .ok_or_else(|| anyhow!("detector not loaded"))?;
        let source = self
            .source
            .clone()
            .ok_or_else(|| anyhow!("video source not attached"))?;
        let latest = self.latest.clone();
        let subscribers = self.subscribers.clone();
        detection.start(source, move |update| {
            lock(&subscribers).retain(|tx| tx.send(update.clone()).is_ok());
            *lock(&latest) = Some(update);
        })
    }

    /// Stop detection. Returns whether the loop was running.
    pub fn stop(&mut self) -> bool {
        match &self.detection {
            Some(detection) => {
                let stopped = detection.stop();
                if stopped {
                    log::info!("Stopping detection.");
                }
                stopped
            }
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.detection
            .as_ref()
            .map(DetectionLoop::is_running)
            .unwrap_or(false)
    }

    pub fn status(&self) -> Status {
        match (&self.model, &self.video) {
            (ModelState::Loading, _) => Status::LoadingModel,
            (ModelState::Failed(_), _) => Status::ModelUnavailable,
            (_, VideoState::Initializing | VideoState::Failed(_)) => Status::InitializingCamera,
            _ if self.is_running() => Status::Active,
            _ => Status::ReadyToStart,
        }
    }

    pub fn stats(&self) -> LoopStats {
        self.detection
            .as_ref()
            .map(DetectionLoop::stats)
            .unwrap_or_default()
    }

    /// Receive every update delivered from now on.
    pub fn subscribe(&self) -> mpsc::Receiver<DetectionUpdate> {
        let (tx, rx) = mpsc::channel();
        lock(&self.subscribers).push(tx);
        rx
    }

    /// Most recent update; each one replaces the previous.
    pub fn latest(&self) -> Option<DetectionUpdate> {
        lock(&self.latest).clone()
    }

    /// Dimensions fixed for the scene when the source became ready.
    pub fn session_dimensions(&self) -> FrameDimensions {
        match &self.video {
            VideoState::Ready(dims) => *dims,
            _ => FrameDimensions::new(self.config.source.width, self.config.source.height),
        }
    }

    /// Scene for the latest detections.
    pub fn scene(&self) -> SceneFrame {
        let detections = self
            .latest()
            .map(|update| update.detections)
            .unwrap_or_default();
        self.composer
            .compose(&detections, self.session_dimensions())
    }

    /// Redraw the overlay for the latest detections at the source's current size.
    pub fn draw_overlay<S: DrawSurface + ?Sized>(&mut self, surface: &mut S) -> Result<()> {
        let source = self
            .source
            .as_ref()
            .ok_or_else(|| anyhow!("video source not attached"))?;
        let dims = lock(source)
            .dimensions()
            .ok_or_else(|| anyhow!("video source has no dimensions yet"))?;
        let detections = self
            .latest()
            .map(|update| update.detections)
            .unwrap_or_default();
        self.overlay.draw(surface, &detections, dims)
    }
}

impl Drop for Dashboard {
    fn drop(&mut self) {
        if self.stop() {
            log::info!("Stopping detection on shutdown.");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::config::SourceSettings;
    use crate::detect::{share, StubBackend};
    use crate::ingest::SyntheticCamera;
    use crate::overlay::{DrawOp, RecordingSurface};

    fn config() -> DashboardConfig {
        DashboardConfig {
            source: SourceSettings {
                width: 320,
                height: 180,
                warmup_ms: 0,
                ..SourceSettings::default()
            },
            refresh_hz: 200,
            ..DashboardConfig::default()
        }
    }

    #[test]
    fn status_follows_startup_order() {
        let mut dash = Dashboard::new(config());
        assert_eq!(dash.status(), Status::LoadingModel);
        assert_eq!(dash.status().message(), "Loading AI model...");

        dash.load_model().unwrap();
        assert_eq!(dash.status(), Status::InitializingCamera);

        dash.open_configured_source().unwrap();
        assert_eq!(dash.status(), Status::Active);
        assert_eq!(dash.status().to_string(), "AR Vision System Active");

        assert!(dash.stop());
        assert_eq!(dash.status(), Status::ReadyToStart);
        assert!(!dash.stop());
    }

    #[test]
    fn source_first_then_model_still_starts() {
        let mut dash = Dashboard::new(config());
        dash.open_configured_source().unwrap();
        assert_eq!(dash.status(), Status::LoadingModel);
        assert!(!dash.is_running());

        dash.attach_detector(share(StubBackend::new(5))).unwrap();
        assert!(dash.is_running());
    }

    #[test]
    fn model_failure_is_reported() {
        let mut cfg = config();
        cfg.detector.backend = "missing".to_string();
        let mut dash = Dashboard::new(cfg);
        assert!(dash.load_model().is_err());
        assert!(matches!(dash.model_state(), ModelState::Failed(_)));
        assert_eq!(dash.status(), Status::ModelUnavailable);

        dash.open_configured_source().unwrap();
        assert!(!dash.is_running());
    }

    #[test]
    fn source_failure_keeps_initializing_status() {
        let mut cfg = config();
        cfg.source.url = "/nonexistent/frames".to_string();
        let mut dash = Dashboard::new(cfg);
        dash.load_model().unwrap();
        assert!(dash.open_configured_source().is_err());
        assert!(matches!(dash.video_state(), VideoState::Failed(_)));
        assert_eq!(dash.status(), Status::InitializingCamera);
    }

    #[test]
    fn updates_feed_scene_and_overlay() {
        let mut dash = Dashboard::new(config());
        let updates = dash.subscribe();
        dash.load_model().unwrap();
        dash.attach_source(SyntheticCamera::new(config().source)).unwrap();

        let update = updates.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(update.frame, FrameDimensions::new(320, 180));
        dash.stop();

        let latest = dash.latest().unwrap();
        let scene = dash.scene();
        let vehicles_and_people = latest
            .detections
            .iter()
            .filter(|d| matches!(d.class.as_str(), "person" | "car" | "truck" | "bus"))
            .count();
        assert_eq!(scene.objects.len(), vehicles_and_people);

        let mut surface = RecordingSurface::new();
        dash.draw_overlay(&mut surface).unwrap();
        assert_eq!(surface.dimensions(), FrameDimensions::new(320, 180));
        let boxes = surface
            .ops()
            .iter()
            .filter(|op| matches!(op, DrawOp::StrokeRect { .. }))
            .count();
        assert_eq!(boxes, latest.detections.len());
    }

    #[test]
    fn scene_is_empty_before_first_update() {
        let dash = Dashboard::new(config());
        assert!(dash.latest().is_none());
        assert!(dash.scene().objects.is_empty());
        assert_eq!(dash.session_dimensions(), FrameDimensions::new(320, 180));
    }
}
