//! road_scene - live detection dashboard
//!
//! This binary:
//! 1. Loads the configured object detector
//! 2. Connects the video source
//! 3. Runs the detection loop until Ctrl-C or `--seconds` elapse
//! 4. Optionally writes each scene (JSON) and overlay (PNG) to `--out`
//!
//! A detector or camera that fails to come up is reported on the status line;
//! the session keeps running until it is stopped.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use road_scene::{
    Dashboard, DashboardConfig, DetectionUpdate, FrameDimensions, ObjectCategory,
    OverlayRenderer, RasterSurface, SceneComposer, Status,
};

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(
    name = "road_scene",
    about = "Map live road detections into a first-person 3D scene"
)]
struct Args {
    /// Stop after this many seconds (runs until Ctrl-C when omitted).
    #[arg(long)]
    seconds: Option<u64>,
    /// Video source: stub://<name>, v4l2://<device>, /dev/videoN, or a frame directory.
    #[arg(long)]
    source: Option<String>,
    /// Detector backend (stub|tract).
    #[arg(long)]
    backend: Option<String>,
    /// ONNX model path for the tract backend.
    #[arg(long, value_name = "PATH")]
    model: Option<PathBuf>,
    /// Write scene_NNNN.json and overlay_NNNN.png per update into this directory.
    #[arg(long, value_name = "DIR")]
    out: Option<PathBuf>,
    /// UI mode for stderr progress.
    #[arg(long, value_enum, default_value = "auto")]
    ui: ui::UiMode,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = DashboardConfig::load()?;
    if let Some(source) = &args.source {
        config.source.url = source.clone();
    }
    if let Some(backend) = &args.backend {
        config.detector.backend = backend.to_lowercase();
    }
    if let Some(model) = &args.model {
        config.detector.model_path = Some(model.clone());
    }
    config.validate()?;

    let ui = ui::Ui::detect(args.ui);
    let mut dashboard = Dashboard::new(config);
    let updates = dashboard.subscribe();

    bring_up(&mut dashboard, &ui);

    let mut exporter = match &args.out {
        Some(dir) => Some(Exporter::new(dir.clone(), dashboard.session_dimensions())?),
        None => None,
    };

    let (stop_tx, stop_rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = stop_tx.send(());
    })
    .context("error setting Ctrl-C handler")?;

    let deadline = args
        .seconds
        .map(|secs| Instant::now() + Duration::from_secs(secs));
    let mut live = ui.live(dashboard.status().message());
    let mut skipped = 0u64;

    loop {
        if stop_rx.try_recv().is_ok() {
            log::info!("shutdown signal received");
            break;
        }
        if deadline.map(|at| Instant::now() >= at).unwrap_or(false) {
            break;
        }
        let update = match updates.recv_timeout(Duration::from_millis(100)) {
            Ok(update) => update,
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        };
        let (update, dropped) = newest(&updates, update);
        skipped += dropped;
        live.update(count_objects(&update));
        if let Some(exporter) = exporter.as_mut() {
            if let Err(err) = exporter.write(&update) {
                log::error!("export of update {} failed: {:#}", update.sequence, err);
            }
        }
    }

    let final_status = dashboard.status();
    dashboard.stop();
    let stats = dashboard.stats();
    log::info!(
        "iterations={} detections_run={} failures={} not_ready={} delivered={} discarded={} skipped={}",
        stats.iterations,
        stats.detections_run,
        stats.failures,
        stats.skipped_not_ready,
        stats.delivered,
        stats.discarded,
        skipped
    );
    let written = exporter.as_ref().map(|e| e.written).unwrap_or(0);
    let mark = if stats.delivered > 0 { "✔" } else { "✘" };
    live.finish(&format!(
        "{} {} | {} updates delivered, {} written",
        mark,
        final_status,
        stats.delivered,
        written
    ));
    Ok(())
}

/// Load the detector and connect the source. Failures stay on the dashboard status.
fn bring_up(dashboard: &mut Dashboard, ui: &ui::Ui) {
    let stage = ui.stage(Status::LoadingModel.message());
    if dashboard.load_model().is_err() {
        stage.fail(dashboard.status().message());
    } else {
        drop(stage);
    }

    let stage = ui.stage(Status::InitializingCamera.message());
    if dashboard.open_configured_source().is_err() {
        stage.fail("camera unavailable");
    } else {
        drop(stage);
    }

    if !dashboard.is_running() {
        log::warn!("detection not running: {}", dashboard.status());
    }
}

/// Skip queued updates the consumer fell behind on. Returns the newest and how many were dropped.
fn newest(updates: &mpsc::Receiver<DetectionUpdate>, mut update: DetectionUpdate) -> (DetectionUpdate, u64) {
    let mut dropped = 0;
    while let Ok(next) = updates.try_recv() {
        update = next;
        dropped += 1;
    }
    (update, dropped)
}

fn count_objects(update: &DetectionUpdate) -> ui::SceneCounts {
    let mut counts = ui::SceneCounts {
        detections: update.detections.len(),
        ..ui::SceneCounts::default()
    };
    for detection in &update.detections {
        match ObjectCategory::classify(&detection.class) {
            Some(ObjectCategory::Person) => counts.people += 1,
            Some(ObjectCategory::Vehicle) => counts.vehicles += 1,
            None => {}
        }
    }
    counts
}

/// Writes the scene and overlay for each received update.
struct Exporter {
    dir: PathBuf,
    session: FrameDimensions,
    composer: SceneComposer,
    renderer: OverlayRenderer,
    surface: RasterSurface,
    written: u64,
}

impl Exporter {
    fn new(dir: PathBuf, session: FrameDimensions) -> Result<Self> {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("creating output directory {}", dir.display()))?;
        Ok(Self {
            dir,
            session,
            composer: SceneComposer::new(),
            renderer: OverlayRenderer::new(),
            surface: RasterSurface::new()?,
            written: 0,
        })
    }

    fn write(&mut self, update: &DetectionUpdate) -> Result<()> {
        let scene = self.composer.compose(&update.detections, self.session);
        let scene_path = self.dir.join(format!("scene_{:04}.json", update.sequence));
        let json = serde_json::to_vec_pretty(&scene)?;
        std::fs::write(&scene_path, json)
            .with_context(|| format!("writing {}", scene_path.display()))?;

        self.renderer
            .draw(&mut self.surface, &update.detections, update.frame)?;
        self.surface
            .save_png(&self.dir.join(format!("overlay_{:04}.png", update.sequence)))?;
        self.written += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use road_scene::overlay::BOX_COLOR;
    use road_scene::{BBox, Detection};

    fn update(sequence: u64, detections: Vec<Detection>) -> DetectionUpdate {
        DetectionUpdate {
            detections,
            frame: FrameDimensions::new(320, 240),
            sequence,
        }
    }

    fn quiet_ui() -> ui::Ui {
        ui::Ui::new(ui::UiMode::Plain, false, true)
    }

    fn config(url: &str, backend: &str) -> DashboardConfig {
        let mut config = DashboardConfig::default();
        config.source.url = url.to_string();
        config.source.width = 320;
        config.source.height = 240;
        config.source.warmup_ms = 0;
        config.detector.backend = backend.to_string();
        config
    }

    #[test]
    fn export_uses_the_received_update() {
        let dir = tempfile::tempdir().unwrap();
        let mut exporter =
            Exporter::new(dir.path().join("out"), FrameDimensions::new(320, 240)).unwrap();
        let car = Detection::new(BBox::new(100.0, 100.0, 50.0, 50.0), "car", 0.9);
        exporter.write(&update(7, vec![car])).unwrap();
        exporter.write(&update(8, Vec::new())).unwrap();
        assert_eq!(exporter.written, 2);

        let scene: serde_json::Value = serde_json::from_slice(
            &std::fs::read(dir.path().join("out/scene_0007.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(scene["objects"].as_array().map(Vec::len), Some(1));
        assert_eq!(scene["objects"][0]["category"], "vehicle");

        let overlay = image::open(dir.path().join("out/overlay_0007.png"))
            .unwrap()
            .to_rgba8();
        assert_eq!(overlay.dimensions(), (320, 240));
        assert_eq!(*overlay.get_pixel(150, 140), BOX_COLOR);

        let empty = image::open(dir.path().join("out/overlay_0008.png"))
            .unwrap()
            .to_rgba8();
        assert!(empty.pixels().all(|p| p.0[3] == 0));
    }

    #[test]
    fn newest_drops_stale_updates() {
        let (tx, rx) = mpsc::channel();
        for sequence in 2..=4 {
            tx.send(update(sequence, Vec::new())).unwrap();
        }
        let (latest, dropped) = newest(&rx, update(1, Vec::new()));
        assert_eq!(latest.sequence, 4);
        assert_eq!(dropped, 3);

        let (latest, dropped) = newest(&rx, update(5, Vec::new()));
        assert_eq!(latest.sequence, 5);
        assert_eq!(dropped, 0);
    }

    #[test]
    fn missing_camera_keeps_session_alive() {
        let mut dashboard = Dashboard::new(config("/nonexistent/frames", "stub"));
        bring_up(&mut dashboard, &quiet_ui());
        assert!(!dashboard.is_running());
        assert_eq!(dashboard.status(), Status::InitializingCamera);
        assert_eq!(dashboard.status().message(), "Initializing camera...");
    }

    #[test]
    fn missing_model_reports_unavailable() {
        let mut dashboard = Dashboard::new(config("stub://road", "missing"));
        bring_up(&mut dashboard, &quiet_ui());
        assert!(!dashboard.is_running());
        assert_eq!(dashboard.status().message(), "AI model unavailable");
    }

    #[test]
    fn healthy_startup_runs_detection() {
        let mut dashboard = Dashboard::new(config("stub://road", "stub"));
        bring_up(&mut dashboard, &quiet_ui());
        assert!(dashboard.is_running());
        assert_eq!(dashboard.status(), Status::Active);
        dashboard.stop();
    }
}
