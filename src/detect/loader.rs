use anyhow::{anyhow, Result};

use crate::config::DetectorSettings;
use crate::detect::backend::{share, DetectorBackend, SharedDetector};
use crate::detect::backends::StubBackend;
use crate::detect::result::Detection;
use crate::frame::{Frame, FrameDimensions};

/// Backend names accepted by `load_backend`.
pub const BACKEND_NAMES: &[&str] = &["stub", "tract"];

/// Load the configured detector once and run its warm-up hook.
///
/// `input` is the frame size the backend will see; fixed-shape models are
/// compiled for it. Any failure here leaves the caller without a detector,
/// which the dashboard reports as "model unavailable".
pub fn load_backend(settings: &DetectorSettings, input: FrameDimensions) -> Result<SharedDetector> {
    log::info!("Loading {} detector...", settings.backend);
    let mut backend = build_backend(settings, input)?;
    backend.warm_up()?;
    log::info!("Detector '{}' loaded successfully.", backend.name());
    Ok(share(Thresholded {
        inner: backend,
        min_score: settings.min_score,
        max_detections: settings.max_detections,
    }))
}

fn build_backend(
    settings: &DetectorSettings,
    input: FrameDimensions,
) -> Result<Box<dyn DetectorBackend>> {
    match settings.backend.as_str() {
        "stub" => Ok(Box::new(StubBackend::new(settings.seed))),
        "tract" => build_tract(settings, input),
        other => Err(anyhow!(
            "unknown detector backend '{}' (expected one of: {})",
            other,
            BACKEND_NAMES.join(", ")
        )),
    }
}

#[cfg(feature = "backend-tract")]
fn build_tract(
    settings: &DetectorSettings,
    input: FrameDimensions,
) -> Result<Box<dyn DetectorBackend>> {
    use crate::detect::backends::TractBackend;

    let model_path = settings
        .model_path
        .as_ref()
        .ok_or_else(|| anyhow!("tract backend requires a model path"))?;
    let backend = TractBackend::new(model_path, input.width, input.height)?
        .with_min_score(settings.min_score)
        .with_max_detections(settings.max_detections);
    Ok(Box::new(backend))
}

#[cfg(not(feature = "backend-tract"))]
fn build_tract(
    _settings: &DetectorSettings,
    _input: FrameDimensions,
) -> Result<Box<dyn DetectorBackend>> {
    Err(anyhow!("tract backend requires the backend-tract feature"))
}

/// Applies the configured score floor and box cap on top of any backend.
struct Thresholded {
    inner: Box<dyn DetectorBackend>,
    min_score: f32,
    max_detections: usize,
}

impl DetectorBackend for Thresholded {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        let mut detections = self.inner.detect(frame)?;
        detections.retain(|d| d.score >= self.min_score);
        detections.truncate(self.max_detections);
        Ok(detections)
    }

    fn warm_up(&mut self) -> Result<()> {
        self.inner.warm_up()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(backend: &str) -> DetectorSettings {
        DetectorSettings {
            backend: backend.to_string(),
            ..DetectorSettings::default()
        }
    }

    #[test]
    fn loads_stub_backend() {
        let detector = load_backend(&settings("stub"), FrameDimensions::new(64, 48)).unwrap();
        assert_eq!(detector.lock().unwrap().name(), "stub");
    }

    #[test]
    fn unknown_backend_fails_to_load() {
        let err = load_backend(&settings("yolo9000"), FrameDimensions::new(64, 48))
            .err()
            .expect("load must fail");
        assert!(err.to_string().contains("unknown detector backend"));
    }

    #[test]
    fn settings_filter_low_scores_and_cap_count() {
        let settings = DetectorSettings {
            min_score: 0.8,
            max_detections: 1,
            ..DetectorSettings::default()
        };
        let detector = load_backend(&settings, FrameDimensions::new(64, 48)).unwrap();
        let frame = Frame::new(vec![0u8; 64 * 48 * 3], 64, 48).unwrap();
        let detections = detector.lock().unwrap().detect(&frame).unwrap();
        assert_eq!(detections.len(), 1);
        assert!(detections[0].score >= 0.8);
    }

    #[cfg(not(feature = "backend-tract"))]
    #[test]
    fn tract_backend_requires_feature() {
        assert!(load_backend(&settings("tract"), FrameDimensions::new(64, 48)).is_err());
    }
}
