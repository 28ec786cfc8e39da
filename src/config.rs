use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::detect::BACKEND_NAMES;

const DEFAULT_SOURCE_URL: &str = "stub://road";
const DEFAULT_WIDTH: u32 = 1280;
const DEFAULT_HEIGHT: u32 = 720;
const DEFAULT_WARMUP_MS: u64 = 250;
const DEFAULT_BACKEND: &str = "stub";
const DEFAULT_MIN_SCORE: f32 = 0.0;
const DEFAULT_MAX_DETECTIONS: usize = 100;
const DEFAULT_REFRESH_HZ: u32 = 60;

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct DashboardConfigFile {
    refresh_hz: Option<u32>,
    source: Option<SourceConfigFile>,
    detector: Option<DetectorConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct SourceConfigFile {
    url: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    warmup_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct DetectorConfigFile {
    backend: Option<String>,
    model_path: Option<PathBuf>,
    min_score: Option<f32>,
    max_detections: Option<usize>,
    seed: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct DashboardConfig {
    pub source: SourceSettings,
    pub detector: DetectorSettings,
    /// Frame clock rate driving the detection loop.
    pub refresh_hz: u32,
}

/// Video source selection and requested capture size.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSettings {
    pub url: String,
    pub width: u32,
    pub height: u32,
    /// Synthetic camera only: time spent reporting metadata before frames flow.
    pub warmup_ms: u64,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_SOURCE_URL.to_string(),
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            warmup_ms: DEFAULT_WARMUP_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectorSettings {
    pub backend: String,
    pub model_path: Option<PathBuf>,
    pub min_score: f32,
    pub max_detections: usize,
    /// Stub backend only.
    pub seed: u64,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            backend: DEFAULT_BACKEND.to_string(),
            model_path: None,
            min_score: DEFAULT_MIN_SCORE,
            max_detections: DEFAULT_MAX_DETECTIONS,
            seed: 0,
        }
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            source: SourceSettings::default(),
            detector: DetectorSettings::default(),
            refresh_hz: DEFAULT_REFRESH_HZ,
        }
    }
}

impl DashboardConfig {
    /// Defaults, then the file named by `ROAD_SCENE_CONFIG`, then `ROAD_SCENE_*` overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("ROAD_SCENE_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: DashboardConfigFile) -> Self {
        let source_file = file.source.unwrap_or_default();
        let detector_file = file.detector.unwrap_or_default();
        let source_defaults = SourceSettings::default();
        let detector_defaults = DetectorSettings::default();

        let source = SourceSettings {
            url: source_file.url.unwrap_or(source_defaults.url),
            width: source_file.width.unwrap_or(source_defaults.width),
            height: source_file.height.unwrap_or(source_defaults.height),
            warmup_ms: source_file.warmup_ms.unwrap_or(source_defaults.warmup_ms),
        };
        let detector = DetectorSettings {
            backend: detector_file.backend.unwrap_or(detector_defaults.backend),
            model_path: detector_file.model_path,
            min_score: detector_file.min_score.unwrap_or(detector_defaults.min_score),
            max_detections: detector_file
                .max_detections
                .unwrap_or(detector_defaults.max_detections),
            seed: detector_file.seed.unwrap_or(detector_defaults.seed),
        };
        Self {
            source,
            detector,
            refresh_hz: file.refresh_hz.unwrap_or(DEFAULT_REFRESH_HZ),
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var("ROAD_SCENE_SOURCE") {
            if !url.trim().is_empty() {
                self.source.url = url;
            }
        }
        if let Ok(backend) = std::env::var("ROAD_SCENE_BACKEND") {
            if !backend.trim().is_empty() {
                self.detector.backend = backend.trim().to_lowercase();
            }
        }
        if let Ok(path) = std::env::var("ROAD_SCENE_MODEL") {
            if !path.trim().is_empty() {
                self.detector.model_path = Some(PathBuf::from(path));
            }
        }
        if let Ok(hz) = std::env::var("ROAD_SCENE_REFRESH_HZ") {
            self.refresh_hz = hz
                .trim()
                .parse()
                .map_err(|_| anyhow!("ROAD_SCENE_REFRESH_HZ must be an integer rate in Hz"))?;
        }
        if let Ok(score) = std::env::var("ROAD_SCENE_MIN_SCORE") {
            self.detector.min_score = score
                .trim()
                .parse()
                .map_err(|_| anyhow!("ROAD_SCENE_MIN_SCORE must be a number between 0 and 1"))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.source.url.trim().is_empty() {
            return Err(anyhow!("source url must not be empty"));
        }
        if self.source.width == 0 || self.source.height == 0 {
            return Err(anyhow!(
                "source dimensions must be non-zero, got {}x{}",
                self.source.width,
                self.source.height
            ));
        }
        if !BACKEND_NAMES.contains(&self.detector.backend.as_str()) {
            return Err(anyhow!(
                "unknown detector backend '{}' (expected one of: {})",
                self.detector.backend,
                BACKEND_NAMES.join(", ")
            ));
        }
        if self.detector.backend == "tract" && self.detector.model_path.is_none() {
            return Err(anyhow!("detector backend 'tract' requires model_path"));
        }
        if !(0.0..=1.0).contains(&self.detector.min_score) {
            return Err(anyhow!(
                "min_score must be within [0, 1], got {}",
                self.detector.min_score
            ));
        }
        if self.detector.max_detections == 0 {
            return Err(anyhow!("max_detections must be greater than zero"));
        }
        if self.refresh_hz == 0 {
            return Err(anyhow!("refresh_hz must be greater than zero"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<DashboardConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("toml"))
        .unwrap_or(false);
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let cfg = DashboardConfig::from_file(DashboardConfigFile::default());
        assert_eq!(cfg.source, SourceSettings::default());
        assert_eq!(cfg.detector, DetectorSettings::default());
        assert_eq!(cfg.refresh_hz, 60);
        assert_eq!((cfg.source.width, cfg.source.height), (1280, 720));
        cfg.validate().unwrap();
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let file: DashboardConfigFile =
            serde_json::from_str(r#"{"source":{"width":640},"detector":{"min_score":0.4}}"#)
                .unwrap();
        let cfg = DashboardConfig::from_file(file);
        assert_eq!(cfg.source.width, 640);
        assert_eq!(cfg.source.height, 720);
        assert_eq!(cfg.source.url, "stub://road");
        assert_eq!(cfg.detector.min_score, 0.4);
        assert_eq!(cfg.detector.backend, "stub");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(serde_json::from_str::<DashboardConfigFile>(r#"{"fps":30}"#).is_err());
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut cfg = DashboardConfig::default();
        cfg.detector.min_score = 1.5;
        assert!(cfg.validate().is_err());

        let mut cfg = DashboardConfig::default();
        cfg.detector.backend = "tract".to_string();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("model_path"));

        let mut cfg = DashboardConfig::default();
        cfg.source.height = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = DashboardConfig::default();
        cfg.refresh_hz = 0;
        assert!(cfg.validate().is_err());
    }
}
