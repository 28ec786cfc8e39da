use std::sync::Mutex;

use tempfile::{Builder, NamedTempFile};

use road_scene::config::DashboardConfig;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "ROAD_SCENE_CONFIG",
        "ROAD_SCENE_SOURCE",
        "ROAD_SCENE_BACKEND",
        "ROAD_SCENE_MODEL",
        "ROAD_SCENE_REFRESH_HZ",
        "ROAD_SCENE_MIN_SCORE",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_defaults_without_config() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = DashboardConfig::load().expect("load defaults");
    assert_eq!(cfg.source.url, "stub://road");
    assert_eq!((cfg.source.width, cfg.source.height), (1280, 720));
    assert_eq!(cfg.detector.backend, "stub");
    assert!(cfg.detector.model_path.is_none());
    assert_eq!(cfg.detector.min_score, 0.0);
    assert_eq!(cfg.refresh_hz, 60);
}

#[test]
fn loads_json_config_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "refresh_hz": 30,
        "source": {
            "url": "frames/highway",
            "width": 640,
            "height": 360,
            "warmup_ms": 0
        },
        "detector": {
            "backend": "stub",
            "min_score": 0.25,
            "max_detections": 20,
            "seed": 9
        }
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("ROAD_SCENE_CONFIG", file.path());
    std::env::set_var("ROAD_SCENE_SOURCE", "stub://night");
    std::env::set_var("ROAD_SCENE_MIN_SCORE", "0.5");

    let cfg = DashboardConfig::load().expect("load config");

    assert_eq!(cfg.refresh_hz, 30);
    assert_eq!(cfg.source.url, "stub://night");
    assert_eq!(cfg.source.width, 640);
    assert_eq!(cfg.source.height, 360);
    assert_eq!(cfg.source.warmup_ms, 0);
    assert_eq!(cfg.detector.min_score, 0.5);
    assert_eq!(cfg.detector.max_detections, 20);
    assert_eq!(cfg.detector.seed, 9);

    clear_env();
}

#[test]
fn loads_toml_config() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("temp config");
    let toml = r#"
refresh_hz = 24

[detector]
backend = "tract"
model_path = "models/ssd_mobilenet.onnx"
"#;
    std::io::Write::write_all(&mut file, toml.as_bytes()).expect("write config");
    std::env::set_var("ROAD_SCENE_CONFIG", file.path());

    let cfg = DashboardConfig::load().expect("load toml config");
    assert_eq!(cfg.refresh_hz, 24);
    assert_eq!(cfg.detector.backend, "tract");
    assert_eq!(
        cfg.detector.model_path.as_deref(),
        Some(std::path::Path::new("models/ssd_mobilenet.onnx"))
    );
    assert_eq!(cfg.source.url, "stub://road");

    clear_env();
}

#[test]
fn rejects_invalid_env_values() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("ROAD_SCENE_REFRESH_HZ", "fast");
    assert!(DashboardConfig::load().is_err());
    clear_env();

    std::env::set_var("ROAD_SCENE_REFRESH_HZ", "0");
    assert!(DashboardConfig::load().is_err());
    clear_env();

    std::env::set_var("ROAD_SCENE_BACKEND", "tract");
    let err = DashboardConfig::load().expect_err("tract without model");
    assert!(err.to_string().contains("model_path"));
    std::env::set_var("ROAD_SCENE_MODEL", "model.onnx");
    assert!(DashboardConfig::load().is_ok());

    clear_env();
}

#[test]
fn rejects_missing_or_malformed_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("ROAD_SCENE_CONFIG", "/nonexistent/road_scene.json");
    let err = DashboardConfig::load().expect_err("missing file");
    assert!(err.to_string().contains("failed to read config file"));

    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, b"{ not json").expect("write config");
    std::env::set_var("ROAD_SCENE_CONFIG", file.path());
    let err = DashboardConfig::load().expect_err("malformed file");
    assert!(err.to_string().contains("invalid config file"));

    clear_env();
}
