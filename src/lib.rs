//! Road Scene
//!
//! Overlays road objects detected in a live camera feed onto a simplified
//! first-person 3D driving scene.
//!
//! # Architecture
//!
//! A detection loop pulls frames from a video source, runs an object detector
//! on each one and hands the resulting list to two consumers:
//!
//! 1. **Overlay**: boxes and labels drawn in source-frame pixels onto a 2D
//!    surface that always matches the source size.
//! 2. **Scene**: people and vehicles mapped onto a fixed road plane and
//!    exported as a declarative scene for an external 3D renderer.
//!
//! Every detection list fully replaces the previous one. Nothing is tracked
//! across frames and the scene is a pure function of the latest list.
//!
//! # Module Structure
//!
//! - `mapping`: image-space to scene-space coordinate mapping
//! - `scene`: static scene plus per-frame object proxies
//! - `overlay`: 2D box/label drawing onto a `DrawSurface`
//! - `detection_loop`: start/stop controller for the capture-detect cycle
//! - `clock`: refresh-rate frame clock driving the loop
//! - `detect`: detector trait, backends, COCO labels
//! - `ingest`: video sources (synthetic, image sequence, V4L2)
//! - `dashboard`: application shell tying the pieces together
//! - `config`: configuration file and environment overrides

pub mod clock;
pub mod config;
pub mod dashboard;
pub mod detect;
pub mod detection_loop;
pub mod frame;
pub mod ingest;
pub mod mapping;
pub mod overlay;
pub mod scene;

pub use clock::{FrameClock, RefreshClock};
pub use config::{DashboardConfig, DetectorSettings, SourceSettings};
pub use dashboard::{Dashboard, ModelState, Status, VideoState};
pub use detect::{
    load_backend, share, BBox, Detection, DetectionUpdate, DetectorBackend, SharedDetector,
    StubBackend,
};
pub use detection_loop::{DetectionLoop, LoopStats};
pub use frame::{Frame, FrameDimensions};
#[cfg(feature = "ingest-v4l2")]
pub use ingest::V4l2Camera;
pub use ingest::{
    open_source, share_source, ImageSequenceSource, ReadyState, SharedSource, SyntheticCamera,
    VideoSource,
};
pub use mapping::{
    detection_to_scene_object, map_range, ObjectCategory, SceneObjectProxy, Vec3,
};
pub use overlay::{DrawSurface, OverlayRenderer, RasterSurface, RecordingSurface};
pub use scene::{compose_proxies, SceneComposer, SceneFrame};
