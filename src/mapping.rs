//! Image-space to scene-space mapping.
//!
//! Turns a 2D detection into a box resting on the road plane of the 3D scene:
//!
//! - horizontal position follows the bbox center across the road width,
//! - depth follows the bbox bottom edge over the lower half of the frame,
//!   from `DEPTH_AT_MID_FRAME` at mid-frame to `DEPTH_AT_FRAME_BOTTOM` at the
//!   bottom edge,
//! - footprint is a fixed size per category, independent of bbox size.
//!
//! The mapping is unclamped. Detections whose bottom edge sits in the top half
//! of the frame extrapolate beyond `[-60, -5]`; that is accepted behavior.

use serde::{Deserialize, Serialize};

use crate::detect::Detection;

/// Road surface width in scene units.
pub const ROAD_WIDTH: f32 = 20.0;
/// Road surface length in scene units.
pub const ROAD_LENGTH: f32 = 100.0;
/// Scene depth for a bbox whose bottom edge is at mid-frame.
pub const DEPTH_AT_MID_FRAME: f32 = -5.0;
/// Scene depth for a bbox touching the bottom edge of the frame.
pub const DEPTH_AT_FRAME_BOTTOM: f32 = -60.0;

/// Linear interpolation of `value` from `[in_min, in_max]` into `[out_min, out_max]`.
///
/// No clamping: inputs outside the input range extrapolate. Returns `None` when
/// the input range is degenerate (`in_min == in_max`).
pub fn map_range(value: f32, in_min: f32, in_max: f32, out_min: f32, out_max: f32) -> Option<f32> {
    let span = in_max - in_min;
    if span == 0.0 {
        return None;
    }
    Some((value - in_min) * (out_max - out_min) / span + out_min)
}

/// Scene category of a detection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectCategory {
    Person,
    Vehicle,
}

impl ObjectCategory {
    /// Classify a detector label. Only road-relevant labels map to a category.
    pub fn classify(label: &str) -> Option<Self> {
        match label {
            "person" => Some(Self::Person),
            "car" | "truck" | "bus" => Some(Self::Vehicle),
            _ => None,
        }
    }

    /// Fixed proxy size `(width, height, depth)` in scene units.
    pub fn footprint(self) -> Vec3 {
        match self {
            Self::Person => Vec3::new(0.5, 1.8, 0.5),
            Self::Vehicle => Vec3::new(2.2, 1.5, 4.5),
        }
    }

    /// Display color as a CSS hex string.
    pub fn color(self) -> &'static str {
        match self {
            Self::Person => "#ff4d4d",
            Self::Vehicle => "#4d4dff",
        }
    }
}

/// Point or extent in scene space. Serialized as `[x, y, z]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 3]", into = "[f32; 3]")]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

impl From<[f32; 3]> for Vec3 {
    fn from(v: [f32; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }
}

impl From<Vec3> for [f32; 3] {
    fn from(v: Vec3) -> Self {
        [v.x, v.y, v.z]
    }
}

/// Box standing in for one detection in the 3D scene, valid for a single frame.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SceneObjectProxy {
    pub position: Vec3,
    pub footprint: Vec3,
    pub category: ObjectCategory,
}

/// Map a detection into scene space.
///
/// Returns `None` for labels outside the road classes, and for a zero-sized
/// frame (degenerate mapping range). Bbox geometry is not validated.
pub fn detection_to_scene_object(
    detection: &Detection,
    frame_width: f32,
    frame_height: f32,
) -> Option<SceneObjectProxy> {
    let category = ObjectCategory::classify(&detection.class)?;
    let half_road = ROAD_WIDTH / 2.0;

    let x = map_range(
        detection.bbox.center_x(),
        0.0,
        frame_width,
        -half_road,
        half_road,
    )?;
    let z = map_range(
        detection.bbox.bottom_y(),
        frame_height / 2.0,
        frame_height,
        DEPTH_AT_MID_FRAME,
        DEPTH_AT_FRAME_BOTTOM,
    )?;

    let footprint = category.footprint();
    Some(SceneObjectProxy {
        position: Vec3::new(x, footprint.y / 2.0, z),
        footprint,
        category,
    })
}
