//! Declarative 3D scene for an external renderer.
//!
//! The static part (camera, lights, fog, road) is fixed for the session. The
//! dynamic part is recomputed from scratch for every detection update: filter to
//! road classes, map each detection into scene space, key it for this frame only.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::detect::Detection;
use crate::frame::FrameDimensions;
use crate::mapping::{detection_to_scene_object, SceneObjectProxy, Vec3, ROAD_LENGTH, ROAD_WIDTH};

/// Camera eye height above the road plane.
pub const EYE_HEIGHT: f32 = 1.6;
/// Downward pitch of the first-person camera, radians.
pub const CAMERA_PITCH: f32 = -0.1;
pub const CAMERA_FOV_DEG: f32 = 60.0;
pub const FOG_NEAR: f32 = 15.0;
pub const FOG_FAR: f32 = 80.0;

/// Filter detections to road classes and map them into scene space, preserving input order.
pub fn compose_proxies(
    detections: &[Detection],
    frame_width: f32,
    frame_height: f32,
) -> Vec<SceneObjectProxy> {
    indexed_proxies(detections, frame_width, frame_height)
        .map(|(_, proxy)| proxy)
        .collect()
}

/// Mapped proxies paired with the index of the detection they came from.
fn indexed_proxies(
    detections: &[Detection],
    frame_width: f32,
    frame_height: f32,
) -> impl Iterator<Item = (usize, SceneObjectProxy)> + '_ {
    detections.iter().enumerate().filter_map(move |(index, d)| {
        detection_to_scene_object(d, frame_width, frame_height).map(|proxy| (index, proxy))
    })
}

/// Per-frame render key derived from the bbox and the detection's index in the list.
///
/// Keys are only unique within one frame; two frames never share identity.
pub fn render_key(detection: &Detection, index: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update((index as u64).to_le_bytes());
    for v in <[f32; 4]>::from(detection.bbox) {
        hasher.update(v.to_le_bytes());
    }
    let digest: [u8; 32] = hasher.finalize().into();
    hex::encode(&digest[..8])
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PerspectiveCamera {
    pub position: Vec3,
    /// Euler rotation in radians.
    pub rotation: Vec3,
    pub fov_deg: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Light {
    Ambient {
        intensity: f32,
    },
    Directional {
        position: Vec3,
        intensity: f32,
        cast_shadow: bool,
    },
    Hemisphere {
        sky_color: String,
        ground_color: String,
        intensity: f32,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Fog {
    pub color: String,
    pub near: f32,
    pub far: f32,
}

/// Flat road plane lying on y = 0 and extending ahead of the camera.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoadPlane {
    pub width: f32,
    pub length: f32,
    pub position: Vec3,
    pub rotation: Vec3,
    pub color: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub color: String,
    pub roughness: f32,
    pub metalness: f32,
}

/// One detection proxy as handed to the renderer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SceneObject {
    pub key: String,
    #[serde(flatten)]
    pub proxy: SceneObjectProxy,
    pub material: Material,
}

/// Everything the renderer needs for one frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SceneFrame {
    pub camera: PerspectiveCamera,
    pub lights: Vec<Light>,
    pub fog: Fog,
    pub road: RoadPlane,
    pub objects: Vec<SceneObject>,
}

/// Fixed scene elements, configured once.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StaticScene {
    pub camera: PerspectiveCamera,
    pub lights: Vec<Light>,
    pub fog: Fog,
    pub road: RoadPlane,
}

impl Default for StaticScene {
    fn default() -> Self {
        Self {
            camera: PerspectiveCamera {
                position: Vec3::new(0.0, EYE_HEIGHT, 0.0),
                rotation: Vec3::new(CAMERA_PITCH, 0.0, 0.0),
                fov_deg: CAMERA_FOV_DEG,
            },
            lights: vec![
                Light::Ambient { intensity: 0.5 },
                Light::Directional {
                    position: Vec3::new(10.0, 20.0, 5.0),
                    intensity: 1.5,
                    cast_shadow: true,
                },
                Light::Hemisphere {
                    sky_color: "#00ffff".to_string(),
                    ground_color: "#444444".to_string(),
                    intensity: 0.8,
                },
            ],
            fog: Fog {
                color: "#11111a".to_string(),
                near: FOG_NEAR,
                far: FOG_FAR,
            },
            road: RoadPlane {
                width: ROAD_WIDTH,
                length: ROAD_LENGTH,
                position: Vec3::new(0.0, 0.0, -ROAD_LENGTH / 2.0),
                rotation: Vec3::new(-std::f32::consts::FRAC_PI_2, 0.0, 0.0),
                color: "#222222".to_string(),
            },
        }
    }
}

/// Builds a `SceneFrame` from the latest detection list.
#[derive(Clone, Debug, Default)]
pub struct SceneComposer {
    base: StaticScene,
}

impl SceneComposer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn static_scene(&self) -> &StaticScene {
        &self.base
    }

    /// Compose the full scene. Output depends only on the inputs and the static scene.
    pub fn compose(&self, detections: &[Detection], frame: FrameDimensions) -> SceneFrame {
        let objects = indexed_proxies(detections, frame.width as f32, frame.height as f32)
            .map(|(index, proxy)| SceneObject {
                key: render_key(&detections[index], index),
                material: Material {
                    color: proxy.category.color().to_string(),
                    roughness: 0.6,
                    metalness: 0.2,
                },
                proxy,
            })
            .collect();

        SceneFrame {
            camera: self.base.camera.clone(),
            lights: self.base.lights.clone(),
            fog: self.base.fog.clone(),
            road: self.base.road.clone(),
            objects,
        }
    }
}
