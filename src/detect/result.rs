use serde::{Deserialize, Serialize};

use crate::frame::FrameDimensions;

/// Axis-aligned bounding box in source-frame pixels.
///
/// Serialized as `[x, y, width, height]`, the layout detectors emit.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 4]", into = "[f32; 4]")]
pub struct BBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn center_x(&self) -> f32 {
        self.x + self.width / 2.0
    }

    pub fn bottom_y(&self) -> f32 {
        self.y + self.height
    }
}

impl From<[f32; 4]> for BBox {
    fn from(v: [f32; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

impl From<BBox> for [f32; 4] {
    fn from(b: BBox) -> Self {
        [b.x, b.y, b.width, b.height]
    }
}

/// One classified bounding box from a single detection cycle.
///
/// Detections carry no identity; each cycle's list replaces the previous one.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub bbox: BBox,
    pub class: String,
    /// Confidence in 0..=1.
    pub score: f32,
}

impl Detection {
    pub fn new(bbox: BBox, class: impl Into<String>, score: f32) -> Self {
        Self {
            bbox,
            class: class.into(),
            score,
        }
    }
}

/// Payload delivered to the detection loop's result callback.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectionUpdate {
    pub detections: Vec<Detection>,
    /// Dimensions of the frame the detections were computed on.
    pub frame: FrameDimensions,
    /// 1-based count of updates delivered by the current run.
    pub sequence: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bbox_serializes_as_array() {
        let det = Detection::new(BBox::new(100.0, 100.0, 50.0, 50.0), "car", 0.9);
        let json = serde_json::to_string(&det).unwrap();
        assert_eq!(json, r#"{"bbox":[100.0,100.0,50.0,50.0],"class":"car","score":0.9}"#);
        let back: Detection = serde_json::from_str(&json).unwrap();
        assert_eq!(back, det);
    }

    #[test]
    fn bbox_center_and_bottom() {
        let b = BBox::new(10.0, 20.0, 30.0, 40.0);
        assert_eq!(b.center_x(), 25.0);
        assert_eq!(b.bottom_y(), 60.0);
    }
}
