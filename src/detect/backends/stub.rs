use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::detect::backend::DetectorBackend;
use crate::detect::result::{BBox, Detection};
use crate::frame::Frame;

/// Stub backend for demos and tests.
///
/// Emits a small synthetic traffic scene that drifts from frame to frame: a car
/// pulling away in the ego lane, a truck in the next lane, a pedestrian on the
/// kerb, and a bicycle that the scene composer filters out. Boxes scale with the
/// frame so any source resolution works.
pub struct StubBackend {
    rng: StdRng,
    frame_count: u64,
}

impl StubBackend {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            frame_count: 0,
        }
    }

    fn jitter(&mut self, span: f32) -> f32 {
        self.rng.gen_range(-span..=span)
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new(0)
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        self.frame_count += 1;
        let w = frame.width() as f32;
        let h = frame.height() as f32;
        // Phase in 0..1, one sweep every 240 frames.
        let phase = (self.frame_count % 240) as f32 / 240.0;

        let car_w = w * (0.22 - 0.12 * phase);
        let car_h = car_w * 0.7;
        let car_bottom = h * (0.95 - 0.35 * phase);
        let car = Detection::new(
            BBox::new(
                w * 0.5 - car_w / 2.0 + self.jitter(2.0),
                car_bottom - car_h,
                car_w,
                car_h,
            ),
            "car",
            0.91 + self.jitter(0.05),
        );

        let truck_w = w * 0.14;
        let truck_h = truck_w * 0.9;
        let truck = Detection::new(
            BBox::new(
                w * 0.72 + self.jitter(3.0),
                h * 0.62 - truck_h,
                truck_w,
                truck_h,
            ),
            "truck",
            0.78 + self.jitter(0.05),
        );

        let person_h = h * 0.2;
        let person = Detection::new(
            BBox::new(
                w * (0.08 + 0.1 * phase),
                h * 0.78 - person_h,
                person_h * 0.35,
                person_h,
            ),
            "person",
            0.84 + self.jitter(0.05),
        );

        let bicycle = Detection::new(
            BBox::new(w * 0.3, h * 0.7, w * 0.05, h * 0.06),
            "bicycle",
            0.55 + self.jitter(0.05),
        );

        Ok(vec![car, truck, person, bicycle])
    }
}
