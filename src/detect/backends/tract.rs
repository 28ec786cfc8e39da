#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use crate::detect::backend::DetectorBackend;
use crate::detect::labels::coco_label;
use crate::detect::result::{BBox, Detection};
use crate::frame::Frame;

const DEFAULT_MAX_DETECTIONS: usize = 20;
const DEFAULT_MIN_SCORE: f32 = 0.5;

/// Tract-based backend for SSD-style COCO detectors exported to ONNX.
///
/// The model takes a `u8` NHWC tensor `[1, height, width, 3]` and produces, in
/// order: boxes `[1, N, 4]` as normalized `(ymin, xmin, ymax, xmax)`, class ids
/// `[1, N]`, scores `[1, N]`, and optionally a detection count `[1]`.
pub struct TractBackend {
    model: TypedRunnableModel<TypedModel>,
    width: u32,
    height: u32,
    min_score: f32,
    max_detections: usize,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference at a fixed frame size.
    pub fn new<P: AsRef<Path>>(model_path: P, width: u32, height: u32) -> Result<Self> {
        let model_path = model_path.as_ref();
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    u8::datum_type(),
                    tvec!(1, height as usize, width as usize, 3),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            width,
            height,
            min_score: DEFAULT_MIN_SCORE,
            max_detections: DEFAULT_MAX_DETECTIONS,
        })
    }

    /// Override the default score threshold.
    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score;
        self
    }

    /// Override the default cap on returned boxes.
    pub fn with_max_detections(mut self, max_detections: usize) -> Self {
        self.max_detections = max_detections;
        self
    }

    /// Frames of any size are scaled to the compiled input shape. Boxes decode
    /// from normalized coordinates, so they land back in source pixels.
    fn build_input(&self, frame: &Frame) -> Result<Tensor> {
        let pixels = if frame.width() == self.width && frame.height() == self.height {
            frame.pixels().to_vec()
        } else {
            frame
                .resized(self.width, self.height)
                .with_context(|| format!("scaling {} frame to model input", frame.dimensions()))?
                .pixels()
                .to_vec()
        };
        let input = tract_ndarray::Array4::from_shape_vec(
            (1, self.height as usize, self.width as usize, 3),
            pixels,
        )
        .context("frame buffer does not fit model input shape")?;
        Ok(input.into_tensor())
    }

    fn decode(&self, outputs: &TVec<TValue>, frame: &Frame) -> Result<Vec<Detection>> {
        if outputs.len() < 3 {
            return Err(anyhow!(
                "expected boxes, classes and scores outputs, model produced {}",
                outputs.len()
            ));
        }
        let boxes = outputs[0]
            .to_array_view::<f32>()
            .context("boxes output was not f32")?;
        let classes = outputs[1]
            .to_array_view::<f32>()
            .context("classes output was not f32")?;
        let scores = outputs[2]
            .to_array_view::<f32>()
            .context("scores output was not f32")?;

        let boxes: Vec<f32> = boxes.iter().copied().collect();
        let classes: Vec<f32> = classes.iter().copied().collect();
        let scores: Vec<f32> = scores.iter().copied().collect();
        if boxes.len() != scores.len() * 4 || classes.len() != scores.len() {
            return Err(anyhow!(
                "inconsistent detector outputs: {} box values, {} classes, {} scores",
                boxes.len(),
                classes.len(),
                scores.len()
            ));
        }

        let fw = frame.width() as f32;
        let fh = frame.height() as f32;
        let mut detections: Vec<Detection> = scores
            .iter()
            .enumerate()
            .filter(|(_, score)| **score >= self.min_score)
            .filter_map(|(i, score)| {
                let label = coco_label(classes[i].round() as u32)?;
                let b = &boxes[i * 4..i * 4 + 4];
                let (ymin, xmin, ymax, xmax) = (b[0], b[1], b[2], b[3]);
                Some(Detection::new(
                    BBox::new(xmin * fw, ymin * fh, (xmax - xmin) * fw, (ymax - ymin) * fh),
                    label,
                    *score,
                ))
            })
            .collect();
        detections.sort_by(|a, b| b.score.total_cmp(&a.score));
        detections.truncate(self.max_detections);
        Ok(detections)
    }
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        let input = self.build_input(frame)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        self.decode(&outputs, frame)
    }

    fn warm_up(&mut self) -> Result<()> {
        let len = (self.width as usize) * (self.height as usize) * 3;
        let frame = Frame::new(vec![0u8; len], self.width, self.height)?;
        self.detect(&frame).map(|_| ())
    }
}
