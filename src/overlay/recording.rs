use anyhow::Result;
use image::Rgba;
use serde::Serialize;

use super::DrawSurface;
use crate::frame::FrameDimensions;

/// One recorded draw call. Colors are RGBA bytes.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DrawOp {
    StrokeRect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        color: [u8; 4],
        line_width: f32,
    },
    FillRect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        color: [u8; 4],
    },
    FillText {
        text: String,
        x: f32,
        y: f32,
        color: [u8; 4],
        font_px: f32,
    },
}

/// Surface that keeps the draw calls since the last clear, for display layers
/// that replay them and for tests.
#[derive(Clone, Debug, Serialize)]
pub struct RecordingSurface {
    dimensions: FrameDimensions,
    ops: Vec<DrawOp>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self {
            dimensions: FrameDimensions::new(0, 0),
            ops: Vec::new(),
        }
    }

    pub fn ops(&self) -> &[DrawOp] {
        &self.ops
    }
}

impl Default for RecordingSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl DrawSurface for RecordingSurface {
    fn resize(&mut self, dimensions: FrameDimensions) -> Result<()> {
        self.dimensions = dimensions;
        Ok(())
    }

    fn dimensions(&self) -> FrameDimensions {
        self.dimensions
    }

    fn clear(&mut self) {
        self.ops.clear();
    }

    fn stroke_rect(&mut self, x: f32, y: f32, width: f32, height: f32, color: Rgba<u8>, line_width: f32) {
        self.ops.push(DrawOp::StrokeRect {
            x,
            y,
            width,
            height,
            color: color.0,
            line_width,
        });
    }

    fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32, color: Rgba<u8>) {
        self.ops.push(DrawOp::FillRect {
            x,
            y,
            width,
            height,
            color: color.0,
        });
    }

    fn fill_text(&mut self, text: &str, x: f32, y: f32, color: Rgba<u8>, font_px: f32) {
        self.ops.push(DrawOp::FillText {
            text: text.to_string(),
            x,
            y,
            color: color.0,
            font_px,
        });
    }
}
