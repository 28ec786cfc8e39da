//! 2D detection overlay.
//!
//! Draws one rectangle and one label per detection, in source-frame pixel
//! coordinates, onto a `DrawSurface` that is resized to the source frame and
//! cleared before every redraw. Nothing from a previous draw survives.

use anyhow::{anyhow, Result};
use image::Rgba;

use crate::detect::Detection;
use crate::frame::FrameDimensions;

mod raster;
mod recording;

pub use raster::RasterSurface;
pub use recording::{DrawOp, RecordingSurface};

pub const BOX_COLOR: Rgba<u8> = Rgba([0x00, 0xff, 0xff, 0xff]);
/// `rgba(0, 255, 255, 0.7)`
pub const LABEL_PLATE_COLOR: Rgba<u8> = Rgba([0x00, 0xff, 0xff, 178]);
pub const LABEL_TEXT_COLOR: Rgba<u8> = Rgba([0x00, 0x00, 0x00, 0xff]);
pub const LINE_WIDTH: f32 = 2.0;
pub const FONT_PX: f32 = 14.0;
const LABEL_PLATE_HEIGHT: f32 = 20.0;
const LABEL_PADDING: f32 = 4.0;
const LABEL_BASELINE: f32 = 14.0;

/// Drawing surface the overlay renders onto.
pub trait DrawSurface {
    /// Set the pixel dimensions of the surface. May discard current contents.
    fn resize(&mut self, dimensions: FrameDimensions) -> Result<()>;

    fn dimensions(&self) -> FrameDimensions;

    /// Erase everything drawn so far.
    fn clear(&mut self);

    fn stroke_rect(&mut self, x: f32, y: f32, width: f32, height: f32, color: Rgba<u8>, line_width: f32);

    fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32, color: Rgba<u8>);

    /// Draw text with its baseline starting at `(x, y)`.
    fn fill_text(&mut self, text: &str, x: f32, y: f32, color: Rgba<u8>, font_px: f32);

    /// Advance width of `text` at `font_px`.
    fn measure_text(&self, text: &str, font_px: f32) -> f32 {
        approximate_text_width(text, font_px)
    }
}

/// Fixed-advance text width estimate (0.55 em per character).
pub fn approximate_text_width(text: &str, font_px: f32) -> f32 {
    text.chars().count() as f32 * font_px * 0.55
}

/// Label text for a detection, e.g. `car (90%)`.
pub fn format_label(detection: &Detection) -> String {
    format!(
        "{} ({}%)",
        detection.class,
        (detection.score * 100.0).round() as i64
    )
}

/// Redraws detection boxes onto a surface.
#[derive(Clone, Debug, Default)]
pub struct OverlayRenderer {
    draws: u64,
}

impl OverlayRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of completed redraws.
    pub fn draws(&self) -> u64 {
        self.draws
    }

    /// Resynchronize the surface to `source` and redraw all detections from scratch.
    ///
    /// `source` must be the live frame's current dimensions, not a cached value.
    pub fn draw<S: DrawSurface + ?Sized>(
        &mut self,
        surface: &mut S,
        detections: &[Detection],
        source: FrameDimensions,
    ) -> Result<()> {
        if source.is_empty() {
            return Err(anyhow!("cannot draw overlay for empty source frame {}", source));
        }
        if surface.dimensions() != source {
            log::debug!(
                "overlay surface resized {} -> {}",
                surface.dimensions(),
                source
            );
        }
        surface.resize(source)?;
        surface.clear();
        for detection in detections {
            draw_detection(surface, detection);
        }
        self.draws += 1;
        Ok(())
    }
}

fn draw_detection<S: DrawSurface + ?Sized>(surface: &mut S, detection: &Detection) {
    let b = detection.bbox;
    let label = format_label(detection);

    surface.stroke_rect(b.x, b.y, b.width, b.height, BOX_COLOR, LINE_WIDTH);

    let text_width = surface.measure_text(&label, FONT_PX);
    surface.fill_rect(
        b.x,
        b.y,
        text_width + 2.0 * LABEL_PADDING,
        LABEL_PLATE_HEIGHT,
        LABEL_PLATE_COLOR,
    );
    surface.fill_text(
        &label,
        b.x + LABEL_PADDING,
        b.y + LABEL_BASELINE,
        LABEL_TEXT_COLOR,
        FONT_PX,
    );
}
