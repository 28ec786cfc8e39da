use std::path::Path;

use ab_glyph::{Font, FontArc, PxScale, ScaleFont};
use anyhow::{anyhow, Context, Result};
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size, Blend};
use imageproc::rect::Rect;

use super::DrawSurface;
use crate::frame::FrameDimensions;

static LABEL_FONT: &[u8] = include_bytes!("../../assets/DejaVuSans.ttf");

/// Transparent RGBA canvas meant to be composited over the video.
///
/// Boxes, label plates and label glyphs are all rasterized. Each label is also
/// kept in `text_runs()` so callers can inspect what was drawn.
pub struct RasterSurface {
    canvas: RgbaImage,
    font: FontArc,
    text_runs: Vec<TextRun>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TextRun {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub color: Rgba<u8>,
    pub font_px: f32,
}

impl RasterSurface {
    /// Empty surface using the bundled DejaVu Sans label font.
    pub fn new() -> Result<Self> {
        let font = FontArc::try_from_slice(LABEL_FONT)
            .map_err(|err| anyhow!("bundled label font is invalid: {}", err))?;
        Ok(Self::with_font(font))
    }

    pub fn with_font(font: FontArc) -> Self {
        Self {
            canvas: RgbaImage::new(0, 0),
            font,
            text_runs: Vec::new(),
        }
    }

    pub fn image(&self) -> &RgbaImage {
        &self.canvas
    }

    pub fn text_runs(&self) -> &[TextRun] {
        &self.text_runs
    }

    /// Write the canvas as PNG.
    pub fn save_png(&self, path: &Path) -> Result<()> {
        self.canvas
            .save_with_format(path, image::ImageFormat::Png)
            .with_context(|| format!("writing overlay to {}", path.display()))
    }
}

impl DrawSurface for RasterSurface {
    fn resize(&mut self, dimensions: FrameDimensions) -> Result<()> {
        if self.canvas.dimensions() != (dimensions.width, dimensions.height) {
            self.canvas = RgbaImage::new(dimensions.width, dimensions.height);
        }
        Ok(())
    }

    fn dimensions(&self) -> FrameDimensions {
        let (width, height) = self.canvas.dimensions();
        FrameDimensions::new(width, height)
    }

    fn clear(&mut self) {
        for pixel in self.canvas.pixels_mut() {
            *pixel = Rgba([0, 0, 0, 0]);
        }
        self.text_runs.clear();
    }

    fn stroke_rect(&mut self, x: f32, y: f32, width: f32, height: f32, color: Rgba<u8>, line_width: f32) {
        // One hollow rect per pixel of line width, centered on the edge.
        let lines = line_width.round().max(1.0) as i32;
        let left = x.round() as i32 - lines / 2;
        let top = y.round() as i32 - lines / 2;
        let (w, h) = (width.round() as i32, height.round() as i32);
        for i in 0..lines {
            let (rw, rh) = (w + lines - 2 * i, h + lines - 2 * i);
            if rw <= 0 || rh <= 0 {
                break;
            }
            let rect = Rect::at(left + i, top + i).of_size(rw as u32, rh as u32);
            draw_hollow_rect_mut(&mut self.canvas, rect, color);
        }
    }

    fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32, color: Rgba<u8>) {
        let (w, h) = (width.round() as i32, height.round() as i32);
        if w <= 0 || h <= 0 {
            return;
        }
        let rect = Rect::at(x.round() as i32, y.round() as i32).of_size(w as u32, h as u32);
        let mut blend = Blend(std::mem::replace(&mut self.canvas, RgbaImage::new(0, 0)));
        draw_filled_rect_mut(&mut blend, rect, color);
        self.canvas = blend.0;
    }

    fn fill_text(&mut self, text: &str, x: f32, y: f32, color: Rgba<u8>, font_px: f32) {
        let scale = PxScale::from(font_px);
        // Glyph layout is anchored at the top of the line, not the baseline.
        let ascent = self.font.as_scaled(scale).ascent();
        draw_text_mut(
            &mut self.canvas,
            color,
            x.round() as i32,
            (y - ascent).round() as i32,
            scale,
            &self.font,
            text,
        );
        self.text_runs.push(TextRun {
            text: text.to_string(),
            x,
            y,
            color,
            font_px,
        });
    }

    fn measure_text(&self, text: &str, font_px: f32) -> f32 {
        text_size(PxScale::from(font_px), &self.font, text).0 as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{BBox, Detection};
    use crate::overlay::{OverlayRenderer, BOX_COLOR};

    fn car_overlay() -> RasterSurface {
        let mut surface = RasterSurface::new().unwrap();
        let mut renderer = OverlayRenderer::new();
        let det = Detection::new(BBox::new(100.0, 100.0, 50.0, 50.0), "car", 0.9);
        renderer
            .draw(&mut surface, &[det], FrameDimensions::new(320, 240))
            .unwrap();
        surface
    }

    #[test]
    fn raster_overlay_strokes_box_edges_only() {
        let surface = car_overlay();
        let img = surface.image();
        assert_eq!(img.dimensions(), (320, 240));
        // Two pixel stroke on both sides of the right edge, below the label plate.
        assert_eq!(*img.get_pixel(149, 140), BOX_COLOR);
        assert_eq!(*img.get_pixel(150, 140), BOX_COLOR);
        assert_eq!(img.get_pixel(151, 140).0[3], 0);
        // Box interior stays transparent.
        assert_eq!(img.get_pixel(125, 135).0[3], 0);
        // Outside the box stays transparent.
        assert_eq!(img.get_pixel(10, 10).0[3], 0);
        assert_eq!(surface.text_runs()[0].text, "car (90%)");
    }

    #[test]
    fn label_glyphs_are_rasterized_onto_plate() {
        let surface = car_overlay();
        let img = surface.image();
        let plate_width = surface.measure_text("car (90%)", 14.0) + 8.0;
        assert!(plate_width > 8.0);

        let mut plate = 0;
        let mut glyph = 0;
        for y in 101..119 {
            for x in 101..(100 + plate_width as u32 - 1) {
                let px = img.get_pixel(x, y);
                assert!(px.0[3] > 0, "plate covers ({x}, {y})");
                if px.0[1] < 128 {
                    glyph += 1;
                } else if px.0[0] < 60 && px.0[1] >= 200 && px.0[2] >= 200 {
                    plate += 1;
                }
            }
        }
        assert!(glyph > 20, "dark label pixels: {glyph}");
        assert!(plate > glyph, "plate stays mostly cyan");
    }

    #[test]
    fn measured_width_grows_with_text() {
        let surface = RasterSurface::new().unwrap();
        let short = surface.measure_text("bus (50%)", 14.0);
        let long = surface.measure_text("person (100%)", 14.0);
        assert!(short > 0.0);
        assert!(long > short);
        assert_eq!(surface.measure_text("", 14.0), 0.0);
    }

    #[test]
    fn clear_resets_canvas_and_text() {
        let mut surface = RasterSurface::new().unwrap();
        surface.resize(FrameDimensions::new(8, 8)).unwrap();
        surface.fill_rect(0.0, 0.0, 8.0, 8.0, BOX_COLOR);
        surface.fill_text("x", 1.0, 6.0, BOX_COLOR, 14.0);
        surface.clear();
        assert!(surface.image().pixels().all(|p| p.0[3] == 0));
        assert!(surface.text_runs().is_empty());
    }

    #[test]
    fn drawing_outside_canvas_is_clipped() {
        let mut surface = RasterSurface::new().unwrap();
        surface.resize(FrameDimensions::new(4, 4)).unwrap();
        surface.fill_rect(-10.0, -10.0, 100.0, 100.0, BOX_COLOR);
        surface.stroke_rect(-20.0, -20.0, 200.0, 200.0, BOX_COLOR, 2.0);
        surface.fill_text("far away", 500.0, 500.0, BOX_COLOR, 14.0);
        assert!(surface.image().pixels().all(|p| *p == BOX_COLOR));
    }
}
