//! Captured frames and their pixel dimensions.
//!
//! - `Frame`: owned RGB24 pixel buffer produced by a `VideoSource`.
//! - `FrameDimensions`: width/height of the source video in pixels.
//!
//! A frame is handed to the detector by reference for a single call and dropped
//! at the end of the loop iteration. Nothing downstream of the detector sees pixels.

use anyhow::{anyhow, Result};
use image::imageops::{self, FilterType};
use image::RgbImage;
use serde::{Deserialize, Serialize};

/// Pixel dimensions of the source video.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameDimensions {
    pub width: u32,
    pub height: u32,
}

impl FrameDimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Number of bytes in a tightly packed RGB24 frame of this size.
    pub fn rgb_len(&self) -> Result<usize> {
        (self.width as usize)
            .checked_mul(self.height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("frame dimensions {}x{} overflow", self.width, self.height))
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl std::fmt::Display for FrameDimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// One captured RGB24 frame.
pub struct Frame {
    data: Vec<u8>,
    dimensions: FrameDimensions,
}

impl Frame {
    /// Wrap a tightly packed RGB24 buffer. Fails when the length does not match.
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        let dimensions = FrameDimensions::new(width, height);
        let expected = dimensions.rgb_len()?;
        if data.len() != expected {
            return Err(anyhow!(
                "expected {} RGB bytes for a {} frame, received {}",
                expected,
                dimensions,
                data.len()
            ));
        }
        Ok(Self { data, dimensions })
    }

    pub fn width(&self) -> u32 {
        self.dimensions.width
    }

    pub fn height(&self) -> u32 {
        self.dimensions.height
    }

    pub fn dimensions(&self) -> FrameDimensions {
        self.dimensions
    }

    /// Read-only pixel access for detector backends.
    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    /// Copy of this frame scaled to `width`x`height` for fixed-shape model inputs.
    pub fn resized(&self, width: u32, height: u32) -> Result<Frame> {
        let target = FrameDimensions::new(width, height);
        if target.is_empty() || self.dimensions.is_empty() {
            return Err(anyhow!("cannot resize {} frame to {}", self.dimensions, target));
        }
        let image = RgbImage::from_raw(self.width(), self.height(), self.data.clone())
            .ok_or_else(|| anyhow!("frame buffer does not match {}", self.dimensions))?;
        let scaled = imageops::resize(&image, width, height, FilterType::Triangle);
        Frame::new(scaled.into_raw(), width, height)
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("dimensions", &self.dimensions)
            .field("bytes", &self.data.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_rejects_mismatched_length() {
        assert!(Frame::new(vec![0u8; 10], 2, 2).is_err());
        let frame = Frame::new(vec![0u8; 12], 2, 2).unwrap();
        assert_eq!(frame.dimensions(), FrameDimensions::new(2, 2));
        assert_eq!(frame.pixels().len(), 12);
    }

    #[test]
    fn resized_frame_matches_target_shape() {
        let mut data = Vec::new();
        for _ in 0..(640 * 480) {
            data.extend_from_slice(&[200, 40, 10]);
        }
        let frame = Frame::new(data, 640, 480).unwrap();

        let scaled = frame.resized(300, 300).unwrap();
        assert_eq!(scaled.dimensions(), FrameDimensions::new(300, 300));
        assert_eq!(scaled.pixels().len(), 300 * 300 * 3);
        assert_eq!(&scaled.pixels()[..3], &[200, 40, 10]);

        assert!(frame.resized(0, 300).is_err());
    }

    #[test]
    fn dimensions_display_and_emptiness() {
        let dims = FrameDimensions::new(1280, 720);
        assert_eq!(dims.to_string(), "1280x720");
        assert!(!dims.is_empty());
        assert!(FrameDimensions::new(0, 720).is_empty());
    }
}
