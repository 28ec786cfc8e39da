//! Local image-sequence source.
//!
//! Plays a directory of still frames (PNG/JPEG, sorted by file name) in a loop.
//! Frames are decoded on demand; nothing is cached between calls. All frames
//! must share the size of the first one, which fixes the source dimensions.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};

use super::{ReadyState, VideoSource};
use crate::frame::{Frame, FrameDimensions};

const EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

pub struct ImageSequenceSource {
    dir: PathBuf,
    files: Vec<PathBuf>,
    next_index: usize,
    dimensions: Option<FrameDimensions>,
    frames_captured: u64,
}

impl ImageSequenceSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            files: Vec::new(),
            next_index: 0,
            dimensions: None,
            frames_captured: 0,
        }
    }

    pub fn frames_captured(&self) -> u64 {
        self.frames_captured
    }

    fn decode(path: &Path) -> Result<image::RgbImage> {
        Ok(image::open(path)
            .with_context(|| format!("decoding frame {}", path.display()))?
            .to_rgb8())
    }
}

fn is_frame_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

impl VideoSource for ImageSequenceSource {
    fn describe(&self) -> String {
        self.dir.display().to_string()
    }

    fn connect(&mut self) -> Result<()> {
        let entries = std::fs::read_dir(&self.dir)
            .with_context(|| format!("opening frame directory {}", self.dir.display()))?;
        let mut files = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.is_file() && is_frame_file(&path) {
                files.push(path);
            }
        }
        files.sort();
        let first = files
            .first()
            .ok_or_else(|| anyhow!("no PNG/JPEG frames in {}", self.dir.display()))?;
        let first_image = Self::decode(first)?;
        self.dimensions = Some(FrameDimensions::new(first_image.width(), first_image.height()));
        log::info!(
            "ImageSequenceSource: {} frames from {} ({}x{})",
            files.len(),
            self.dir.display(),
            first_image.width(),
            first_image.height()
        );
        self.files = files;
        self.next_index = 0;
        Ok(())
    }

    fn ready_state(&self) -> ReadyState {
        if self.dimensions.is_some() {
            ReadyState::EnoughData
        } else {
            ReadyState::Nothing
        }
    }

    fn dimensions(&self) -> Option<FrameDimensions> {
        self.dimensions
    }

    fn current_frame(&mut self) -> Result<Frame> {
        let expected = self
            .dimensions
            .ok_or_else(|| anyhow!("image sequence {} not connected", self.dir.display()))?;
        // Advance first so a bad file is skipped on the next tick.
        let path = self.files[self.next_index].clone();
        self.next_index = (self.next_index + 1) % self.files.len();
        let img = Self::decode(&path)?;
        if (img.width(), img.height()) != (expected.width, expected.height) {
            return Err(anyhow!(
                "frame {} is {}x{}, sequence is {}",
                path.display(),
                img.width(),
                img.height(),
                expected
            ));
        }
        self.frames_captured += 1;
        Frame::new(img.into_raw(), expected.width, expected.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn write_frame(dir: &Path, name: &str, w: u32, h: u32, shade: u8) {
        RgbImage::from_pixel(w, h, Rgb([shade, shade, shade]))
            .save(dir.join(name))
            .unwrap();
    }

    #[test]
    fn plays_frames_in_name_order_and_loops() {
        let dir = tempfile::tempdir().unwrap();
        write_frame(dir.path(), "b.png", 4, 3, 20);
        write_frame(dir.path(), "a.png", 4, 3, 10);
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let mut source = ImageSequenceSource::new(dir.path());
        assert!(!source.is_ready());
        source.connect().unwrap();
        assert!(source.is_ready());
        assert_eq!(source.dimensions(), Some(FrameDimensions::new(4, 3)));

        let shades: Vec<u8> = (0..3)
            .map(|_| source.current_frame().unwrap().pixels()[0])
            .collect();
        assert_eq!(shades, [10, 20, 10]);
        assert_eq!(source.frames_captured(), 3);
    }

    #[test]
    fn empty_directory_fails_to_connect() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = ImageSequenceSource::new(dir.path());
        assert!(source.connect().is_err());
        assert_eq!(source.ready_state(), ReadyState::Nothing);
    }

    #[test]
    fn mismatched_frame_size_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        write_frame(dir.path(), "0.png", 4, 3, 0);
        write_frame(dir.path(), "1.png", 8, 3, 0);
        let mut source = ImageSequenceSource::new(dir.path());
        source.connect().unwrap();
        assert!(source.current_frame().is_ok());
        assert!(source.current_frame().is_err());
    }
}
