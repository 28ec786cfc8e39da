//! Synthetic road camera (`stub://`).
//!
//! Renders a horizon split (sky above, asphalt below) with a lane stripe that
//! scrolls toward the viewer, plus per-row sensor noise. The source reports
//! `Metadata` for a configurable warm-up period after connecting, mimicking a
//! camera that has negotiated its format but not yet buffered frames.

use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{ReadyState, VideoSource};
use crate::config::SourceSettings;
use crate::frame::{Frame, FrameDimensions};

const SKY: [u8; 3] = [96, 140, 190];
const ASPHALT: [u8; 3] = [52, 52, 56];
const STRIPE: [u8; 3] = [230, 230, 210];

pub struct SyntheticCamera {
    settings: SourceSettings,
    connected_at: Option<Instant>,
    frame_count: u64,
    rng: StdRng,
}

impl SyntheticCamera {
    pub fn new(settings: SourceSettings) -> Self {
        Self {
            settings,
            connected_at: None,
            frame_count: 0,
            rng: StdRng::seed_from_u64(0x5eed),
        }
    }

    pub fn frames_captured(&self) -> u64 {
        self.frame_count
    }

    fn warmup(&self) -> Duration {
        Duration::from_millis(self.settings.warmup_ms)
    }

    fn render(&mut self) -> Vec<u8> {
        let w = self.settings.width as usize;
        let h = self.settings.height as usize;
        let horizon = h / 2;
        let center = w / 2;
        let phase = (self.frame_count % 32) as usize;
        let mut pixels = Vec::with_capacity(w * h * 3);

        for y in 0..h {
            let noise: i16 = self.rng.gen_range(-6..=6);
            let (base, stripe_half_width) = if y < horizon {
                (SKY, 0)
            } else {
                // Stripe widens toward the bottom of the frame and is dashed.
                let depth = y - horizon;
                let dashed = ((depth + phase * 2) / 16) % 2 == 0;
                (ASPHALT, if dashed { 1 + depth / 24 } else { 0 })
            };
            for x in 0..w {
                let color = if stripe_half_width > 0 && x.abs_diff(center) <= stripe_half_width {
                    STRIPE
                } else {
                    base
                };
                for channel in color {
                    pixels.push((channel as i16 + noise).clamp(0, 255) as u8);
                }
            }
        }
        pixels
    }
}

impl VideoSource for SyntheticCamera {
    fn describe(&self) -> String {
        self.settings.url.clone()
    }

    fn connect(&mut self) -> Result<()> {
        if self.settings.width == 0 || self.settings.height == 0 {
            return Err(anyhow!(
                "synthetic camera {} has empty dimensions {}x{}",
                self.settings.url,
                self.settings.width,
                self.settings.height
            ));
        }
        self.connected_at = Some(Instant::now());
        log::info!(
            "SyntheticCamera: connected to {} ({}x{})",
            self.settings.url,
            self.settings.width,
            self.settings.height
        );
        Ok(())
    }

    fn ready_state(&self) -> ReadyState {
        match self.connected_at {
            None => ReadyState::Nothing,
            Some(at) if at.elapsed() < self.warmup() => ReadyState::Metadata,
            Some(_) => ReadyState::EnoughData,
        }
    }

    fn dimensions(&self) -> Option<FrameDimensions> {
        self.connected_at
            .map(|_| FrameDimensions::new(self.settings.width, self.settings.height))
    }

    fn current_frame(&mut self) -> Result<Frame> {
        if self.connected_at.is_none() {
            return Err(anyhow!("synthetic camera {} not connected", self.settings.url));
        }
        self.frame_count += 1;
        let pixels = self.render();
        Frame::new(pixels, self.settings.width, self.settings.height)
    }
}
