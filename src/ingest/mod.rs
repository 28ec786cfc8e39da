//! Video sources.
//!
//! This module provides the live-video side of the detection loop:
//! - Synthetic road camera (`stub://...`) for demos and tests
//! - Image sequences (a local directory of PNG/JPEG frames, played in a loop)
//! - USB/V4L2 cameras (feature: ingest-v4l2)
//!
//! Every source reports a `ReadyState`. The detection loop only pulls a frame
//! once the source has buffered enough data; before that it skips the tick.
//! Sources hand out owned `Frame`s and keep nothing once a frame is returned.

#[cfg_attr(not(feature = "ingest-v4l2"), allow(dead_code))]
mod normalize;
pub mod sequence;
pub mod synthetic;
#[cfg(feature = "ingest-v4l2")]
pub mod v4l2;

use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};

use crate::config::SourceSettings;
use crate::frame::{Frame, FrameDimensions};

pub use sequence::ImageSequenceSource;
pub use synthetic::SyntheticCamera;
#[cfg(feature = "ingest-v4l2")]
pub use v4l2::V4l2Camera;

/// How much data a source has buffered, from nothing to enough for playback.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReadyState {
    Nothing,
    Metadata,
    CurrentData,
    FutureData,
    EnoughData,
}

/// Live video capability consumed by the detection loop.
pub trait VideoSource: Send {
    /// Human-readable source identifier for logs.
    fn describe(&self) -> String;

    /// Open the underlying device or stream. Permission and access errors surface here.
    fn connect(&mut self) -> Result<()>;

    fn ready_state(&self) -> ReadyState;

    /// Pixel dimensions, known once metadata is available.
    fn dimensions(&self) -> Option<FrameDimensions>;

    /// Grab the current frame.
    fn current_frame(&mut self) -> Result<Frame>;

    /// True once the source can yield a usable frame.
    fn is_ready(&self) -> bool {
        self.ready_state() >= ReadyState::FutureData
    }
}

impl VideoSource for Box<dyn VideoSource> {
    fn describe(&self) -> String {
        (**self).describe()
    }

    fn connect(&mut self) -> Result<()> {
        (**self).connect()
    }

    fn ready_state(&self) -> ReadyState {
        (**self).ready_state()
    }

    fn dimensions(&self) -> Option<FrameDimensions> {
        (**self).dimensions()
    }

    fn current_frame(&mut self) -> Result<Frame> {
        (**self).current_frame()
    }

    fn is_ready(&self) -> bool {
        (**self).is_ready()
    }
}

/// Source handle shared between the application shell and the detection loop.
pub type SharedSource = Arc<Mutex<dyn VideoSource>>;

/// Wrap a source into a shareable handle.
pub fn share_source<S: VideoSource + 'static>(source: S) -> SharedSource {
    Arc::new(Mutex::new(source))
}

/// Build the source named by `settings.url` (not yet connected).
///
/// - `stub://<name>`: synthetic road camera
/// - `v4l2://<device>` or `/dev/video*`: V4L2 camera (feature: ingest-v4l2)
/// - anything else without a scheme: image-sequence directory
pub fn open_source(settings: &SourceSettings) -> Result<Box<dyn VideoSource>> {
    let url = settings.url.trim();
    if url.is_empty() {
        return Err(anyhow!("video source url must not be empty"));
    }
    if url.starts_with("stub://") {
        return Ok(Box::new(SyntheticCamera::new(settings.clone())));
    }
    if let Some(device) = v4l2_device(url) {
        return open_v4l2(settings, device);
    }
    if url.contains("://") {
        return Err(anyhow!(
            "unsupported video source '{}' (expected stub://, v4l2:// or a local directory)",
            url
        ));
    }
    Ok(Box::new(ImageSequenceSource::new(url)))
}

fn v4l2_device(url: &str) -> Option<&str> {
    if let Some(device) = url.strip_prefix("v4l2://") {
        return Some(device);
    }
    url.starts_with("/dev/video").then_some(url)
}

#[cfg(feature = "ingest-v4l2")]
fn open_v4l2(settings: &SourceSettings, device: &str) -> Result<Box<dyn VideoSource>> {
    Ok(Box::new(V4l2Camera::new(
        device,
        FrameDimensions::new(settings.width, settings.height),
    )))
}

#[cfg(not(feature = "ingest-v4l2"))]
fn open_v4l2(_settings: &SourceSettings, device: &str) -> Result<Box<dyn VideoSource>> {
    Err(anyhow!(
        "camera {} requires the ingest-v4l2 feature",
        device
    ))
}
