//! V4L2 camera source.
//!
//! Opens a local device node (e.g. `/dev/video0`), negotiates the requested
//! size, and streams through mmap buffers. Device access errors, such as a
//! missing node or denied permission, are returned from `connect`.

use anyhow::{anyhow, Context, Result};
use ouroboros::self_referencing;

use super::normalize::{to_rgb24, PixelFormat};
use super::{ReadyState, VideoSource};
use crate::frame::{Frame, FrameDimensions};

const BUFFER_COUNT: u32 = 4;

pub struct V4l2Camera {
    device: String,
    requested: FrameDimensions,
    state: Option<StreamState>,
    active: Option<(FrameDimensions, PixelFormat)>,
    frames_captured: u64,
}

#[self_referencing]
struct StreamState {
    device: v4l::Device,
    #[borrows(device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this>,
}

impl V4l2Camera {
    pub fn new(device: &str, requested: FrameDimensions) -> Self {
        Self {
            device: device.to_string(),
            requested,
            state: None,
            active: None,
            frames_captured: 0,
        }
    }

    pub fn frames_captured(&self) -> u64 {
        self.frames_captured
    }
}

impl VideoSource for V4l2Camera {
    fn describe(&self) -> String {
        self.device.clone()
    }

    fn connect(&mut self) -> Result<()> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let device = v4l::Device::with_path(&self.device)
            .with_context(|| format!("open v4l2 device {}", self.device))?;
        let mut format = device.format().context("read v4l2 format")?;
        format.width = self.requested.width;
        format.height = self.requested.height;
        format.fourcc = v4l::FourCC::new(b"YUYV");

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!("V4l2Camera: failed to set format on {}: {}", self.device, err);
                device
                    .format()
                    .context("read v4l2 format after set failure")?
            }
        };

        let pixel_format = PixelFormat::from_fourcc(&format.fourcc.repr).ok_or_else(|| {
            anyhow!(
                "v4l2 device {} negotiated unsupported pixel format {}",
                self.device,
                format.fourcc
            )
        })?;

        let state = StreamStateTryBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, BUFFER_COUNT)
                    .map_err(|err| anyhow::Error::new(err).context("create v4l2 buffer stream"))
            },
        }
        .try_build()?;

        let dims = FrameDimensions::new(format.width, format.height);
        self.state = Some(state);
        self.active = Some((dims, pixel_format));
        log::info!(
            "V4l2Camera: connected to {} ({}, {:?})",
            self.device,
            dims,
            pixel_format
        );
        Ok(())
    }

    fn ready_state(&self) -> ReadyState {
        // Buffers are queued and streaming once the mmap stream exists.
        if self.state.is_some() {
            ReadyState::EnoughData
        } else {
            ReadyState::Nothing
        }
    }

    fn dimensions(&self) -> Option<FrameDimensions> {
        self.active.map(|(dims, _)| dims)
    }

    fn current_frame(&mut self) -> Result<Frame> {
        use v4l::io::traits::CaptureStream;

        let (dims, pixel_format) = self
            .active
            .ok_or_else(|| anyhow!("v4l2 device {} not connected", self.device))?;
        let state = self
            .state
            .as_mut()
            .ok_or_else(|| anyhow!("v4l2 device {} not connected", self.device))?;
        let rgb = state.with_mut(|fields| -> Result<Vec<u8>> {
            let (buf, _meta) = fields.stream.next().context("capture v4l2 frame")?;
            to_rgb24(buf, dims.width, dims.height, pixel_format)
        })?;
        self.frames_captured += 1;
        Frame::new(rgb, dims.width, dims.height)
    }
}
