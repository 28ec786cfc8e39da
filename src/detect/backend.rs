use std::sync::{Arc, Mutex};

use anyhow::Result;

use crate::detect::result::Detection;
use crate::frame::Frame;

/// Detector handle shared between the application shell and the detection loop.
///
/// The mutex serializes invocations: at most one `detect` call is in flight per handle.
pub type SharedDetector = Arc<Mutex<dyn DetectorBackend>>;

/// Object detector backend.
///
/// Backends are loaded once at startup and then invoked once per loop iteration.
/// Implementations must treat the frame as read-only and must not retain it
/// beyond the `detect` call.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on a frame. Boxes are returned in source-frame pixels.
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>>;

    /// Optional warm-up hook, run once after loading.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Wrap a backend into a shareable handle.
pub fn share<B: DetectorBackend + 'static>(backend: B) -> SharedDetector {
    Arc::new(Mutex::new(backend))
}
