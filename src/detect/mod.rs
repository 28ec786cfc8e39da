mod backend;
pub mod backends;
mod labels;
mod loader;
mod result;

pub use backend::{share, DetectorBackend, SharedDetector};
pub use backends::StubBackend;
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use labels::coco_label;
pub use loader::{load_backend, BACKEND_NAMES};
pub use result::{BBox, Detection, DetectionUpdate};
