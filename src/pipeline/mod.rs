pub mod buffer;
#[cfg(feature = "camera-nokhwa")]
pub mod camera;
pub mod clip;
#[cfg(feature = "camera-nokhwa")]
pub mod rgba_converter;
pub mod roi;
pub mod sampler;
pub mod session;
pub mod source;

// Re-exports for convenience
pub use buffer::{EncodedFrame, FrameBuffer};
#[cfg(feature = "camera-nokhwa")]
pub use camera::{CameraDevice, CameraSource, available_cameras};
pub use clip::ClipSource;
pub use roi::{CropRect, RoiSettings};
pub use sampler::{SamplerSettings, capture_live, extract_upload};
pub use session::CaptureSession;
pub use source::{CaptureError, DeviceProvider, FacingMode, FrameSource, SourceKind, SourceProvider};
