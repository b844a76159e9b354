use std::{
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use thiserror::Error;

use crate::{
    config::CaptureConfig,
    messages::{self, Message},
    types::{Frame, Language},
};

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("camera unavailable: {0}")]
    CameraUnavailable(String),
    #[error("frame source not ready")]
    SourceNotReady,
    #[error("no active frame source")]
    NoActiveSource,
    #[error("failed to decode {path}: {reason}")]
    Decode { path: PathBuf, reason: String },
    #[error("failed to encode frame: {0}")]
    Encode(String),
    #[error("{operation} is not supported by a {kind} source")]
    Unsupported {
        operation: &'static str,
        kind: &'static str,
    },
    #[error("upload processing failed: {source}")]
    Upload {
        #[source]
        source: Box<CaptureError>,
    },
}

impl CaptureError {
    pub fn user_message(&self, lang: Language) -> &'static str {
        let message = match self {
            CaptureError::CameraUnavailable(_) => Message::CameraUnavailable,
            CaptureError::SourceNotReady | CaptureError::NoActiveSource => Message::SourceNotReady,
            CaptureError::Decode { .. } | CaptureError::Upload { .. } => Message::UploadFailed,
            CaptureError::Encode(_) | CaptureError::Unsupported { .. } => Message::AnalysisFailed,
        };
        messages::text(message, lang)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum FacingMode {
    /// Front ("selfie") camera.
    #[default]
    User,
    /// Rear camera.
    Environment,
}

impl FacingMode {
    pub fn flipped(self) -> Self {
        match self {
            FacingMode::User => FacingMode::Environment,
            FacingMode::Environment => FacingMode::User,
        }
    }
}

impl FromStr for FacingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "user" | "front" => Ok(FacingMode::User),
            "environment" | "back" | "rear" => Ok(FacingMode::Environment),
            other => Err(format!("unknown facing mode `{other}` (expected user or environment)")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceKind {
    Camera(FacingMode),
    Clip(PathBuf),
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Camera(facing) => write!(f, "camera ({facing:?})"),
            SourceKind::Clip(path) => write!(f, "clip {}", path.display()),
        }
    }
}

/// A playable source of frames: a live device or a decoded clip.
pub trait FrameSource: Send {
    fn kind(&self) -> SourceKind;

    /// Intrinsic frame size, `None` until the source has produced decodable data.
    fn dimensions(&self) -> Option<(u32, u32)>;

    /// Playback length. `None` for live sources or clips that do not report one.
    fn duration(&self) -> Option<Duration>;

    /// Requests that the playhead move to `position`.
    fn seek(&mut self, position: Duration) -> Result<(), CaptureError>;

    /// Blocks until the last requested seek has been presented or `timeout`
    /// elapses. Returns `false` on timeout.
    fn wait_seeked(&mut self, timeout: Duration) -> bool;

    /// The frame currently presented by the source.
    fn current_frame(&mut self) -> Result<Frame, CaptureError>;

    /// Releases device handles or decoded data. Idempotent.
    fn release(&mut self);
}

/// Opens frame sources. The capture session never holds two at once.
pub trait SourceProvider {
    fn open_camera(
        &mut self,
        facing: FacingMode,
        config: &CaptureConfig,
    ) -> Result<Box<dyn FrameSource>, CaptureError>;

    fn open_file(
        &mut self,
        path: &Path,
        config: &CaptureConfig,
    ) -> Result<Box<dyn FrameSource>, CaptureError>;
}

/// Opens real camera devices and clips from disk.
#[derive(Clone, Debug, Default)]
pub struct DeviceProvider;

impl SourceProvider for DeviceProvider {
    #[cfg(feature = "camera-nokhwa")]
    fn open_camera(
        &mut self,
        facing: FacingMode,
        config: &CaptureConfig,
    ) -> Result<Box<dyn FrameSource>, CaptureError> {
        let source = super::camera::CameraSource::open(facing, config)?;
        Ok(Box::new(source))
    }

    #[cfg(not(feature = "camera-nokhwa"))]
    fn open_camera(
        &mut self,
        _facing: FacingMode,
        _config: &CaptureConfig,
    ) -> Result<Box<dyn FrameSource>, CaptureError> {
        Err(CaptureError::CameraUnavailable(
            "built without camera support".to_string(),
        ))
    }

    fn open_file(
        &mut self,
        path: &Path,
        config: &CaptureConfig,
    ) -> Result<Box<dyn FrameSource>, CaptureError> {
        let source = super::clip::ClipSource::open(path, config)?;
        Ok(Box::new(source))
    }
}
