use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use anyhow::{Result, anyhow};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, TrySendError, bounded};
use nokhwa::{
    Camera,
    pixel_format::RgbFormat,
    query,
    utils::{
        ApiBackend, CameraFormat, CameraIndex, CameraInfo, FrameFormat, RequestedFormat,
        RequestedFormatType, Resolution,
    },
};

use super::{
    rgba_converter,
    source::{CaptureError, FacingMode, FrameSource, SourceKind},
};
use crate::{config::CaptureConfig, types::Frame};

// Prefer pixel formats that are widely supported on macOS (the built-in cameras
// often reject YUYV even though Nokhwa reports it).
const PREFERRED_PIXEL_FORMATS: &[FrameFormat] = &[
    FrameFormat::MJPEG,
    FrameFormat::RAWRGB,
    FrameFormat::RAWBGR,
    FrameFormat::YUYV,
    FrameFormat::NV12,
    FrameFormat::GRAY,
];

const REAR_HINTS: &[&str] = &["back", "rear", "environment", "world"];
const FRONT_HINTS: &[&str] = &["front", "facetime", "user", "integrated", "selfie"];

#[derive(Clone, Debug)]
pub struct CameraDevice {
    pub index: CameraIndex,
    pub label: String,
}

#[derive(Clone, Copy, Debug)]
struct PreferredMode {
    width: u32,
    height: u32,
    fps: u32,
}

impl From<&CaptureConfig> for PreferredMode {
    fn from(config: &CaptureConfig) -> Self {
        Self {
            width: config.preferred_width,
            height: config.preferred_height,
            fps: config.preferred_fps,
        }
    }
}

fn requested_formats(mode: PreferredMode) -> [RequestedFormat<'static>; 3] {
    let closest = CameraFormat::new(
        Resolution::new(mode.width, mode.height),
        FrameFormat::MJPEG,
        mode.fps,
    );
    [
        RequestedFormat::with_formats(RequestedFormatType::Closest(closest), PREFERRED_PIXEL_FORMATS),
        // Fall back to any format Nokhwa can decode, but prefer higher FPS to
        // avoid very low default rates (e.g. 15 FPS) that some drivers reject.
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate),
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::None),
    ]
}

pub fn available_cameras() -> Result<Vec<CameraDevice>> {
    let cameras = query(ApiBackend::Auto)?;
    Ok(cameras
        .into_iter()
        .map(|info| CameraDevice {
            index: info.index().clone(),
            label: format_camera_label(&info),
        })
        .collect())
}

fn format_camera_label(info: &CameraInfo) -> String {
    info.human_name()
}

/// Picks the device that best matches `facing` by name; desktop drivers do not
/// report orientation, so the first device stands in for the front camera and
/// the last for the rear one.
fn select_device(devices: &[CameraDevice], facing: FacingMode) -> Option<&CameraDevice> {
    let hints = match facing {
        FacingMode::User => FRONT_HINTS,
        FacingMode::Environment => REAR_HINTS,
    };
    let by_name = devices.iter().find(|device| {
        let label = device.label.to_ascii_lowercase();
        hints.iter().any(|hint| label.contains(hint))
    });

    by_name.or_else(|| match facing {
        FacingMode::User => devices.first(),
        FacingMode::Environment => devices.last(),
    })
}

fn build_camera(index: CameraIndex, mode: PreferredMode) -> Result<Camera> {
    let mut last_err = None;

    for requested in requested_formats(mode) {
        match Camera::new(index.clone(), requested) {
            Ok(mut camera) => match camera.open_stream() {
                Ok(()) => return Ok(camera),
                Err(err) => last_err = Some(err.into()),
            },
            Err(err) => last_err = Some(err.into()),
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow!("failed to open camera with any supported format")))
}

#[derive(Debug)]
struct CameraStream {
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl CameraStream {
    fn stop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for CameraStream {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Puts `frame` in the one-slot channel, evicting a frame the consumer has
/// not taken yet so the slot always holds the newest capture.
fn publish_latest(tx: &Sender<Frame>, rx: &Receiver<Frame>, frame: Frame) {
    match tx.try_send(frame) {
        Ok(()) | Err(TrySendError::Disconnected(_)) => {}
        Err(TrySendError::Full(frame)) => {
            let _ = rx.try_recv();
            let _ = tx.try_send(frame);
        }
    }
}

fn start_camera_stream(
    index: CameraIndex,
    mode: PreferredMode,
    frame_tx: Sender<Frame>,
    evict_rx: Receiver<Frame>,
) -> Result<CameraStream> {
    // Fail fast before spawning the capture thread.
    build_camera(index.clone(), mode)?;

    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = stop.clone();

    let handle = thread::spawn(move || {
        let mut camera = match build_camera(index, mode) {
            Ok(cam) => cam,
            Err(err) => {
                log::error!("failed to open camera: {err:?}");
                return;
            }
        };

        while !stop_flag.load(Ordering::Relaxed) {
            let read_start = Instant::now();
            let buffer = match camera.frame() {
                Ok(buffer) => buffer,
                Err(err) => {
                    log::warn!(
                        "camera frame read failed (after {:?}): {err:?}",
                        read_start.elapsed()
                    );
                    continue;
                }
            };

            let frame = match rgba_converter::camera_buffer_to_frame(&buffer, Instant::now()) {
                Ok(frame) => frame,
                Err(err) => {
                    log::warn!("failed to decode camera frame: {err:?}");
                    continue;
                }
            };

            publish_latest(&frame_tx, &evict_rx, frame);
        }

        if let Err(err) = camera.stop_stream() {
            log::warn!("failed to stop camera stream: {err:?}");
        }
    });

    Ok(CameraStream {
        stop,
        handle: Some(handle),
    })
}

/// Live camera feed exposed as a [`FrameSource`].
pub struct CameraSource {
    facing: FacingMode,
    label: String,
    stream: Option<CameraStream>,
    frame_rx: Receiver<Frame>,
    latest: Option<Frame>,
    frame_timeout: Duration,
}

impl CameraSource {
    /// Opens the camera matching `facing` and waits for its first frame. On
    /// failure nothing stays open.
    pub fn open(facing: FacingMode, config: &CaptureConfig) -> Result<Self, CaptureError> {
        let devices =
            available_cameras().map_err(|err| CaptureError::CameraUnavailable(format!("{err:#}")))?;
        let device = select_device(&devices, facing)
            .ok_or_else(|| CaptureError::CameraUnavailable("no camera found".to_string()))?
            .clone();

        let (frame_tx, frame_rx) = bounded(1);
        let mode = PreferredMode::from(config);
        let stream = start_camera_stream(device.index.clone(), mode, frame_tx, frame_rx.clone())
            .map_err(|err| CaptureError::CameraUnavailable(format!("{}: {err:#}", device.label)))?;

        let mut source = Self {
            facing,
            label: device.label,
            stream: Some(stream),
            frame_rx,
            latest: None,
            frame_timeout: config.first_frame_timeout(),
        };

        // Probe once so the first sample is never a black frame.
        if let Err(err) = source.pull_latest(source.frame_timeout) {
            source.release();
            return Err(match err {
                CaptureError::SourceNotReady => CaptureError::CameraUnavailable(format!(
                    "{} produced no frames within {:?}",
                    source.label, source.frame_timeout
                )),
                other => other,
            });
        }

        log::info!("camera `{}` streaming ({facing:?})", source.label);
        Ok(source)
    }

    /// Drains queued frames, keeping the newest. Waits up to `wait` when
    /// nothing has been received yet.
    fn pull_latest(&mut self, wait: Duration) -> Result<(), CaptureError> {
        if self.stream.is_none() {
            return Err(CaptureError::NoActiveSource);
        }

        if self.latest.is_none() {
            match self.frame_rx.recv_timeout(wait) {
                Ok(frame) => self.latest = Some(frame),
                Err(RecvTimeoutError::Timeout) => return Err(CaptureError::SourceNotReady),
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(CaptureError::CameraUnavailable(format!(
                        "{} stopped delivering frames",
                        self.label
                    )));
                }
            }
        }

        loop {
            match self.frame_rx.try_recv() {
                Ok(newer) => self.latest = Some(newer),
                Err(TryRecvError::Empty) => return Ok(()),
                Err(TryRecvError::Disconnected) => {
                    return Err(CaptureError::CameraUnavailable(format!(
                        "{} stopped delivering frames",
                        self.label
                    )));
                }
            }
        }
    }
}

impl FrameSource for CameraSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Camera(self.facing)
    }

    fn dimensions(&self) -> Option<(u32, u32)> {
        self.latest
            .as_ref()
            .filter(|frame| !frame.is_blank())
            .map(|frame| (frame.width, frame.height))
    }

    fn duration(&self) -> Option<Duration> {
        None
    }

    fn seek(&mut self, _position: Duration) -> Result<(), CaptureError> {
        Err(CaptureError::Unsupported {
            operation: "seek",
            kind: "camera",
        })
    }

    fn wait_seeked(&mut self, _timeout: Duration) -> bool {
        true
    }

    fn current_frame(&mut self) -> Result<Frame, CaptureError> {
        self.pull_latest(self.frame_timeout)?;
        match &self.latest {
            Some(frame) if !frame.is_blank() => Ok(frame.clone()),
            _ => Err(CaptureError::SourceNotReady),
        }
    }

    fn release(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.stop();
            log::info!("camera `{}` released", self.label);
        }
        self.latest = None;
    }
}

impl Drop for CameraSource {
    fn drop(&mut self) {
        self.release();
    }
}
