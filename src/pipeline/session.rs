use std::path::Path;

use super::{
    buffer::FrameBuffer,
    sampler::{self, SamplerSettings},
    source::{CaptureError, FacingMode, FrameSource, SourceKind, SourceProvider},
};
use crate::config::CaptureConfig;

/// Owns the one active frame source and runs captures against it.
///
/// Every transition releases the current source before the next one is
/// acquired, so a device is never opened twice.
pub struct CaptureSession<P: SourceProvider> {
    provider: P,
    config: CaptureConfig,
    settings: SamplerSettings,
    facing: FacingMode,
    camera_fallback: bool,
    active: Option<Box<dyn FrameSource>>,
}

impl<P: SourceProvider> CaptureSession<P> {
    pub fn new(provider: P, config: CaptureConfig) -> Self {
        let settings = SamplerSettings::from(&config);
        Self {
            provider,
            config,
            settings,
            facing: FacingMode::default(),
            camera_fallback: true,
            active: None,
        }
    }

    /// Whether a failed upload reopens the camera. On by default; one-shot
    /// callers that exit after the failure turn it off.
    pub fn with_camera_fallback(mut self, enabled: bool) -> Self {
        self.camera_fallback = enabled;
        self
    }

    pub fn facing(&self) -> FacingMode {
        self.facing
    }

    pub fn active_kind(&self) -> Option<SourceKind> {
        self.active.as_ref().map(|source| source.kind())
    }

    pub fn settings(&self) -> &SamplerSettings {
        &self.settings
    }

    /// Starts the camera facing `facing`. On failure no source is active.
    pub fn start_camera(&mut self, facing: FacingMode) -> Result<(), CaptureError> {
        self.release();
        self.facing = facing;
        let source = self.provider.open_camera(facing, &self.config)?;
        log::info!("capture source: {}", source.kind());
        self.active = Some(source);
        Ok(())
    }

    /// Swaps between the front and rear camera.
    pub fn switch_facing(&mut self) -> Result<FacingMode, CaptureError> {
        let next = self.facing.flipped();
        self.start_camera(next)?;
        Ok(next)
    }

    /// Replaces the active source with a clip from disk. If the clip cannot be
    /// opened the error is returned and, with the fallback on, the camera is
    /// restarted.
    pub fn load_file(&mut self, path: &Path) -> Result<(), CaptureError> {
        self.release();
        match self.provider.open_file(path, &self.config) {
            Ok(source) => {
                log::info!("capture source: {}", source.kind());
                self.active = Some(source);
                Ok(())
            }
            Err(err) => {
                log::warn!("failed to load {}: {err}", path.display());
                self.restart_camera();
                Err(CaptureError::Upload {
                    source: Box::new(err),
                })
            }
        }
    }

    /// Samples the active source: paced snapshots for a camera, seek-stepped
    /// extraction for a clip.
    ///
    /// A failed clip extraction is reported as [`CaptureError::Upload`] and
    /// the session falls back to the live camera when the fallback is on.
    pub fn capture<F>(&mut self, on_progress: F) -> Result<FrameBuffer, CaptureError>
    where
        F: FnMut(f32),
    {
        let source = self.active.as_deref_mut().ok_or(CaptureError::NoActiveSource)?;
        match source.kind() {
            SourceKind::Camera(_) => sampler::capture_live(source, &self.settings, on_progress),
            SourceKind::Clip(path) => {
                match sampler::extract_upload(source, &self.settings, on_progress) {
                    Ok(buffer) => Ok(buffer),
                    Err(err) => {
                        log::warn!("frame extraction from {} failed: {err}", path.display());
                        self.restart_camera();
                        Err(CaptureError::Upload {
                            source: Box::new(err),
                        })
                    }
                }
            }
        }
    }

    fn restart_camera(&mut self) {
        if !self.camera_fallback {
            return;
        }
        match self.start_camera(self.facing) {
            Ok(()) => log::info!("camera restarted after upload failure"),
            Err(err) => log::error!("could not restart camera: {err}"),
        }
    }

    pub fn release(&mut self) {
        if let Some(mut source) = self.active.take() {
            log::debug!("releasing {}", source.kind());
            source.release();
        }
    }
}

impl<P: SourceProvider> Drop for CaptureSession<P> {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Frame;
    use std::{
        path::PathBuf,
        sync::{Arc, Mutex},
        time::{Duration, Instant},
    };

    type EventLog = Arc<Mutex<Vec<String>>>;

    struct FakeSource {
        kind: SourceKind,
        dims: Option<(u32, u32)>,
        events: EventLog,
    }

    impl FrameSource for FakeSource {
        fn kind(&self) -> SourceKind {
            self.kind.clone()
        }

        fn dimensions(&self) -> Option<(u32, u32)> {
            self.dims
        }

        fn duration(&self) -> Option<Duration> {
            Some(Duration::from_millis(500))
        }

        fn seek(&mut self, _position: Duration) -> Result<(), CaptureError> {
            Ok(())
        }

        fn wait_seeked(&mut self, _timeout: Duration) -> bool {
            true
        }

        fn current_frame(&mut self) -> Result<Frame, CaptureError> {
            let (width, height) = self.dims.ok_or(CaptureError::SourceNotReady)?;
            Ok(Frame {
                rgba: vec![128; (width * height * 4) as usize],
                width,
                height,
                timestamp: Instant::now(),
            })
        }

        fn release(&mut self) {
            self.events.lock().unwrap().push(format!("stop {}", self.kind));
        }
    }

    #[derive(Default)]
    struct FakeProvider {
        events: EventLog,
        camera_fails: bool,
        clip_dims: Option<(u32, u32)>,
    }

    impl SourceProvider for FakeProvider {
        fn open_camera(
            &mut self,
            facing: FacingMode,
            _config: &CaptureConfig,
        ) -> Result<Box<dyn FrameSource>, CaptureError> {
            let kind = SourceKind::Camera(facing);
            self.events.lock().unwrap().push(format!("open {kind}"));
            if self.camera_fails {
                return Err(CaptureError::CameraUnavailable("denied".to_string()));
            }
            Ok(Box::new(FakeSource {
                kind,
                dims: Some((64, 48)),
                events: self.events.clone(),
            }))
        }

        fn open_file(
            &mut self,
            path: &Path,
            _config: &CaptureConfig,
        ) -> Result<Box<dyn FrameSource>, CaptureError> {
            let kind = SourceKind::Clip(path.to_path_buf());
            self.events.lock().unwrap().push(format!("open {kind}"));
            if path.extension().is_some_and(|ext| ext == "bad") {
                return Err(CaptureError::Decode {
                    path: path.to_path_buf(),
                    reason: "corrupt".to_string(),
                });
            }
            Ok(Box::new(FakeSource {
                kind,
                dims: self.clip_dims,
                events: self.events.clone(),
            }))
        }
    }

    fn fast_config() -> CaptureConfig {
        CaptureConfig {
            live_interval_ms: 0,
            live_frames: 5,
            seek_timeout_ms: 1,
            ..CaptureConfig::default()
        }
    }

    fn session_with(provider: FakeProvider) -> (CaptureSession<FakeProvider>, EventLog) {
        let events = provider.events.clone();
        (CaptureSession::new(provider, fast_config()), events)
    }

    fn events(log: &EventLog) -> Vec<String> {
        log.lock().unwrap().clone()
    }

    #[test]
    fn test_switch_facing_stops_old_stream_first() {
        let (mut session, log) = session_with(FakeProvider::default());
        session.start_camera(FacingMode::User).unwrap();
        assert_eq!(session.switch_facing().unwrap(), FacingMode::Environment);

        assert_eq!(
            events(&log),
            vec![
                "open camera (User)",
                "stop camera (User)",
                "open camera (Environment)",
            ]
        );
        assert_eq!(
            session.active_kind(),
            Some(SourceKind::Camera(FacingMode::Environment))
        );
    }

    #[test]
    fn test_camera_failure_leaves_no_active_source() {
        let (mut session, _log) = session_with(FakeProvider {
            camera_fails: true,
            ..FakeProvider::default()
        });
        let err = session.start_camera(FacingMode::User).unwrap_err();
        assert!(matches!(err, CaptureError::CameraUnavailable(_)));
        assert!(session.active_kind().is_none());
        assert!(matches!(session.capture(|_| {}), Err(CaptureError::NoActiveSource)));
    }

    #[test]
    fn test_load_file_releases_camera_and_extracts() {
        let (mut session, log) = session_with(FakeProvider {
            clip_dims: Some((100, 80)),
            ..FakeProvider::default()
        });
        session.start_camera(FacingMode::User).unwrap();
        session.load_file(Path::new("clip.gif")).unwrap();

        let buffer = session.capture(|_| {}).unwrap();
        // 0.5 s at the default 20 fps.
        assert_eq!(buffer.len(), 10);
        assert_eq!(
            events(&log)[..3],
            ["open camera (User)", "stop camera (User)", "open clip clip.gif"]
        );
    }

    #[test]
    fn test_failed_extraction_falls_back_to_camera() {
        let (mut session, log) = session_with(FakeProvider::default());
        session.load_file(Path::new("blank.gif")).unwrap();

        let err = session.capture(|_| {}).unwrap_err();
        assert!(matches!(err, CaptureError::Upload { .. }));
        assert_eq!(
            session.active_kind(),
            Some(SourceKind::Camera(FacingMode::User))
        );
        assert_eq!(
            events(&log),
            vec!["open clip blank.gif", "stop clip blank.gif", "open camera (User)"]
        );
    }

    #[test]
    fn test_unreadable_file_falls_back_to_camera() {
        let (mut session, _log) = session_with(FakeProvider::default());
        let err = session.load_file(&PathBuf::from("clip.bad")).unwrap_err();
        match err {
            CaptureError::Upload { source } => {
                assert!(matches!(*source, CaptureError::Decode { .. }))
            }
            other => panic!("expected upload error, got {other:?}"),
        }
        assert_eq!(
            session.active_kind(),
            Some(SourceKind::Camera(FacingMode::User))
        );
    }

    #[test]
    fn test_fallback_disabled_leaves_camera_closed() {
        let (session, log) = session_with(FakeProvider::default());
        let mut session = session.with_camera_fallback(false);

        let err = session.load_file(Path::new("clip.bad")).unwrap_err();
        assert!(matches!(err, CaptureError::Upload { .. }));
        assert!(session.active_kind().is_none());

        session.load_file(Path::new("blank.gif")).unwrap();
        assert!(session.capture(|_| {}).is_err());
        assert_eq!(
            session.active_kind(),
            Some(SourceKind::Clip(PathBuf::from("blank.gif")))
        );
        assert!(events(&log).iter().all(|event| !event.contains("camera")));
    }

    #[test]
    fn test_live_capture_uses_configured_frame_count() {
        let (mut session, _log) = session_with(FakeProvider::default());
        session.start_camera(FacingMode::User).unwrap();
        let mut last = 0.0;
        let buffer = session.capture(|p| last = p).unwrap();
        assert_eq!(buffer.len(), 5);
        assert_eq!(last, 1.0);
    }

    #[test]
    fn test_drop_releases_source() {
        let (mut session, log) = session_with(FakeProvider::default());
        session.start_camera(FacingMode::Environment).unwrap();
        drop(session);
        assert_eq!(events(&log).last().unwrap(), "stop camera (Environment)");
    }
}
