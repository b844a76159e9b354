use std::{
    thread,
    time::{Duration, Instant},
};

use super::{
    buffer::FrameBuffer,
    roi::{self, RoiSettings},
    source::{CaptureError, FrameSource},
};
use crate::config::CaptureConfig;

#[derive(Clone, Debug, PartialEq)]
pub struct SamplerSettings {
    pub roi: RoiSettings,
    pub live_interval: Duration,
    pub live_frames: usize,
    pub upload_fps: f32,
    pub upload_ceiling: Duration,
    pub seek_timeout: Duration,
    pub max_frames: usize,
}

impl From<&CaptureConfig> for SamplerSettings {
    fn from(config: &CaptureConfig) -> Self {
        Self {
            roi: RoiSettings::from(config),
            live_interval: config.live_interval(),
            live_frames: config.live_frames,
            upload_fps: config.upload_fps,
            upload_ceiling: config.upload_ceiling(),
            seek_timeout: config.seek_timeout(),
            max_frames: config.max_frames,
        }
    }
}

impl Default for SamplerSettings {
    fn default() -> Self {
        Self::from(&CaptureConfig::default())
    }
}

impl SamplerSettings {
    /// Number of samples taken from a clip of `duration`, before the buffer cap.
    pub fn upload_frame_count(&self, duration: Option<Duration>) -> usize {
        let span = match duration {
            Some(d) if d > Duration::ZERO => d.min(self.upload_ceiling),
            _ => self.upload_ceiling,
        };
        // Guard against float noise turning 3.0 * 20 into 59.999.
        (span.as_secs_f64() * self.upload_fps as f64 + 1e-6).floor() as usize
    }
}

fn ensure_ready(source: &dyn FrameSource) -> Result<(u32, u32), CaptureError> {
    match source.dimensions() {
        Some((w, h)) if w > 0 && h > 0 => Ok((w, h)),
        _ => Err(CaptureError::SourceNotReady),
    }
}

fn encode(
    source: &mut dyn FrameSource,
    settings: &SamplerSettings,
    offset: Duration,
) -> Result<super::buffer::EncodedFrame, CaptureError> {
    let frame = source.current_frame()?;
    if frame.is_blank() {
        return Err(CaptureError::SourceNotReady);
    }
    roi::encode_frame(&frame, &settings.roi, offset).map_err(|err| CaptureError::Encode(format!("{err:#}")))
}

/// Snapshots a live source every `live_interval` until `live_frames` samples
/// (or the buffer cap) are collected. `on_progress` receives the completed
/// fraction after each sample.
pub fn capture_live<F>(
    source: &mut dyn FrameSource,
    settings: &SamplerSettings,
    mut on_progress: F,
) -> Result<FrameBuffer, CaptureError>
where
    F: FnMut(f32),
{
    ensure_ready(source)?;

    let target = settings.live_frames.min(settings.max_frames);
    let mut buffer = FrameBuffer::with_capacity(target);
    let started = Instant::now();
    log::info!(
        "live capture: {target} frames every {:?} from {}",
        settings.live_interval,
        source.kind()
    );

    for idx in 0..target {
        let due = started + settings.live_interval * idx as u32;
        let now = Instant::now();
        if due > now {
            thread::sleep(due - now);
        }

        let encoded = encode(source, settings, started.elapsed())?;
        buffer.push(encoded);
        on_progress((idx + 1) as f32 / target as f32);
    }

    log::info!("live capture finished: {} frames over {:?}", buffer.len(), buffer.span());
    Ok(buffer)
}

/// Steps a clip's playhead at `upload_fps` and samples each presented frame.
///
/// A seek that does not complete within `seek_timeout` is not fatal; the frame
/// currently on screen is used instead.
pub fn extract_upload<F>(
    source: &mut dyn FrameSource,
    settings: &SamplerSettings,
    mut on_progress: F,
) -> Result<FrameBuffer, CaptureError>
where
    F: FnMut(f32),
{
    ensure_ready(source)?;

    let wanted = settings.upload_frame_count(source.duration());
    let total = wanted.min(settings.max_frames);
    if total < wanted {
        log::warn!("clip would yield {wanted} frames, capped at {total}");
    }
    let mut buffer = FrameBuffer::with_capacity(total);
    log::info!(
        "extracting {total} frames at {} fps from {} (duration {:?})",
        settings.upload_fps,
        source.kind(),
        source.duration()
    );

    for idx in 0..total {
        let position = Duration::from_secs_f64(idx as f64 / settings.upload_fps as f64);
        source.seek(position)?;
        if !source.wait_seeked(settings.seek_timeout) {
            log::warn!(
                "seek to {position:?} not confirmed within {:?}; sampling current frame",
                settings.seek_timeout
            );
        }

        let encoded = encode(source, settings, position)?;
        buffer.push(encoded);
        on_progress((idx + 1) as f32 / total.max(1) as f32);
    }

    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        pipeline::{clip::ClipSource, source::SourceKind},
        types::Frame,
    };
    use image::{Rgba, RgbaImage};

    fn clip_of(count: usize, frame_ms: u64) -> ClipSource {
        let delay = Duration::from_millis(frame_ms);
        let frames = (0..count)
            .map(|idx| {
                let value = (idx % 256) as u8;
                (RgbaImage::from_pixel(32, 24, Rgba([value, value, value, 255])), delay)
            })
            .collect();
        ClipSource::from_frames("test.gif", frames).unwrap()
    }

    fn fast_settings() -> SamplerSettings {
        SamplerSettings {
            live_interval: Duration::ZERO,
            seek_timeout: Duration::from_millis(1),
            ..SamplerSettings::default()
        }
    }

    /// Counts frames and can pretend to never confirm seeks.
    struct StubSource {
        dims: Option<(u32, u32)>,
        seeks_complete: bool,
        frames_served: usize,
    }

    impl StubSource {
        fn ready() -> Self {
            Self {
                dims: Some((40, 30)),
                seeks_complete: true,
                frames_served: 0,
            }
        }
    }

    impl FrameSource for StubSource {
        fn kind(&self) -> SourceKind {
            SourceKind::Clip("stub".into())
        }

        fn dimensions(&self) -> Option<(u32, u32)> {
            self.dims
        }

        fn duration(&self) -> Option<Duration> {
            Some(Duration::from_secs(1))
        }

        fn seek(&mut self, _position: Duration) -> Result<(), CaptureError> {
            Ok(())
        }

        fn wait_seeked(&mut self, _timeout: Duration) -> bool {
            self.seeks_complete
        }

        fn current_frame(&mut self) -> Result<Frame, CaptureError> {
            let (width, height) = self.dims.ok_or(CaptureError::SourceNotReady)?;
            self.frames_served += 1;
            Ok(Frame {
                rgba: vec![90; (width * height * 4) as usize],
                width,
                height,
                timestamp: Instant::now(),
            })
        }

        fn release(&mut self) {}
    }

    #[test]
    fn test_short_clip_yields_duration_times_fps() {
        let mut clip = clip_of(75, 40);
        let settings = SamplerSettings {
            upload_fps: 20.0,
            upload_ceiling: Duration::from_secs(10),
            ..fast_settings()
        };
        let buffer = extract_upload(&mut clip, &settings, |_| {}).unwrap();
        assert_eq!(buffer.len(), 60);
    }

    #[test]
    fn test_long_clip_is_bounded_by_ceiling_and_cap() {
        let settings = SamplerSettings {
            upload_fps: 20.0,
            upload_ceiling: Duration::from_secs(10),
            max_frames: 1_000,
            ..fast_settings()
        };
        assert_eq!(settings.upload_frame_count(Some(Duration::from_secs(30))), 200);
        assert_eq!(settings.upload_frame_count(None), 200);
        assert_eq!(settings.upload_frame_count(Some(Duration::ZERO)), 200);

        let mut clip = clip_of(120, 100);
        let capped = SamplerSettings {
            max_frames: 30,
            ..settings
        };
        let buffer = extract_upload(&mut clip, &capped, |_| {}).unwrap();
        assert_eq!(buffer.len(), 30);
    }

    #[test]
    fn test_upload_frames_are_temporally_ordered() {
        let mut clip = clip_of(25, 40);
        let buffer = extract_upload(&mut clip, &fast_settings(), |_| {}).unwrap();
        let offsets: Vec<Duration> = buffer.frames().iter().map(|f| f.offset).collect();
        assert!(offsets.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(offsets[0], Duration::ZERO);
        let step = offsets[1].as_secs_f64();
        assert!((step - 0.05).abs() < 1e-6);
    }

    #[test]
    fn test_seek_timeout_is_not_fatal() {
        let mut source = StubSource {
            seeks_complete: false,
            ..StubSource::ready()
        };
        let buffer = extract_upload(&mut source, &fast_settings(), |_| {}).unwrap();
        assert_eq!(buffer.len(), 20);
        assert_eq!(source.frames_served, 20);
    }

    #[test]
    fn test_source_without_dimensions_fails_fast() {
        let mut source = StubSource {
            dims: Some((0, 480)),
            ..StubSource::ready()
        };
        let err = extract_upload(&mut source, &fast_settings(), |_| {}).unwrap_err();
        assert!(matches!(err, CaptureError::SourceNotReady));
        assert_eq!(source.frames_served, 0);

        let mut missing = StubSource {
            dims: None,
            ..StubSource::ready()
        };
        assert!(matches!(
            capture_live(&mut missing, &fast_settings(), |_| {}),
            Err(CaptureError::SourceNotReady)
        ));
    }

    #[test]
    fn test_live_capture_hits_target_and_reports_progress() {
        let mut source = StubSource::ready();
        let settings = SamplerSettings {
            live_frames: 12,
            ..fast_settings()
        };
        let mut progress = Vec::new();
        let buffer = capture_live(&mut source, &settings, |p| progress.push(p)).unwrap();

        assert_eq!(buffer.len(), 12);
        assert_eq!(progress.len(), 12);
        assert!(progress.windows(2).all(|pair| pair[0] < pair[1]));
        assert!((progress[11] - 1.0).abs() < f32::EPSILON);
        let offsets: Vec<Duration> = buffer.frames().iter().map(|f| f.offset).collect();
        assert!(offsets.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[test]
    fn test_live_capture_is_clamped_to_cap() {
        let mut source = StubSource::ready();
        let settings = SamplerSettings {
            live_frames: 50,
            max_frames: 8,
            ..fast_settings()
        };
        let buffer = capture_live(&mut source, &settings, |_| {}).unwrap();
        assert_eq!(buffer.len(), 8);
    }

    #[test]
    fn test_live_capture_paces_samples() {
        let mut source = StubSource::ready();
        let settings = SamplerSettings {
            live_frames: 4,
            live_interval: Duration::from_millis(20),
            ..fast_settings()
        };
        let started = Instant::now();
        let buffer = capture_live(&mut source, &settings, |_| {}).unwrap();
        assert!(started.elapsed() >= Duration::from_millis(60));
        assert!(buffer.span() >= Duration::from_millis(50));
    }
}
