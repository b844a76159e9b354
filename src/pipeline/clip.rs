use std::{
    fs::{self, File},
    io::BufReader,
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use image::{AnimationDecoder, ImageResult, RgbaImage, codecs::gif::GifDecoder, codecs::png::PngDecoder};

use super::source::{CaptureError, FrameSource, SourceKind};
use crate::{config::CaptureConfig, types::Frame};

const FRAME_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif"];

/// Animation delays at or below this are treated as unspecified.
const MIN_FRAME_DELAY: Duration = Duration::from_millis(10);
const DEFAULT_FRAME_DELAY: Duration = Duration::from_millis(100);

fn normalized_delay(delay: Duration) -> Duration {
    if delay <= MIN_FRAME_DELAY { DEFAULT_FRAME_DELAY } else { delay }
}

#[derive(Clone, Debug)]
struct TimedImage {
    start: Duration,
    image: RgbaImage,
}

/// A recorded clip decoded into memory and played back by seeking.
///
/// Accepts animated GIF/APNG files, single still images, and directories of
/// numbered frame images (for example the output of
/// `ffmpeg -i clip.mp4 -vf fps=30 frames/%04d.png`). Decoding stops at the
/// upload ceiling since nothing past it is ever sampled.
#[derive(Debug)]
pub struct ClipSource {
    path: PathBuf,
    frames: Vec<TimedImage>,
    duration: Option<Duration>,
    position: Duration,
}

impl ClipSource {
    pub fn open(path: &Path, config: &CaptureConfig) -> Result<Self, CaptureError> {
        let decode_err = |reason: String| CaptureError::Decode {
            path: path.to_path_buf(),
            reason,
        };

        let limit = config.upload_ceiling();
        let timed = if path.is_dir() {
            let frame_delay = Duration::from_secs_f32(1.0 / config.frame_dir_fps);
            decode_frame_dir(path, frame_delay, limit).map_err(decode_err)?
        } else {
            decode_file(path, limit).map_err(|err| decode_err(err.to_string()))?
        };

        let source = Self::from_frames(path, timed)?;
        log::info!(
            "loaded clip {} ({} frames, {:?})",
            path.display(),
            source.frames.len(),
            source.duration
        );
        Ok(source)
    }

    /// Builds a clip from decoded images and the time each stays on screen.
    /// A zero delay inside a multi-frame clip counts as 100 ms.
    pub fn from_frames(
        path: impl Into<PathBuf>,
        frames: Vec<(RgbaImage, Duration)>,
    ) -> Result<Self, CaptureError> {
        let path = path.into();
        let Some((first, _)) = frames.first() else {
            return Err(CaptureError::Decode {
                path,
                reason: "clip contains no frames".to_string(),
            });
        };

        let dims = first.dimensions();
        if dims.0 == 0 || dims.1 == 0 {
            return Err(CaptureError::SourceNotReady);
        }
        if let Some((odd, _)) = frames.iter().find(|(image, _)| image.dimensions() != dims) {
            return Err(CaptureError::Decode {
                path,
                reason: format!(
                    "frame size {:?} differs from first frame {:?}",
                    odd.dimensions(),
                    dims
                ),
            });
        }

        let animated = frames.len() > 1;
        let mut start = Duration::ZERO;
        let mut timed = Vec::with_capacity(frames.len());
        for (image, delay) in frames {
            timed.push(TimedImage { start, image });
            start += if animated && delay.is_zero() { DEFAULT_FRAME_DELAY } else { delay };
        }

        Ok(Self {
            path,
            frames: timed,
            duration: (start > Duration::ZERO).then_some(start),
            position: Duration::ZERO,
        })
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    fn index_at(&self, position: Duration) -> usize {
        self.frames
            .partition_point(|frame| frame.start <= position)
            .saturating_sub(1)
    }
}

fn decode_file(path: &Path, limit: Duration) -> ImageResult<Vec<(RgbaImage, Duration)>> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "gif" => {
            let decoder = GifDecoder::new(BufReader::new(File::open(path)?))?;
            collect_animation(decoder, limit)
        }
        "png" | "apng" => {
            let decoder = PngDecoder::new(BufReader::new(File::open(path)?))?;
            if decoder.is_apng()? {
                collect_animation(decoder.apng()?, limit)
            } else {
                Ok(vec![(image::open(path)?.to_rgba8(), Duration::ZERO)])
            }
        }
        _ => Ok(vec![(image::open(path)?.to_rgba8(), Duration::ZERO)]),
    }
}

/// Decodes frames until their start time reaches `limit`.
fn collect_animation<'a, D: AnimationDecoder<'a>>(
    decoder: D,
    limit: Duration,
) -> ImageResult<Vec<(RgbaImage, Duration)>> {
    let mut frames = Vec::new();
    let mut start = Duration::ZERO;
    for frame in decoder.into_frames() {
        if start >= limit {
            log::debug!("stopped decoding at {start:?}, past the {limit:?} upload ceiling");
            break;
        }
        let frame = frame?;
        let (numer, denom) = frame.delay().numer_denom_ms();
        let delay_ms = if denom == 0 { 0.0 } else { numer as f64 / denom as f64 };
        let delay = normalized_delay(Duration::from_secs_f64(delay_ms / 1_000.0));
        start += delay;
        frames.push((frame.into_buffer(), delay));
    }
    Ok(frames)
}

fn decode_frame_dir(
    dir: &Path,
    frame_delay: Duration,
    limit: Duration,
) -> Result<Vec<(RgbaImage, Duration)>, String> {
    let entries = fs::read_dir(dir).map_err(|err| err.to_string())?;
    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| FRAME_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        })
        .collect();
    paths.sort();

    // Frames starting before the ceiling: ceil(limit / delay).
    let wanted = (limit.as_secs_f64() / frame_delay.as_secs_f64() - 1e-6).ceil().max(1.0) as usize;
    if paths.len() > wanted {
        log::debug!("loading {wanted} of {} frames in {}", paths.len(), dir.display());
        paths.truncate(wanted);
    }

    paths
        .iter()
        .map(|path| {
            image::open(path)
                .map(|image| (image.to_rgba8(), frame_delay))
                .map_err(|err| format!("{}: {err}", path.display()))
        })
        .collect()
}

impl FrameSource for ClipSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Clip(self.path.clone())
    }

    fn dimensions(&self) -> Option<(u32, u32)> {
        self.frames
            .first()
            .map(|frame| frame.image.dimensions())
            .filter(|&(w, h)| w > 0 && h > 0)
    }

    fn duration(&self) -> Option<Duration> {
        self.duration
    }

    fn seek(&mut self, position: Duration) -> Result<(), CaptureError> {
        if self.frames.is_empty() {
            return Err(CaptureError::NoActiveSource);
        }
        self.position = position;
        Ok(())
    }

    fn wait_seeked(&mut self, _timeout: Duration) -> bool {
        // Frames are already decoded; a seek is presented immediately.
        true
    }

    fn current_frame(&mut self) -> Result<Frame, CaptureError> {
        if self.frames.is_empty() {
            return Err(CaptureError::NoActiveSource);
        }
        let image = &self.frames[self.index_at(self.position)].image;
        Ok(Frame {
            rgba: image.as_raw().clone(),
            width: image.width(),
            height: image.height(),
            timestamp: Instant::now(),
        })
    }

    fn release(&mut self) {
        if !self.frames.is_empty() {
            log::debug!("releasing clip {}", self.path.display());
        }
        self.frames = Vec::new();
        self.position = Duration::ZERO;
    }
}
