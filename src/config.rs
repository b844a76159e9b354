use std::{fs, path::Path, time::Duration};

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config value `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub diagnosis: DiagnosisConfig,
    #[serde(default)]
    pub render: RenderConfig,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct CaptureConfig {
    /// Side of the centered square region kept from each frame, as a fraction of the frame.
    #[serde(default = "default_roi_fraction")]
    pub roi_fraction: f32,
    #[serde(default = "default_max_width")]
    pub max_width: u32,
    /// JPEG quality in (0, 1].
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: f32,
    #[serde(default = "default_live_interval_ms")]
    pub live_interval_ms: u64,
    #[serde(default = "default_live_frames")]
    pub live_frames: usize,
    #[serde(default = "default_upload_fps")]
    pub upload_fps: f32,
    /// Duration assumed for clips that report none.
    #[serde(default = "default_upload_ceiling_secs")]
    pub upload_ceiling_secs: f32,
    #[serde(default = "default_seek_timeout_ms")]
    pub seek_timeout_ms: u64,
    /// Hard cap on the number of frames held in one buffer.
    #[serde(default = "default_max_frames")]
    pub max_frames: usize,
    /// Playback rate assumed for a directory of numbered frame images.
    #[serde(default = "default_frame_dir_fps")]
    pub frame_dir_fps: f32,
    #[serde(default = "default_preferred_width")]
    pub preferred_width: u32,
    #[serde(default = "default_preferred_height")]
    pub preferred_height: u32,
    #[serde(default = "default_preferred_fps")]
    pub preferred_fps: u32,
    #[serde(default = "default_first_frame_timeout_ms")]
    pub first_frame_timeout_ms: u64,
}

/// Upper bound on the sampled clip span.
const MAX_UPLOAD_CEILING_SECS: f32 = 600.0;

fn default_roi_fraction() -> f32 { 0.4 }
fn default_max_width() -> u32 { 640 }
fn default_jpeg_quality() -> f32 { 0.8 }
fn default_live_interval_ms() -> u64 { 100 }
fn default_live_frames() -> usize { 100 }
fn default_upload_fps() -> f32 { 20.0 }
fn default_upload_ceiling_secs() -> f32 { 10.0 }
fn default_seek_timeout_ms() -> u64 { 500 }
fn default_max_frames() -> usize { 150 }
fn default_frame_dir_fps() -> f32 { 30.0 }
fn default_preferred_width() -> u32 { 1280 }
fn default_preferred_height() -> u32 { 720 }
fn default_preferred_fps() -> u32 { 30 }
fn default_first_frame_timeout_ms() -> u64 { 3_000 }

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            roi_fraction: default_roi_fraction(),
            max_width: default_max_width(),
            jpeg_quality: default_jpeg_quality(),
            live_interval_ms: default_live_interval_ms(),
            live_frames: default_live_frames(),
            upload_fps: default_upload_fps(),
            upload_ceiling_secs: default_upload_ceiling_secs(),
            seek_timeout_ms: default_seek_timeout_ms(),
            max_frames: default_max_frames(),
            frame_dir_fps: default_frame_dir_fps(),
            preferred_width: default_preferred_width(),
            preferred_height: default_preferred_height(),
            preferred_fps: default_preferred_fps(),
            first_frame_timeout_ms: default_first_frame_timeout_ms(),
        }
    }
}

impl CaptureConfig {
    pub fn live_interval(&self) -> Duration {
        Duration::from_millis(self.live_interval_ms)
    }

    pub fn seek_timeout(&self) -> Duration {
        Duration::from_millis(self.seek_timeout_ms)
    }

    pub fn upload_ceiling(&self) -> Duration {
        Duration::from_secs_f32(self.upload_ceiling_secs)
    }

    pub fn first_frame_timeout(&self) -> Duration {
        Duration::from_millis(self.first_frame_timeout_ms)
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// POST the request to an analysis endpoint that holds the model credential.
    #[default]
    Relay,
    /// Call the hosted model directly; only for server-side deployments.
    Gemini,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct DiagnosisConfig {
    #[serde(default)]
    pub backend: BackendKind,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_model_base_url")]
    pub model_base_url: String,
    /// Name of the environment variable holding the hosted-model credential.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_request_frames")]
    pub max_request_frames: usize,
    /// Replaces the built-in rubric. `{test_side}` and `{language}` are substituted.
    #[serde(default)]
    pub system_instruction: Option<String>,
}

fn default_endpoint() -> String { "http://localhost:3000/api/analyze".to_string() }
fn default_model() -> String { "gemini-2.5-flash".to_string() }
fn default_model_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}
fn default_api_key_env() -> String { "API_KEY".to_string() }
fn default_timeout_secs() -> u64 { 60 }
fn default_max_request_frames() -> usize { 30 }

impl Default for DiagnosisConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            endpoint: default_endpoint(),
            model: default_model(),
            model_base_url: default_model_base_url(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
            max_request_frames: default_max_request_frames(),
            system_instruction: None,
        }
    }
}

impl DiagnosisConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RenderConfig {
    /// Exponential damping rate (1/s) used to ease joints toward their targets.
    #[serde(default = "default_damping")]
    pub damping: f32,
    /// Lateral slide applied when the body faces a bed edge.
    #[serde(default = "default_side_offset")]
    pub side_offset: f32,
    #[serde(default = "default_tick_hz")]
    pub tick_hz: u32,
}

fn default_damping() -> f32 { 5.0 }
fn default_side_offset() -> f32 { 0.85 }
fn default_tick_hz() -> u32 { 60 }

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            damping: default_damping(),
            side_offset: default_side_offset(),
            tick_hz: default_tick_hz(),
        }
    }
}

impl AppConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config: AppConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path` when given, otherwise returns validated defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let config = Self::default();
                config.validate()?;
                Ok(config)
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let capture = &self.capture;
        if !(capture.roi_fraction > 0.0 && capture.roi_fraction <= 1.0) {
            return Err(invalid("capture.roi_fraction", "must be in (0, 1]"));
        }
        if !(capture.jpeg_quality > 0.0 && capture.jpeg_quality <= 1.0) {
            return Err(invalid("capture.jpeg_quality", "must be in (0, 1]"));
        }
        if capture.max_width == 0 {
            return Err(invalid("capture.max_width", "must be positive"));
        }
        if capture.live_frames == 0 {
            return Err(invalid("capture.live_frames", "must be positive"));
        }
        if !(capture.upload_fps.is_finite() && capture.upload_fps > 0.0) {
            return Err(invalid("capture.upload_fps", "must be a positive number"));
        }
        if !(capture.upload_ceiling_secs > 0.0 && capture.upload_ceiling_secs <= MAX_UPLOAD_CEILING_SECS) {
            return Err(invalid("capture.upload_ceiling_secs", "must be in (0, 600]"));
        }
        if !(capture.frame_dir_fps.is_finite() && capture.frame_dir_fps > 0.0) {
            return Err(invalid("capture.frame_dir_fps", "must be a positive number"));
        }
        if capture.max_frames == 0 {
            return Err(invalid("capture.max_frames", "must be positive"));
        }
        if self.diagnosis.max_request_frames == 0 {
            return Err(invalid("diagnosis.max_request_frames", "must be positive"));
        }
        if !(self.render.damping.is_finite() && self.render.damping > 0.0) {
            return Err(invalid("render.damping", "must be a positive number"));
        }
        if self.render.tick_hz == 0 {
            return Err(invalid("render.tick_hz", "must be positive"));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_string(),
    }
}
