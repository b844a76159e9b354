pub mod gemini;
pub mod relay;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    config::{BackendKind, DiagnosisConfig},
    messages::{self, Message},
    pipeline::{EncodedFrame, FrameBuffer},
    types::{CanalType, DiagnosisResult, Language, Side, TestSide},
};

pub use gemini::GeminiBackend;
pub use relay::RelayBackend;

#[derive(Debug, Error)]
pub enum DiagnosisError {
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("classifier returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("classifier returned an empty response")]
    EmptyResponse,
    #[error("response does not match the diagnosis schema: {0}")]
    Schema(#[from] serde_json::Error),
    #[error("confidence {0} is outside [0, 1]")]
    ConfidenceOutOfRange(f32),
    #[error("environment variable `{0}` holding the API key is not set")]
    MissingApiKey(String),
}

/// Body of one classification round trip.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DiagnosisRequest {
    /// `data:image/jpeg;base64,` URIs in capture order.
    pub frames: Vec<String>,
    pub lang: Language,
    #[serde(rename = "testSide")]
    pub test_side: TestSide,
}

impl DiagnosisRequest {
    pub fn new(frames: &[&EncodedFrame], test_side: TestSide, lang: Language) -> Self {
        Self {
            frames: frames.iter().map(|frame| frame.data_uri()).collect(),
            lang,
            test_side,
        }
    }
}

/// Turns a request into the classifier's raw JSON reply.
pub trait ClassificationBackend: Send + Sync {
    fn label(&self) -> &'static str;

    fn classify(&self, request: &DiagnosisRequest) -> Result<String, DiagnosisError>;
}

/// The exact shape a classifier must answer with.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WireDiagnosis {
    #[serde(rename = "hasBPPV")]
    pub has_bppv: bool,
    #[serde(default)]
    pub side: Option<Side>,
    #[serde(default)]
    pub canal: Option<CanalType>,
    pub confidence: f32,
    pub reasoning: String,
}

pub fn parse_response(text: &str) -> Result<WireDiagnosis, DiagnosisError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(DiagnosisError::EmptyResponse);
    }
    let wire: WireDiagnosis = serde_json::from_str(text)?;
    if !(0.0..=1.0).contains(&wire.confidence) {
        return Err(DiagnosisError::ConfidenceOutOfRange(wire.confidence));
    }
    Ok(wire)
}

/// Applies the side rules: a positive result without a side takes the declared
/// test side, a negative result never carries side or canal.
pub fn finalize(wire: WireDiagnosis, test_side: TestSide) -> DiagnosisResult {
    if !wire.has_bppv {
        return DiagnosisResult {
            has_bppv: false,
            side: None,
            canal: None,
            confidence: wire.confidence,
            reasoning: wire.reasoning,
        };
    }

    DiagnosisResult {
        has_bppv: true,
        side: wire.side.or(test_side.side()),
        canal: wire.canal,
        confidence: wire.confidence,
        reasoning: wire.reasoning,
    }
}

/// Picks at most `max` frames spread evenly over `frames`, keeping order.
pub fn select_evenly(frames: &[EncodedFrame], max: usize) -> Vec<&EncodedFrame> {
    if max == 0 {
        return Vec::new();
    }
    if frames.len() <= max {
        return frames.iter().collect();
    }
    (0..max).map(|idx| &frames[idx * frames.len() / max]).collect()
}

/// Sends captured frames through a [`ClassificationBackend`].
pub struct DiagnosisClient {
    backend: Box<dyn ClassificationBackend>,
    max_request_frames: usize,
}

impl DiagnosisClient {
    pub fn new(backend: Box<dyn ClassificationBackend>, max_request_frames: usize) -> Self {
        Self {
            backend,
            max_request_frames,
        }
    }

    /// Builds the backend named in `config`. The hosted-model backend reads its
    /// key from the configured environment variable here and nowhere else.
    pub fn from_config(config: &DiagnosisConfig) -> Result<Self, DiagnosisError> {
        let backend: Box<dyn ClassificationBackend> = match config.backend {
            BackendKind::Relay => Box::new(RelayBackend::new(&config.endpoint, config.timeout())?),
            BackendKind::Gemini => {
                let api_key = std::env::var(&config.api_key_env)
                    .ok()
                    .filter(|key| !key.trim().is_empty())
                    .ok_or_else(|| DiagnosisError::MissingApiKey(config.api_key_env.clone()))?;
                Box::new(GeminiBackend::new(config, api_key)?)
            }
        };
        Ok(Self::new(backend, config.max_request_frames))
    }

    pub fn backend_label(&self) -> &'static str {
        self.backend.label()
    }

    /// One classification round trip. Never fails: any error becomes a
    /// negative result whose reasoning is a localized explanation.
    pub fn analyze(&self, buffer: FrameBuffer, test_side: TestSide, lang: Language) -> DiagnosisResult {
        let frames = buffer.into_frames();
        if frames.is_empty() {
            log::warn!("no frames captured; skipping classification");
            return DiagnosisResult::negative(messages::text(Message::NoFrames, lang));
        }

        let selected = select_evenly(&frames, self.max_request_frames);
        log::info!(
            "classifying {} of {} frames via {} (test side {})",
            selected.len(),
            frames.len(),
            self.backend.label(),
            test_side.wire_name()
        );
        let request = DiagnosisRequest::new(&selected, test_side, lang);

        match self.backend.classify(&request).and_then(|text| parse_response(&text)) {
            Ok(wire) => finalize(wire, test_side),
            Err(err) => {
                log::error!("classification via {} failed: {err}", self.backend.label());
                DiagnosisResult::negative(messages::text(Message::AnalysisFailed, lang))
            }
        }
    }
}
