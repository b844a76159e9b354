use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::{Value, json};

use super::{ClassificationBackend, DiagnosisError, DiagnosisRequest};
use crate::{
    config::DiagnosisConfig,
    types::{Language, TestSide},
};

const DEFAULT_RUBRIC: &str = "\
You are an otolaryngologist reviewing close-up eye footage recorded during a \
Dix-Hallpike or supine roll test. The patient is testing the {test_side} side. \
The footage comes from a front-facing phone camera, often in low light; follow \
the pupil, iris texture and scleral vessels to detect rotation.

Classify by nystagmus direction:
- Up-beating combined with torsional beating (upper pole toward the lower ear): canal = \"Posterior\".
- Purely horizontal beating, geotropic or apogeotropic: canal = \"Horizontal\".
- Mainly down-beating, possibly with a small torsional part: canal = \"Anterior\".
- No rhythmic involuntary movement (ignore blinks and voluntary gaze shifts): hasBPPV = false.

Rules:
- hasBPPV is true only when one of the patterns above is seen.
- side normally equals the tested side ({test_side}); report the opposite side only when the pattern clearly points to it.
- confidence is 0.6 to 0.8 for subtle but rhythmic movement and 0.9 or more when obvious.
- Write the reasoning field in {language} and describe only what is visible.";

fn language_name(lang: Language) -> &'static str {
    match lang {
        Language::En => "English",
        Language::Zh => "Simplified Chinese (简体中文)",
    }
}

/// Fills the rubric template for one request.
pub fn rubric(template: Option<&str>, test_side: TestSide, lang: Language) -> String {
    template
        .unwrap_or(DEFAULT_RUBRIC)
        .replace("{test_side}", test_side.wire_name())
        .replace("{language}", language_name(lang))
}

fn response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "hasBPPV": { "type": "BOOLEAN" },
            "side": { "type": "STRING", "enum": ["Left", "Right"] },
            "canal": { "type": "STRING", "enum": ["Posterior", "Horizontal", "Anterior"] },
            "confidence": { "type": "NUMBER", "description": "0.0 to 1.0" },
            "reasoning": { "type": "STRING" }
        },
        "required": ["hasBPPV", "confidence", "reasoning"]
    })
}

#[derive(Debug, Default, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

/// Calls the hosted vision-language model directly with the rubric prompt.
pub struct GeminiBackend {
    client: Client,
    url: String,
    api_key: String,
    system_instruction: Option<String>,
}

impl GeminiBackend {
    pub fn new(config: &DiagnosisConfig, api_key: String) -> Result<Self, DiagnosisError> {
        let client = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self {
            client,
            url: format!(
                "{}/models/{}:generateContent",
                config.model_base_url.trim_end_matches('/'),
                config.model
            ),
            api_key,
            system_instruction: config.system_instruction.clone(),
        })
    }

    fn request_body(&self, request: &DiagnosisRequest) -> Value {
        let side = request.test_side.wire_name();
        let mut parts: Vec<Value> = request
            .frames
            .iter()
            .map(|uri| {
                let data = uri.split_once(',').map_or(uri.as_str(), |(_, data)| data);
                json!({ "inlineData": { "mimeType": "image/jpeg", "data": data } })
            })
            .collect();
        parts.push(json!({
            "text": format!(
                "Patient is testing the {side} side. Analyze the eye movement pattern \
                 (up/down/horizontal/torsional) across these {} frames and identify the affected canal.",
                request.frames.len()
            )
        }));

        json!({
            "systemInstruction": {
                "parts": [{ "text": rubric(self.system_instruction.as_deref(), request.test_side, request.lang) }]
            },
            "contents": [{ "role": "user", "parts": parts }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": response_schema()
            }
        })
    }
}

fn extract_text(body: &str) -> Result<String, DiagnosisError> {
    let response: GenerateResponse = serde_json::from_str(body)?;
    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .map(|content| content.parts.into_iter().filter_map(|part| part.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(DiagnosisError::EmptyResponse);
    }
    Ok(text)
}

impl ClassificationBackend for GeminiBackend {
    fn label(&self) -> &'static str {
        "gemini"
    }

    fn classify(&self, request: &DiagnosisRequest) -> Result<String, DiagnosisError> {
        let response = self
            .client
            .post(&self.url)
            .header("x-goog-api-key", &self.api_key)
            .json(&self.request_body(request))
            .send()?;

        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            return Err(DiagnosisError::Status {
                status: status.as_u16(),
                body,
            });
        }
        extract_text(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(instruction: Option<&str>) -> GeminiBackend {
        let config = DiagnosisConfig {
            model_base_url: "https://example.invalid/v1beta/".to_string(),
            system_instruction: instruction.map(str::to_string),
            ..DiagnosisConfig::default()
        };
        GeminiBackend::new(&config, "test-key".to_string()).unwrap()
    }

    fn request() -> DiagnosisRequest {
        DiagnosisRequest {
            frames: vec![
                "data:image/jpeg;base64,AAAA".to_string(),
                "data:image/jpeg;base64,BBBB".to_string(),
            ],
            lang: Language::Zh,
            test_side: TestSide::Right,
        }
    }

    #[test]
    fn test_url_is_built_from_config() {
        assert_eq!(
            backend(None).url,
            "https://example.invalid/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }

    #[test]
    fn test_body_carries_frames_prompt_and_schema() {
        let body = backend(None).request_body(&request());
        let parts = body["contents"][0]["parts"].as_array().unwrap();

        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0]["inlineData"]["data"], "AAAA");
        assert_eq!(parts[1]["inlineData"]["mimeType"], "image/jpeg");
        assert!(parts[2]["text"].as_str().unwrap().contains("Right side"));

        let schema = &body["generationConfig"]["responseSchema"];
        assert_eq!(schema["required"], json!(["hasBPPV", "confidence", "reasoning"]));

        let instruction = body["systemInstruction"]["parts"][0]["text"].as_str().unwrap();
        assert!(instruction.contains("testing the Right side"));
        assert!(instruction.contains("Simplified Chinese"));
        assert!(!instruction.contains("{test_side}"));
    }

    #[test]
    fn test_custom_rubric_placeholders() {
        let text = rubric(Some("side={test_side} lang={language}"), TestSide::Unknown, Language::En);
        assert_eq!(text, "side=UNKNOWN lang=English");
    }

    #[test]
    fn test_extract_text_joins_first_candidate_parts() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"{\"hasBPPV\":"},{"text":"false}"}],"role":"model"},"finishReason":"STOP"}]}"#;
        assert_eq!(extract_text(body).unwrap(), "{\"hasBPPV\":false}");
    }

    #[test]
    fn test_extract_text_without_candidates_is_empty() {
        assert!(matches!(
            extract_text(r#"{"candidates":[]}"#),
            Err(DiagnosisError::EmptyResponse)
        ));
        assert!(matches!(
            extract_text(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#),
            Err(DiagnosisError::EmptyResponse)
        ));
    }
}
