use std::time::Duration;

use reqwest::blocking::Client;

use super::{ClassificationBackend, DiagnosisError, DiagnosisRequest};

/// Posts the request JSON to an analysis endpoint that holds the model
/// credentials and answers with the diagnosis object.
pub struct RelayBackend {
    client: Client,
    endpoint: String,
}

impl RelayBackend {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, DiagnosisError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl ClassificationBackend for RelayBackend {
    fn label(&self) -> &'static str {
        "relay"
    }

    fn classify(&self, request: &DiagnosisRequest) -> Result<String, DiagnosisError> {
        log::debug!("POST {} ({} frames)", self.endpoint, request.frames.len());
        let response = self.client.post(&self.endpoint).json(request).send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(DiagnosisError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let text = response.text()?;
        if text.trim().is_empty() {
            return Err(DiagnosisError::EmptyResponse);
        }
        Ok(text)
    }
}
