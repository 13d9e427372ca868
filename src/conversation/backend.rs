//! Remote model backends.
//!
//! [`AiBackend`] is the seam the orchestrator talks through. The Gemini
//! implementation speaks the public `generateContent` REST API and returns
//! the raw JSON body; interpreting it is left to [`super::response`].

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use super::request::RequestEnvelope;

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("no API key configured")]
    MissingApiKey,
    #[error("request to backend failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("backend returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("backend response could not be decoded: {0}")]
    Decode(String),
}

#[async_trait]
pub trait AiBackend: Send + Sync {
    fn name(&self) -> &'static str;

    async fn generate(
        &self,
        api_key: &str,
        request: &RequestEnvelope,
    ) -> Result<Value, BackendError>;
}

#[derive(Clone)]
pub struct GeminiBackend {
    base_url: String,
    http_client: reqwest::Client,
}

impl GeminiBackend {
    pub fn new() -> Result<Self, BackendError> {
        Self::with_base_url(GEMINI_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, BackendError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;

        Ok(Self {
            base_url: base_url.into(),
            http_client,
        })
    }

    fn generate_url(&self, model: &str) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            model
        )
    }
}

#[async_trait]
impl AiBackend for GeminiBackend {
    fn name(&self) -> &'static str {
        "Gemini"
    }

    async fn generate(
        &self,
        api_key: &str,
        request: &RequestEnvelope,
    ) -> Result<Value, BackendError> {
        if api_key.trim().is_empty() {
            return Err(BackendError::MissingApiKey);
        }

        let response = self
            .http_client
            .post(self.generate_url(&request.model))
            .header("x-goog-api-key", api_key)
            .json(&request.to_gemini_body())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|err| BackendError::Decode(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_url_joins_model() {
        let backend = GeminiBackend::with_base_url("https://example.test/v1beta/").unwrap();
        assert_eq!(
            backend.generate_url("gemini-3-flash-preview"),
            "https://example.test/v1beta/models/gemini-3-flash-preview:generateContent"
        );
    }
}
