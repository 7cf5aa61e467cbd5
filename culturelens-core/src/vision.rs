//! Vision resolver: raw image bytes to a candidate object identifier.
//!
//! Delegates to a vision-capable backend returning a free-text
//! identification, parses the four-field structured response, and applies
//! the low-confidence rejection policy. The derived identifier is not
//! guaranteed to match a source store key; the knowledge resolver's
//! fallback path handles that mismatch.

use crate::config::{RetryConfig, VisionConfig};
use crate::error::GenerationError;
use crate::generation::with_retry;
use crate::types::{RecognitionResult, RecognitionSource};
use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::warn;

/// Contract for the external recognizer: image in, structured text out.
#[async_trait]
pub trait VisionBackend: Send + Sync {
    /// Identify the landmark in the image, returning the four-field
    /// NAME/LOCATION/CONFIDENCE/DESCRIPTION response text.
    async fn identify(&self, image: &[u8]) -> Result<String, GenerationError>;

    fn model_name(&self) -> &str;
}

const IDENTIFY_PROMPT: &str = "Identify the landmark in this photo.\n\n\
    Respond in this exact format:\n\
    NAME: [Official landmark name, or Unknown]\n\
    LOCATION: [City, Country]\n\
    CONFIDENCE: [High/Medium/Low]\n\
    DESCRIPTION: [One sentence describing what you see]";

/// OpenAI-compatible vision backend: the image travels as an inline
/// base64 data URI in a chat completion.
pub struct HttpVisionBackend {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout: Duration,
    retry: RetryConfig,
}

impl HttpVisionBackend {
    /// Create a vision backend from configuration.
    ///
    /// Returns `GenerationError::AuthFailed` when the key env var is unset,
    /// so the caller can disable image analysis and continue.
    pub fn from_config(config: &VisionConfig) -> Result<Self, GenerationError> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| GenerationError::AuthFailed {
            backend: format!("vision (env var '{}' not set)", config.api_key_env),
        })?;
        Ok(Self {
            client: Client::new(),
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            api_key,
            model: config.model.clone(),
            timeout: Duration::from_secs(config.request_timeout_secs),
            retry: config.retry.clone(),
        })
    }

    async fn send_once(&self, body: &Value) -> Result<String, GenerationError> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json")
            .timeout(self.timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GenerationError::Timeout {
                        timeout_secs: self.timeout.as_secs(),
                    }
                } else {
                    GenerationError::Connection {
                        message: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| GenerationError::Connection {
                message: format!("failed to read response body: {}", e),
            })?;
        if !status.is_success() {
            return Err(GenerationError::ApiRequest {
                message: format!("HTTP {} from vision backend: {}", status, text),
            });
        }

        let json: Value =
            serde_json::from_str(&text).map_err(|e| GenerationError::ResponseParse {
                message: e.to_string(),
            })?;
        json["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| GenerationError::ResponseParse {
                message: "no text content in vision response".to_string(),
            })
    }
}

#[async_trait]
impl VisionBackend for HttpVisionBackend {
    async fn identify(&self, image: &[u8]) -> Result<String, GenerationError> {
        let data_uri = format!(
            "data:image/jpeg;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(image)
        );
        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": 200,
            "messages": [{
                "role": "user",
                "content": [
                    {"type": "text", "text": IDENTIFY_PROMPT},
                    {"type": "image_url", "image_url": {"url": data_uri}}
                ]
            }]
        });

        with_retry(&self.retry, || self.send_once(&body)).await
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Maps raw image bytes to a candidate object identifier plus confidence.
pub struct VisionResolver {
    backend: std::sync::Arc<dyn VisionBackend>,
}

impl VisionResolver {
    pub fn new(backend: std::sync::Arc<dyn VisionBackend>) -> Self {
        Self { backend }
    }

    /// Recognize the object in the image.
    ///
    /// Backend failure and low-confidence identifications both produce a
    /// rejection result rather than an error.
    pub async fn recognize(&self, image: &[u8]) -> RecognitionResult {
        let raw = match self.backend.identify(image).await {
            Ok(text) => text,
            Err(e) => {
                warn!(stage = "vision", error = %e, "Vision backend call failed");
                return RecognitionResult::rejected(None);
            }
        };
        parse_identification(&raw)
    }
}

/// Parse the four-field response and apply the rejection policy.
fn parse_identification(raw: &str) -> RecognitionResult {
    let mut name = None;
    let mut location = None;
    let mut level = None;
    let mut description = None;

    for line in raw.lines() {
        let line = line.trim();
        if let Some(v) = line.strip_prefix("NAME:") {
            name = Some(v.trim().to_string());
        } else if let Some(v) = line.strip_prefix("LOCATION:") {
            location = Some(v.trim().to_string());
        } else if let Some(v) = line.strip_prefix("CONFIDENCE:") {
            level = Some(v.trim().to_string());
        } else if let Some(v) = line.strip_prefix("DESCRIPTION:") {
            description = Some(v.trim().to_string());
        }
    }

    let name = name.unwrap_or_else(|| "Unknown".to_string());
    let level = level.unwrap_or_default();

    // Deliberate rejection policy, not an error: an unsure identification
    // is worth less than none.
    if name == "Unknown" || level.eq_ignore_ascii_case("low") {
        return RecognitionResult::rejected(description);
    }

    RecognitionResult {
        object_id: Some(normalize_identifier(&name)),
        confidence: confidence_score(&level),
        detected_name: Some(name),
        location,
        description,
        processing: RecognitionSource::Cloud,
    }
}

/// Fixed confidence-level-to-score mapping.
fn confidence_score(level: &str) -> f32 {
    match level.to_lowercase().as_str() {
        "high" => 0.9,
        "medium" => 0.7,
        "low" => 0.4,
        _ => 0.5,
    }
}

/// Derive a store-style identifier from a display name.
///
/// Lowercases, strips apostrophes, and drops the articles "the" and "of"
/// wherever they appear, joining the remaining words with underscores:
/// "The Statue of Liberty" -> "statue_liberty".
pub fn normalize_identifier(name: &str) -> String {
    name.to_lowercase()
        .replace('\'', "")
        .split_whitespace()
        .filter(|word| *word != "the" && *word != "of")
        .collect::<Vec<_>>()
        .join("_")
}

/// A mock vision backend for tests.
pub struct MockVisionBackend {
    response: Option<String>,
}

impl MockVisionBackend {
    pub fn with_response(text: &str) -> Self {
        Self {
            response: Some(text.to_string()),
        }
    }

    pub fn failing() -> Self {
        Self { response: None }
    }
}

#[async_trait]
impl VisionBackend for MockVisionBackend {
    async fn identify(&self, _image: &[u8]) -> Result<String, GenerationError> {
        match &self.response {
            Some(text) => Ok(text.clone()),
            None => Err(GenerationError::Connection {
                message: "mock vision backend configured to fail".to_string(),
            }),
        }
    }

    fn model_name(&self) -> &str {
        "mock-vision"
    }
}
