//! Text-generation backend abstraction.
//!
//! Defines the `TextGenerator` trait used by every stage that needs dynamic
//! text (knowledge fallback, generative lens interpretation, narration
//! translation), plus the HTTP implementation dispatching over backend kind
//! and a mock for tests.

use crate::config::{GenerationConfig, RetryConfig};
use crate::error::{GenerationError, Retryable};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

/// A single generation call: optional system instruction plus a user prompt.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub system: Option<String>,
    pub prompt: String,
    pub max_tokens: Option<usize>,
    pub temperature: Option<f32>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
            max_tokens: None,
            temperature: None,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Trait for text-generation backends: prompt in, text out, may fail.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Perform one generation call and return the response text.
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError>;

    /// Model identifier, used for provenance tags and logging.
    fn model_name(&self) -> &str;
}

/// Which wire protocol a generation backend speaks.
///
/// Each kind carries nothing itself; the owning `HttpGenerator` holds the
/// shared client handle, credentials, and model identifier, and dispatches
/// body/header construction and response parsing on this tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BackendKind {
    /// OpenAI chat completions shape; also covers Ollama, LM Studio, vLLM.
    OpenAiCompatible,
    /// Anthropic Messages API shape.
    Anthropic,
}

/// The required Anthropic API version header value.
const ANTHROPIC_VERSION: &str = "2023-06-01";

const OPENAI_DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const ANTHROPIC_DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";

/// HTTP text-generation backend.
pub struct HttpGenerator {
    client: Client,
    kind: BackendKind,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: usize,
    temperature: f32,
    timeout: Duration,
    retry: RetryConfig,
}

impl HttpGenerator {
    /// Create a generator from configuration.
    ///
    /// Reads the API key from the environment variable named in
    /// `config.api_key_env`. Returns `GenerationError::AuthFailed` if it is
    /// not set, so the caller can disable this backend and continue.
    pub fn from_config(config: &GenerationConfig) -> Result<Self, GenerationError> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| GenerationError::AuthFailed {
            backend: format!("{} (env var '{}' not set)", config.backend, config.api_key_env),
        })?;

        let kind = match config.backend.as_str() {
            "anthropic" => BackendKind::Anthropic,
            _ => BackendKind::OpenAiCompatible,
        };
        let base_url = config.base_url.clone().unwrap_or_else(|| {
            match kind {
                BackendKind::Anthropic => ANTHROPIC_DEFAULT_BASE_URL,
                BackendKind::OpenAiCompatible => OPENAI_DEFAULT_BASE_URL,
            }
            .to_string()
        });

        Ok(Self {
            client: Client::new(),
            kind,
            base_url,
            api_key,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            timeout: Duration::from_secs(config.request_timeout_secs),
            retry: config.retry.clone(),
        })
    }

    fn build_body(&self, request: &GenerationRequest) -> Value {
        let max_tokens = request.max_tokens.unwrap_or(self.max_tokens);
        let temperature = request.temperature.unwrap_or(self.temperature);

        match self.kind {
            BackendKind::OpenAiCompatible => {
                let mut messages = Vec::new();
                if let Some(system) = &request.system {
                    messages.push(serde_json::json!({"role": "system", "content": system}));
                }
                messages.push(serde_json::json!({"role": "user", "content": request.prompt}));
                serde_json::json!({
                    "model": self.model,
                    "messages": messages,
                    "max_tokens": max_tokens,
                    "temperature": temperature,
                })
            }
            BackendKind::Anthropic => {
                let mut body = serde_json::json!({
                    "model": self.model,
                    "max_tokens": max_tokens,
                    "temperature": temperature,
                    "messages": [{"role": "user", "content": request.prompt}],
                });
                if let Some(system) = &request.system {
                    body["system"] = Value::String(system.clone());
                }
                body
            }
        }
    }

    fn endpoint(&self) -> String {
        match self.kind {
            BackendKind::OpenAiCompatible => format!("{}/chat/completions", self.base_url),
            BackendKind::Anthropic => format!("{}/messages", self.base_url),
        }
    }

    fn parse_response(&self, body: &Value) -> Result<String, GenerationError> {
        let text = match self.kind {
            BackendKind::OpenAiCompatible => body["choices"][0]["message"]["content"].as_str(),
            BackendKind::Anthropic => body["content"][0]["text"].as_str(),
        };
        text.map(|t| t.trim().to_string())
            .ok_or_else(|| GenerationError::ResponseParse {
                message: format!("no text content in response: {}", body),
            })
    }

    async fn send_once(&self, body: &Value) -> Result<String, GenerationError> {
        let mut builder = self
            .client
            .post(self.endpoint())
            .header("content-type", "application/json")
            .timeout(self.timeout)
            .json(body);

        builder = match self.kind {
            BackendKind::OpenAiCompatible => {
                builder.header("Authorization", format!("Bearer {}", self.api_key))
            }
            BackendKind::Anthropic => builder
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION),
        };

        let response = builder.send().await.map_err(|e| {
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
        let body_text = response
            .text()
            .await
            .map_err(|e| GenerationError::Connection {
                message: format!("failed to read response body: {}", e),
            })?;

        if !status.is_success() {
            return Err(map_http_error(status, &body_text));
        }

        let json: Value =
            serde_json::from_str(&body_text).map_err(|e| GenerationError::ResponseParse {
                message: e.to_string(),
            })?;
        self.parse_response(&json)
    }
}

#[async_trait]
impl TextGenerator for HttpGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let body = self.build_body(request);
        debug!(model = %self.model, "Sending generation request");
        with_retry(&self.retry, || self.send_once(&body)).await
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Map an HTTP status code to the appropriate `GenerationError`.
fn map_http_error(status: reqwest::StatusCode, body_text: &str) -> GenerationError {
    match status.as_u16() {
        401 | 403 => GenerationError::AuthFailed {
            backend: "generation".to_string(),
        },
        429 => {
            let retry_after = serde_json::from_str::<Value>(body_text)
                .ok()
                .and_then(|v| v["error"]["retry_after_secs"].as_u64())
                .unwrap_or(30);
            GenerationError::RateLimited {
                retry_after_secs: retry_after,
            }
        }
        _ => GenerationError::ApiRequest {
            message: format!("HTTP {}: {}", status, body_text),
        },
    }
}

/// Execute an async operation with exponential backoff retry on transient errors.
///
/// Shared by every external call site (generation, vision, speech); the
/// error type's `Retryable` impl decides what counts as transient and
/// whether the server asked for a minimum delay. Permanent errors (auth,
/// parse, non-retryable API) return immediately.
pub async fn with_retry<F, Fut, T, E>(config: &RetryConfig, operation: F) -> Result<T, E>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + std::fmt::Display,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(val) => return Ok(val),
            Err(e) => {
                if !e.is_retryable() || attempt >= config.max_retries {
                    return Err(e);
                }
                let backoff_ms = compute_backoff(config, attempt, e.retry_after_secs());
                warn!(
                    attempt = attempt + 1,
                    max = config.max_retries,
                    backoff_ms = backoff_ms,
                    error = %e,
                    "Retrying after transient error"
                );
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                attempt += 1;
            }
        }
    }
}

/// Compute backoff delay, respecting server retry-after values.
fn compute_backoff(config: &RetryConfig, attempt: u32, retry_after_secs: Option<u64>) -> u64 {
    let exponential = compute_exponential_backoff(config, attempt);
    match retry_after_secs {
        Some(secs) => (secs * 1000).max(exponential),
        None => exponential,
    }
}

fn compute_exponential_backoff(config: &RetryConfig, attempt: u32) -> u64 {
    let base = config.initial_backoff_ms as f64 * config.backoff_multiplier.powi(attempt as i32);
    let capped = base.min(config.max_backoff_ms as f64) as u64;
    if config.jitter {
        // Up to 25% jitter
        let jitter = (capped as f64 * 0.25 * rand_simple()) as u64;
        capped + jitter
    } else {
        capped
    }
}

/// Cheap pseudo-random for jitter, avoids pulling in the rand crate.
fn rand_simple() -> f64 {
    use std::time::SystemTime;
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    (nanos % 1000) as f64 / 1000.0
}

/// A mock generator for tests: returns queued responses in order, or a
/// configured error on every call.
pub struct MockTextGenerator {
    model: String,
    responses: std::sync::Mutex<Vec<String>>,
    fail: bool,
    call_count: AtomicUsize,
}

impl MockTextGenerator {
    pub fn new() -> Self {
        Self {
            model: "mock-model".to_string(),
            responses: std::sync::Mutex::new(Vec::new()),
            fail: false,
            call_count: AtomicUsize::new(0),
        }
    }

    /// A mock that always returns the given text.
    pub fn with_response(text: &str) -> Self {
        let mock = Self::new();
        for _ in 0..20 {
            mock.queue_response(text);
        }
        mock
    }

    /// A mock whose every call fails with a connection error.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn queue_response(&self, text: &str) {
        self.responses.lock().unwrap().push(text.to_string());
    }

    /// Number of times `generate` was called.
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::Relaxed)
    }
}

impl Default for MockTextGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextGenerator for MockTextGenerator {
    async fn generate(&self, _request: &GenerationRequest) -> Result<String, GenerationError> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        if self.fail {
            return Err(GenerationError::Connection {
                message: "mock backend configured to fail".to_string(),
            });
        }
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok("Mock generation output.".to_string())
        } else {
            Ok(responses.remove(0))
        }
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
