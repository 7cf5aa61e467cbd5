//! The two-stage audio narration pipeline: translate, then synthesize.
//!
//! Stage 1 runs the text through the generation backend when the target
//! language differs from the base language, falling back to the original
//! text on failure. Stage 2 maps the language to a voice profile and invokes
//! speech synthesis. Every supported language maps to the one shared
//! multilingual voice; this is the intended single-voice design, not a gap.

use crate::config::{RetryConfig, SpeechConfig};
use crate::error::SpeechError;
use crate::generation::{with_retry, GenerationRequest, TextGenerator};
use crate::types::{FactSheet, Interpretation, NarrationAudio};
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// The base language narration text is composed in.
pub const BASE_LANGUAGE: &str = "en";

/// The shared multilingual voice profile.
const MULTILINGUAL_VOICE_ID: &str = "EXAVITQu4vr4xnSDxMaL";

/// Supported narration languages: (lowercase name, ISO code).
pub const SUPPORTED_LANGUAGES: [(&str, &str); 10] = [
    ("english", "en"),
    ("spanish", "es"),
    ("hindi", "hi"),
    ("italian", "it"),
    ("french", "fr"),
    ("german", "de"),
    ("portuguese", "pt"),
    ("chinese", "zh"),
    ("japanese", "ja"),
    ("arabic", "ar"),
];

/// Resolve a language name or code to its ISO code, defaulting to the base
/// language when unrecognized.
pub fn language_code(language: &str) -> &'static str {
    let needle = language.to_lowercase();
    SUPPORTED_LANGUAGES
        .iter()
        .find(|(name, code)| *name == needle || *code == needle)
        .map(|(_, code)| *code)
        .unwrap_or(BASE_LANGUAGE)
}

/// Display name for an ISO code.
fn language_name(code: &str) -> &str {
    match code {
        "en" => "English",
        "es" => "Spanish",
        "hi" => "Hindi",
        "it" => "Italian",
        "fr" => "French",
        "de" => "German",
        "pt" => "Portuguese",
        "zh" => "Chinese",
        "ja" => "Japanese",
        "ar" => "Arabic",
        other => other,
    }
}

/// Language to voice-profile mapping. One multilingual voice covers the
/// whole table today.
fn voice_for_language(_code: &str) -> &'static str {
    MULTILINGUAL_VOICE_ID
}

/// Contract for the speech synthesis backend.
#[async_trait]
pub trait SpeechBackend: Send + Sync {
    /// Synthesize `text` with the given voice profile, returning raw audio
    /// bytes (MP3).
    async fn synthesize(&self, text: &str, voice_id: &str) -> Result<Vec<u8>, SpeechError>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

/// ElevenLabs speech backend.
pub struct ElevenLabsBackend {
    client: Client,
    base_url: String,
    api_key: String,
    model_id: String,
    timeout: Duration,
    retry: RetryConfig,
}

impl ElevenLabsBackend {
    /// Create a speech backend from configuration.
    ///
    /// Returns `SpeechError::AuthFailed` when the key env var is unset, so
    /// the caller can disable narration and continue.
    pub fn from_config(config: &SpeechConfig) -> Result<Self, SpeechError> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| SpeechError::AuthFailed {
            backend: format!("elevenlabs (env var '{}' not set)", config.api_key_env),
        })?;
        Ok(Self {
            client: Client::new(),
            base_url: config.base_url.clone(),
            api_key,
            model_id: config.model_id.clone(),
            timeout: Duration::from_secs(config.request_timeout_secs),
            retry: config.retry.clone(),
        })
    }

    async fn send_once(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<Vec<u8>, SpeechError> {
        let response = self
            .client
            .post(url)
            .header("Accept", "audio/mpeg")
            .header("Content-Type", "application/json")
            .header("xi-api-key", &self.api_key)
            .timeout(self.timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| SpeechError::Connection {
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SpeechError::SynthesisFailed {
                status: status.as_u16(),
                message,
            });
        }

        let bytes = response.bytes().await.map_err(|e| SpeechError::Connection {
            message: format!("failed to read audio body: {}", e),
        })?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl SpeechBackend for ElevenLabsBackend {
    async fn synthesize(&self, text: &str, voice_id: &str) -> Result<Vec<u8>, SpeechError> {
        let url = format!("{}/text-to-speech/{}", self.base_url, voice_id);
        let body = serde_json::json!({
            "text": text,
            "model_id": self.model_id,
            "voice_settings": {
                "stability": 0.5,
                "similarity_boost": 0.75,
                "style": 0.0,
                "use_speaker_boost": true
            }
        });

        with_retry(&self.retry, || self.send_once(&url, &body)).await
    }

    fn name(&self) -> &str {
        "elevenlabs"
    }
}

/// Composes narration text, translates it, and synthesizes audio.
pub struct NarrationPipeline {
    translator: Option<Arc<dyn TextGenerator>>,
    speech: Arc<dyn SpeechBackend>,
}

impl NarrationPipeline {
    pub fn new(translator: Option<Arc<dyn TextGenerator>>, speech: Arc<dyn SpeechBackend>) -> Self {
        Self { translator, speech }
    }

    /// List of supported language names for the catalog endpoint.
    pub fn available_languages(&self) -> Vec<String> {
        SUPPORTED_LANGUAGES
            .iter()
            .map(|(name, _)| name.to_string())
            .collect()
    }

    /// Narration text: facts-derived opening plus the interpretation's
    /// narrative when available.
    pub fn compose_narration(
        &self,
        facts: &FactSheet,
        interpretation: Option<&Interpretation>,
    ) -> String {
        let mut narration = format!(
            "{} is located in {}. It was built in {}. ",
            facts.facts.name, facts.facts.location, facts.facts.built
        );
        if let Some(interpretation) = interpretation {
            narration.push_str(&interpretation.narrative);
        }
        narration
    }

    /// Short introduction text for a landmark.
    pub fn intro_text(&self, name: &str, location: &str) -> String {
        format!(
            "This is the {}, located in {}. Would you like to hear more about it in a specific language?",
            name, location
        )
    }

    /// Translate `text` into the target language.
    ///
    /// Returns the original text when the target is the base language, no
    /// translator is configured, or the translation call fails (silent
    /// degradation, logged).
    async fn translate(&self, text: &str, target_code: &str) -> String {
        if target_code == BASE_LANGUAGE {
            return text.to_string();
        }
        let Some(translator) = &self.translator else {
            return text.to_string();
        };

        let target = language_name(target_code);
        let request = GenerationRequest::new(text)
            .with_system(format!(
                "You are a professional translator. Translate the following text to {}. \
                 Only return the translation, nothing else.",
                target
            ))
            .with_temperature(0.3);

        match translator.generate(&request).await {
            Ok(translated) => translated,
            Err(e) => {
                warn!(
                    stage = "narration",
                    target_language = target_code,
                    error = %e,
                    "Translation failed, synthesizing original text"
                );
                text.to_string()
            }
        }
    }

    /// Run the full translate-then-synthesize pipeline.
    ///
    /// The returned `NarrationAudio` always carries the text that was
    /// attempted; the audio is `None` when synthesis fails.
    pub async fn narrate(&self, text: &str, language: &str) -> NarrationAudio {
        let code = language_code(language);
        let text = self.translate(text, code).await;
        let voice_id = voice_for_language(code);

        match self.speech.synthesize(&text, voice_id).await {
            Ok(audio) => {
                info!(
                    backend = self.speech.name(),
                    language = code,
                    bytes = audio.len(),
                    "Narration audio generated"
                );
                NarrationAudio {
                    audio: Some(audio),
                    text,
                }
            }
            Err(e) => {
                warn!(
                    stage = "narration",
                    backend = self.speech.name(),
                    language = code,
                    error = %e,
                    "Speech synthesis failed"
                );
                NarrationAudio { audio: None, text }
            }
        }
    }
}

/// A mock speech backend for tests.
pub struct MockSpeechBackend {
    fail: bool,
}

impl MockSpeechBackend {
    pub fn new() -> Self {
        Self { fail: false }
    }

    pub fn failing() -> Self {
        Self { fail: true }
    }
}

impl Default for MockSpeechBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SpeechBackend for MockSpeechBackend {
    async fn synthesize(&self, text: &str, _voice_id: &str) -> Result<Vec<u8>, SpeechError> {
        if self.fail {
            return Err(SpeechError::SynthesisFailed {
                status: 500,
                message: "mock synthesis failure".to_string(),
            });
        }
        // Byte payload proportional to the input, enough for callers to
        // assert on.
        Ok(text.as_bytes().to_vec())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::MockTextGenerator;
    use crate::types::Facts;
    use pretty_assertions::assert_eq;

    fn taj_sheet() -> FactSheet {
        FactSheet::from_store(Facts {
            name: "Taj Mahal".into(),
            location: "Agra, India".into(),
            built: "1632-1653".into(),
            builder: "Emperor Shah Jahan".into(),
            purpose: "mausoleum".into(),
            style: "Mughal architecture".into(),
            material: "white marble".into(),
            unesco: true,
            sources: Vec::new(),
        })
    }

    fn tight_retry(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            initial_backoff_ms: 1,
            max_backoff_ms: 10,
            backoff_multiplier: 2.0,
            jitter: false,
        }
    }

    #[tokio::test]
    async fn test_transient_synthesis_error_retries_then_gives_up() {
        let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let c = calls.clone();
        let result: Result<Vec<u8>, SpeechError> = with_retry(&tight_retry(1), || {
            let c = c.clone();
            async move {
                c.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                Err(SpeechError::Connection {
                    message: "reset".into(),
                })
            }
        })
        .await;
        assert!(result.is_err());
        // One attempt plus one retry.
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_client_synthesis_error_is_not_retried() {
        let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let c = calls.clone();
        let result: Result<Vec<u8>, SpeechError> = with_retry(&tight_retry(3), || {
            let c = c.clone();
            async move {
                c.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                Err(SpeechError::SynthesisFailed {
                    status: 422,
                    message: "voice not found".into(),
                })
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn test_language_code_resolution() {
        assert_eq!(language_code("spanish"), "es");
        assert_eq!(language_code("Spanish"), "es");
        assert_eq!(language_code("hi"), "hi");
        assert_eq!(language_code("klingon"), "en");
    }

    #[test]
    fn test_every_language_maps_to_the_shared_voice() {
        for (_, code) in SUPPORTED_LANGUAGES {
            assert_eq!(voice_for_language(code), MULTILINGUAL_VOICE_ID);
        }
    }

    #[test]
    fn test_compose_narration_with_interpretation() {
        let pipeline =
            NarrationPipeline::new(None, Arc::new(MockSpeechBackend::new()));
        let interpretation = Interpretation {
            perspective: "Local Community Perspective".into(),
            narrative: "A living symbol of craftsmanship.".into(),
            emotional_context: "pride".into(),
            generated_by: None,
        };
        let text = pipeline.compose_narration(&taj_sheet(), Some(&interpretation));
        assert_eq!(
            text,
            "Taj Mahal is located in Agra, India. It was built in 1632-1653. \
             A living symbol of craftsmanship."
        );
    }

    #[test]
    fn test_compose_narration_without_interpretation() {
        let pipeline =
            NarrationPipeline::new(None, Arc::new(MockSpeechBackend::new()));
        let text = pipeline.compose_narration(&taj_sheet(), None);
        assert!(text.ends_with("It was built in 1632-1653. "));
    }

    #[tokio::test]
    async fn test_narrate_base_language_skips_translation() {
        let translator = Arc::new(MockTextGenerator::with_response("TRANSLATED"));
        let pipeline = NarrationPipeline::new(
            Some(translator.clone()),
            Arc::new(MockSpeechBackend::new()),
        );
        let result = pipeline.narrate("Hello there", "english").await;
        assert!(result.succeeded());
        assert_eq!(result.text, "Hello there");
        assert_eq!(translator.call_count(), 0);
    }

    #[tokio::test]
    async fn test_narrate_translates_for_other_languages() {
        let translator = Arc::new(MockTextGenerator::with_response("Hola"));
        let pipeline = NarrationPipeline::new(
            Some(translator.clone()),
            Arc::new(MockSpeechBackend::new()),
        );
        let result = pipeline.narrate("Hello", "spanish").await;
        assert!(result.succeeded());
        assert_eq!(result.text, "Hola");
        assert_eq!(result.audio.unwrap(), b"Hola");
        assert_eq!(translator.call_count(), 1);
    }

    #[tokio::test]
    async fn test_translation_failure_still_synthesizes_original() {
        let pipeline = NarrationPipeline::new(
            Some(Arc::new(MockTextGenerator::failing())),
            Arc::new(MockSpeechBackend::new()),
        );
        let result = pipeline.narrate("Hello", "french").await;
        // Translation degraded silently; synthesis still ran on the
        // original text.
        assert!(result.succeeded());
        assert_eq!(result.text, "Hello");
    }

    #[tokio::test]
    async fn test_synthesis_failure_returns_text_without_audio() {
        let pipeline =
            NarrationPipeline::new(None, Arc::new(MockSpeechBackend::failing()));
        let result = pipeline.narrate("Hello", "english").await;
        assert!(!result.succeeded());
        assert_eq!(result.text, "Hello");
    }

    #[test]
    fn test_available_languages() {
        let pipeline =
            NarrationPipeline::new(None, Arc::new(MockSpeechBackend::new()));
        let languages = pipeline.available_languages();
        assert_eq!(languages.len(), 10);
        assert!(languages.contains(&"hindi".to_string()));
    }

    #[test]
    fn test_intro_text() {
        let pipeline =
            NarrationPipeline::new(None, Arc::new(MockSpeechBackend::new()));
        let text = pipeline.intro_text("Taj Mahal", "Agra, India");
        assert!(text.starts_with("This is the Taj Mahal, located in Agra, India."));
    }
}
