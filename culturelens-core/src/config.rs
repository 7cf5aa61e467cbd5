//! Configuration for the CultureLens service.
//!
//! Uses `figment` for layered configuration: defaults -> config file -> environment.
//! Credentials are never stored in the config file; each backend names the
//! environment variable holding its key, and a missing key disables that
//! backend only (fail soft at the system level).

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub generation: GenerationConfig,
    pub vision: VisionConfig,
    pub speech: SpeechConfig,
    pub interpreter: InterpreterConfig,
    pub store: StoreConfig,
    pub server: ServerConfig,
}

/// Text-generation backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Backend kind: "openai", "anthropic", or "local" (OpenAI-compatible).
    pub backend: String,
    /// Model identifier (e.g., "gpt-4o-mini", "claude-3-5-sonnet-20241022").
    pub model: String,
    /// Environment variable name containing the API key.
    pub api_key_env: String,
    /// Optional base URL override (Ollama, LM Studio, proxies).
    pub base_url: Option<String>,
    /// Maximum tokens to generate in a response.
    pub max_tokens: usize,
    /// Default temperature for generation.
    pub temperature: f32,
    /// Per-call timeout in seconds.
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            backend: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            base_url: None,
            max_tokens: 400,
            temperature: 0.7,
            request_timeout_secs: 30,
            retry: RetryConfig::default(),
        }
    }
}

/// Retry policy for external backend calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum retries after the first attempt.
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_multiplier: f64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        // Single retry with backoff: enough to absorb transient faults
        // without holding a user request hostage.
        Self {
            max_retries: 1,
            initial_backoff_ms: 500,
            max_backoff_ms: 4_000,
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

/// Cloud vision backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisionConfig {
    /// Vision-capable model identifier.
    pub model: String,
    /// Environment variable name containing the API key.
    pub api_key_env: String,
    pub base_url: Option<String>,
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            base_url: None,
            request_timeout_secs: 30,
            retry: RetryConfig::default(),
        }
    }
}

/// Speech synthesis backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechConfig {
    /// Environment variable name containing the API key.
    pub api_key_env: String,
    pub base_url: String,
    /// Synthesis model tag; the multilingual model covers every supported
    /// language with one voice.
    pub model_id: String,
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            api_key_env: "ELEVENLABS_API_KEY".to_string(),
            base_url: "https://api.elevenlabs.io/v1".to_string(),
            model_id: "eleven_multilingual_v2".to_string(),
            request_timeout_secs: 60,
            retry: RetryConfig::default(),
        }
    }
}

/// Lens interpreter selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterpreterConfig {
    /// "static" (store lookup) or "generative" (backend-driven).
    pub mode: String,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            mode: "static".to_string(),
        }
    }
}

/// Source store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory containing the JSON store files.
    pub data_dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
        }
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

impl AppConfig {
    /// Validate the configuration and return any warnings.
    ///
    /// Returns human-readable warning messages for problematic values;
    /// never errors, to stay backward compatible with older config files.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.generation.temperature < 0.0 || self.generation.temperature > 2.0 {
            warnings.push(format!(
                "generation.temperature ({}) is outside the typical range 0.0-2.0",
                self.generation.temperature
            ));
        }
        if self.generation.request_timeout_secs == 0 {
            warnings.push("generation.request_timeout_secs is 0; calls will fail immediately".to_string());
        }
        match self.interpreter.mode.as_str() {
            "static" | "generative" => {}
            other => warnings.push(format!(
                "interpreter.mode '{}' is not recognized; expected 'static' or 'generative'",
                other
            )),
        }
        warnings
    }
}

/// Load the configuration with layered precedence:
/// built-in defaults, then an optional TOML file, then `CULTURELENS_`-prefixed
/// environment variables (nested fields separated by `__`).
pub fn load_config(config_file: Option<&Path>) -> Result<AppConfig, Box<figment::Error>> {
    let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));

    if let Some(path) = config_file {
        figment = figment.merge(Toml::file(path));
    } else {
        let default_path = Path::new("culturelens.toml");
        if default_path.exists() {
            figment = figment.merge(Toml::file(default_path));
        }
    }

    figment = figment.merge(Env::prefixed("CULTURELENS_").split("__"));

    figment.extract().map_err(Box::new)
}
