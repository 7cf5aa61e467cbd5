//! Error types for the CultureLens core.
//!
//! Uses `thiserror` for public API error types with structured variants
//! covering the generation, speech, store, and configuration domains.
//!
//! Backend failures are caught at stage boundaries and converted to
//! stage-local degraded results; these types exist for the backend
//! contracts themselves and for startup-time configuration checks.

use std::path::PathBuf;

/// Top-level error type for the CultureLens core library.
#[derive(Debug, thiserror::Error)]
pub enum CultureLensError {
    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("Speech error: {0}")]
    Speech(#[from] SpeechError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors from text-generation backend interactions (used by the knowledge
/// resolver, the generative lens interpreter, the translator, and the
/// vision resolver's cloud call).
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("API request failed: {message}")]
    ApiRequest { message: String },

    #[error("API response parse error: {message}")]
    ResponseParse { message: String },

    #[error("Authentication failed for backend {backend}")]
    AuthFailed { backend: String },

    #[error("Rate limited by backend, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Backend connection failed: {message}")]
    Connection { message: String },
}

/// Errors from the speech synthesis backend.
#[derive(Debug, thiserror::Error)]
pub enum SpeechError {
    #[error("Synthesis failed with status {status}: {message}")]
    SynthesisFailed { status: u16, message: String },

    #[error("Authentication failed for speech backend {backend}")]
    AuthFailed { backend: String },

    #[error("Speech backend connection failed: {message}")]
    Connection { message: String },
}

/// Errors from the source store loader.
///
/// The loader itself degrades to empty mappings rather than surfacing these
/// to callers; they are logged for diagnosis.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Malformed store file {path}: {message}")]
    Malformed { path: PathBuf, message: String },
}

/// Errors from the configuration system.
///
/// A missing credential is fatal at startup for the component that needs it,
/// not for the process (fail soft at the system level).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Environment variable not set: {var} (required by {component})")]
    MissingCredential { var: String, component: String },

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Configuration parse error: {message}")]
    ParseError { message: String },
}

/// A type alias for results using the top-level `CultureLensError`.
pub type Result<T> = std::result::Result<T, CultureLensError>;

/// Classifies backend errors for the shared retry policy.
///
/// Every external call site (generation, vision, speech) retries through
/// the same helper; this trait tells it which failures are transient and
/// whether the server asked for a minimum delay.
pub trait Retryable {
    fn is_retryable(&self) -> bool;

    /// Server-requested minimum delay in seconds, when the error carries one.
    fn retry_after_secs(&self) -> Option<u64> {
        None
    }
}

impl Retryable for GenerationError {
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            GenerationError::RateLimited { .. }
                | GenerationError::Connection { .. }
                | GenerationError::Timeout { .. }
        )
    }

    fn retry_after_secs(&self) -> Option<u64> {
        match self {
            GenerationError::RateLimited { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        }
    }
}

impl Retryable for SpeechError {
    fn is_retryable(&self) -> bool {
        match self {
            SpeechError::Connection { .. } => true,
            SpeechError::SynthesisFailed { status, .. } => *status == 429 || *status >= 500,
            SpeechError::AuthFailed { .. } => false,
        }
    }
}
