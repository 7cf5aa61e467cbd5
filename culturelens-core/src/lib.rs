//! # CultureLens Core
//!
//! Core library for the CultureLens heritage interpretation service.
//! Provides the source store, the external backend contracts (generation,
//! vision, speech), the resolution stages (knowledge, lens, bias, sentiment,
//! narration), and the pipeline that sequences them per request.

pub mod bias;
pub mod config;
pub mod error;
pub mod generation;
pub mod knowledge;
pub mod lens;
pub mod narration;
pub mod pipeline;
pub mod sentiment;
pub mod store;
pub mod types;
pub mod vision;

// Re-export commonly used types at the crate root.
pub use bias::BiasAnalyzer;
pub use config::{AppConfig, GenerationConfig, RetryConfig, SpeechConfig};
pub use error::{CultureLensError, GenerationError, Result, SpeechError};
pub use generation::{HttpGenerator, MockTextGenerator, TextGenerator};
pub use knowledge::KnowledgeResolver;
pub use lens::{GenerativeLensInterpreter, LensInterpreter, StaticLensInterpreter};
pub use narration::{NarrationPipeline, SpeechBackend};
pub use pipeline::{CompositeResponse, InterpretPipeline, InterpretRequest};
pub use sentiment::SentimentAggregator;
pub use store::SourceStore;
pub use types::{
    BiasReport, FactSheet, Facts, Interpretation, NarrationAudio, RecognitionResult,
    SentimentSummary,
};
pub use vision::{VisionBackend, VisionResolver};
