//! Fundamental data types shared across the interpretation pipeline.
//!
//! Store-owned records (`Facts`, `LensNarrative`, `BiasData`,
//! `SentimentRecord`) are loaded once at startup and never mutated.
//! Per-request entities (`FactSheet`, `Interpretation`, `BiasReport`,
//! `SentimentSummary`, `RecognitionResult`, `NarrationAudio`) are derived
//! purely from the store plus the current request and carry no state
//! across requests.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Verified facts for one heritage object, as stored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Facts {
    pub name: String,
    pub location: String,
    pub built: String,
    pub builder: String,
    pub purpose: String,
    pub style: String,
    pub material: String,
    #[serde(default)]
    pub unesco: bool,
    #[serde(default)]
    pub sources: Vec<String>,
}

impl Facts {
    /// Deterministic neutral summary derived from the fields.
    pub fn neutral_summary(&self) -> String {
        format!(
            "{} is located in {}. Built between {}, it was constructed by {} as a {}. \
             The structure exemplifies {} and is primarily made of {}.",
            self.name,
            self.location,
            self.built,
            self.builder,
            self.purpose,
            self.style,
            self.material
        )
    }

    /// A Facts record with every field set to the "Unknown" default.
    pub fn unknown(name: &str, location: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            location: location.unwrap_or("Unknown").to_string(),
            built: "Unknown".to_string(),
            builder: "Unknown".to_string(),
            purpose: "Unknown".to_string(),
            style: "Unknown".to_string(),
            material: "Unknown".to_string(),
            unesco: false,
            sources: Vec::new(),
        }
    }
}

/// Resolved facts for one identifier, with the derived neutral summary.
///
/// Built fresh per request, either from the source store or from dynamic
/// generation; immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactSheet {
    #[serde(flatten)]
    pub facts: Facts,
    pub summary: String,
    /// Model tag when the facts were dynamically generated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_by: Option<String>,
    /// Set when no facts could be resolved at all.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FactSheet {
    /// Build a fact sheet from stored facts, computing the neutral summary.
    pub fn from_store(facts: Facts) -> Self {
        let summary = facts.neutral_summary();
        Self {
            facts,
            summary,
            generated_by: None,
            error: None,
        }
    }

    /// Build a fact sheet from dynamically generated facts.
    pub fn generated(facts: Facts, model: &str) -> Self {
        let summary = facts.neutral_summary();
        Self {
            facts,
            summary,
            generated_by: Some(model.to_string()),
            error: None,
        }
    }

    /// The minimal error-flagged fact sheet returned when nothing resolved.
    ///
    /// Carries a fixed unavailable message instead of a template summary,
    /// so the neutral lens never serves a sentence stuffed with "Unknown"
    /// field values.
    pub fn unavailable(name: &str, location: Option<&str>) -> Self {
        Self {
            facts: Facts::unknown(name, location),
            summary: "No verified information is available for this landmark yet.".to_string(),
            generated_by: None,
            error: Some("No knowledge available for this landmark".to_string()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// A precomputed cultural narrative for one (identifier, lens) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LensNarrative {
    pub perspective: String,
    pub narrative: String,
    pub emotional_context: String,
}

/// A cultural interpretation produced for one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interpretation {
    pub perspective: String,
    pub narrative: String,
    pub emotional_context: String,
    /// Which backing strategy produced this, when dynamically generated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_by: Option<String>,
}

impl From<LensNarrative> for Interpretation {
    fn from(n: LensNarrative) -> Self {
        Self {
            perspective: n.perspective,
            narrative: n.narrative,
            emotional_context: n.emotional_context,
            generated_by: None,
        }
    }
}

/// Stored bias and source-attribution data for one object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BiasData {
    /// Source category -> probability; probabilities sum to ~1.0.
    pub source_dominance: BTreeMap<String, f64>,
    #[serde(default)]
    pub missing_perspectives: Vec<String>,
    #[serde(default)]
    pub power_imbalances: Vec<String>,
    #[serde(default)]
    pub representation_gaps: BTreeMap<String, String>,
}

/// The transparency report assembled by the bias analyzer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BiasReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_dominance: Option<BTreeMap<String, f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diversity_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_perspectives: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub power_imbalances: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub representation_gaps: BTreeMap<String, String>,
    pub transparency_note: String,
    pub recommendation: String,
}

/// Stored community sentiment for one object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentimentRecord {
    #[serde(default)]
    pub emotions: BTreeMap<String, f64>,
    #[serde(default)]
    pub themes: Vec<String>,
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub quotes: Vec<String>,
}

/// Aggregated community sentiment returned per request, or the empty-state
/// placeholder when no record exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentimentSummary {
    pub emotions: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub common_themes: Vec<String>,
    pub reflections_count: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sample_quotes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SentimentSummary {
    /// The placeholder returned when an object has no sentiment record.
    pub fn empty_state() -> Self {
        Self {
            emotions: BTreeMap::new(),
            common_themes: Vec::new(),
            reflections_count: 0,
            sample_quotes: Vec::new(),
            message: Some("Be the first to share your perspective on this landmark!".to_string()),
        }
    }
}

/// Where a recognition result was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecognitionSource {
    /// On-device classifier.
    Edge,
    /// Cloud vision backend.
    Cloud,
}

/// The outcome of running an image through the vision resolver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecognitionResult {
    /// Normalized object identifier, absent on low-confidence rejection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,
    /// Confidence score in [0, 1].
    pub confidence: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detected_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub processing: RecognitionSource,
}

impl RecognitionResult {
    /// A low-confidence rejection carrying whatever description was parsed.
    pub fn rejected(description: Option<String>) -> Self {
        Self {
            object_id: None,
            confidence: 0.0,
            detected_name: None,
            location: None,
            description,
            processing: RecognitionSource::Cloud,
        }
    }

    pub fn is_recognized(&self) -> bool {
        self.object_id.is_some()
    }
}

/// The result of the narration pipeline: audio bytes on success, plus the
/// text that was (attempted to be) synthesized either way.
#[derive(Debug, Clone)]
pub struct NarrationAudio {
    pub audio: Option<Vec<u8>>,
    pub text: String,
}

impl NarrationAudio {
    pub fn succeeded(&self) -> bool {
        self.audio.is_some()
    }
}

/// Acknowledgment for a user-submitted reflection (not durably stored).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReflectionAck {
    pub status: String,
    pub message: String,
    pub reflection_id: String,
    pub received_at: chrono::DateTime<chrono::Utc>,
}
