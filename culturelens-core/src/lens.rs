//! Cultural lens interpretation.
//!
//! One `LensInterpreter` contract with two implementations selected at
//! startup: static store lookup, or dynamic generation through a text
//! backend. Both treat the neutral lens identically, returning the fact
//! sheet's summary verbatim.

use crate::generation::{GenerationRequest, TextGenerator};
use crate::store::SourceStore;
use crate::types::{FactSheet, Interpretation};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

/// The five lenses the generative interpreter knows how to prompt for.
pub const KNOWN_LENSES: [&str; 5] = ["local", "asian", "european", "indigenous", "neutral"];

/// Contract shared by both interpreter variants.
#[async_trait]
pub trait LensInterpreter: Send + Sync {
    /// Produce a cultural narrative for an (identifier, lens) pair.
    ///
    /// Never fails structurally: missing content and backend errors both
    /// yield a well-formed `Interpretation` describing the condition.
    async fn interpret(&self, object_id: &str, lens: &str, facts: &FactSheet) -> Interpretation;

    /// Lens keys this interpreter can serve for the given object.
    fn available_lenses(&self, object_id: &str) -> Vec<String>;
}

/// Display label for a lens.
fn perspective_name(lens: &str) -> String {
    match lens {
        "local" => "Local Community Perspective".to_string(),
        "asian" => "Asian Cultural Context".to_string(),
        "european" => "European Perspective".to_string(),
        "indigenous" => "Indigenous Perspective".to_string(),
        "neutral" => "Academic/Neutral".to_string(),
        other => format!("{} Perspective", title_case(other)),
    }
}

fn title_case(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// The neutral-lens interpretation both variants share.
fn neutral_interpretation(facts: &FactSheet) -> Interpretation {
    Interpretation {
        perspective: "Academic/Neutral".to_string(),
        narrative: facts.summary.clone(),
        emotional_context: "Objective analysis".to_string(),
        generated_by: None,
    }
}

/// Static variant: precomputed narratives from the source store.
pub struct StaticLensInterpreter {
    store: Arc<SourceStore>,
}

impl StaticLensInterpreter {
    pub fn new(store: Arc<SourceStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl LensInterpreter for StaticLensInterpreter {
    async fn interpret(&self, object_id: &str, lens: &str, facts: &FactSheet) -> Interpretation {
        if lens == "neutral" {
            return neutral_interpretation(facts);
        }

        match self.store.narrative(object_id, lens) {
            Some(narrative) => narrative.clone().into(),
            None => Interpretation {
                perspective: perspective_name(lens),
                narrative: "Interpretation not yet available for this cultural lens.".to_string(),
                emotional_context: "Pending community input".to_string(),
                generated_by: None,
            },
        }
    }

    fn available_lenses(&self, object_id: &str) -> Vec<String> {
        let lenses = self.store.lenses_with_content(object_id);
        if lenses.is_empty() {
            vec!["neutral".to_string()]
        } else {
            lenses
        }
    }
}

/// Dynamic variant: narratives generated per request through a text backend.
pub struct GenerativeLensInterpreter {
    generator: Arc<dyn TextGenerator>,
}

impl GenerativeLensInterpreter {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    fn build_prompt(&self, lens: &str, facts: &FactSheet) -> String {
        let instruction = lens_instruction(lens);
        // Compact prompt: a handful of fact fields plus the lens focus.
        format!(
            "Heritage site: {}\nLocation: {}\nBuilt: {}\nContext: {}\n\n\
             Lens: {}\nFocus: {}\n\n\
             Write 3-4 sentences providing meaningful cultural context beyond basic facts. \
             Be respectful, avoid stereotypes, acknowledge emotional significance.",
            facts.facts.name,
            facts.facts.location,
            facts.facts.built,
            facts.facts.purpose,
            lens.to_uppercase(),
            instruction
        )
    }
}

#[async_trait]
impl LensInterpreter for GenerativeLensInterpreter {
    async fn interpret(&self, object_id: &str, lens: &str, facts: &FactSheet) -> Interpretation {
        if lens == "neutral" {
            return neutral_interpretation(facts);
        }

        let request = GenerationRequest::new(self.build_prompt(lens, facts)).with_system(
            "You are a culturally-aware heritage guide providing respectful, \
             nuanced interpretations from diverse perspectives.",
        );

        match self.generator.generate(&request).await {
            Ok(narrative) => Interpretation {
                perspective: perspective_name(lens),
                emotional_context: extract_emotional_context(&narrative),
                narrative,
                generated_by: Some(self.generator.model_name().to_string()),
            },
            Err(e) => {
                warn!(
                    stage = "lens",
                    object_id = object_id,
                    lens = lens,
                    error = %e,
                    "Interpretation generation failed"
                );
                Interpretation {
                    perspective: perspective_name(lens),
                    narrative: format!("Error generating interpretation: {}", e),
                    emotional_context: "Error".to_string(),
                    generated_by: Some(format!("{}/error", self.generator.model_name())),
                }
            }
        }
    }

    fn available_lenses(&self, _object_id: &str) -> Vec<String> {
        KNOWN_LENSES.iter().map(|l| l.to_string()).collect()
    }
}

/// Per-lens focus instruction for the generative prompt.
fn lens_instruction(lens: &str) -> &'static str {
    match lens {
        "local" => {
            "Local community: national identity, lived experiences, contemporary relevance, \
             how locals relate to this heritage today."
        }
        "asian" => {
            "Asian perspective: regional context, historical connections across Asia, \
             aesthetic traditions, shared heritage."
        }
        "european" => {
            "European view: architectural analysis, historical parallels, how European \
             scholars interpret this site."
        }
        "indigenous" => {
            "Indigenous lens: pre-colonial perspectives, displaced communities, land history, \
             overlooked narratives."
        }
        _ => "Academic/neutral: verified historical facts without cultural bias.",
    }
}

/// Derive an emotional-context tag by keyword scan over the narrative.
///
/// All matched categories are reported comma-joined; "Cultural reflection"
/// when none match.
fn extract_emotional_context(narrative: &str) -> String {
    const EMOTION_KEYWORDS: [(&str, [&str; 4]); 5] = [
        ("pride", ["pride", "proud", "achievement", "glory"]),
        ("reverence", ["sacred", "reverence", "respect", "honor"]),
        ("complexity", ["complex", "nuanced", "contested", "layered"]),
        ("loss", ["loss", "displaced", "erased", "forgotten"]),
        ("wonder", ["wonder", "marvel", "magnificent", "awe"]),
    ];

    let lower = narrative.to_lowercase();
    let detected: Vec<&str> = EMOTION_KEYWORDS
        .iter()
        .filter(|(_, keywords)| keywords.iter().any(|kw| lower.contains(kw)))
        .map(|(emotion, _)| *emotion)
        .collect();

    if detected.is_empty() {
        "Cultural reflection".to_string()
    } else {
        detected.join(", ")
    }
}
