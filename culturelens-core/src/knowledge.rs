//! Knowledge resolver: verified facts from the source store, with a
//! dynamic-generation fallback for objects the store does not cover.

use crate::generation::{GenerationRequest, TextGenerator};
use crate::store::SourceStore;
use crate::types::{FactSheet, Facts};
use std::sync::Arc;
use tracing::warn;

/// Resolves facts for an object identifier.
///
/// Resolution order: source store, then one generation call when a backend
/// is configured and a detected name is available, then a minimal
/// error-flagged sheet. Generation failure is caught here and never
/// propagated.
pub struct KnowledgeResolver {
    store: Arc<SourceStore>,
    generator: Option<Arc<dyn TextGenerator>>,
}

impl KnowledgeResolver {
    pub fn new(store: Arc<SourceStore>, generator: Option<Arc<dyn TextGenerator>>) -> Self {
        Self { store, generator }
    }

    /// Retrieve facts for an identifier.
    ///
    /// Idempotent for store-backed identifiers; never invokes the generation
    /// backend when the store has a record.
    pub async fn get_facts(
        &self,
        object_id: &str,
        detected_name: Option<&str>,
        location: Option<&str>,
    ) -> FactSheet {
        if let Some(facts) = self.store.facts(object_id) {
            return FactSheet::from_store(facts.clone());
        }

        if let (Some(generator), Some(name)) = (&self.generator, detected_name) {
            match self.generate_facts(generator.as_ref(), name, location).await {
                Ok(sheet) => return sheet,
                Err(e) => {
                    warn!(
                        stage = "knowledge",
                        object_id = object_id,
                        detected_name = name,
                        error = %e,
                        "Dynamic fact generation failed"
                    );
                }
            }
        }

        FactSheet::unavailable(detected_name.unwrap_or(object_id), location)
    }

    async fn generate_facts(
        &self,
        generator: &dyn TextGenerator,
        name: &str,
        location: Option<&str>,
    ) -> Result<FactSheet, crate::error::GenerationError> {
        let request = GenerationRequest::new(facts_prompt(name, location))
            .with_system("You are a factual encyclopedia providing verified historical information.")
            .with_max_tokens(300)
            .with_temperature(0.1);

        let content = generator.generate(&request).await?;
        let mut facts = parse_facts(&content, name);
        facts.sources = vec![
            format!("Generated by {}", generator.model_name()),
            "Verification recommended".to_string(),
        ];

        Ok(FactSheet::generated(facts, generator.model_name()))
    }
}

/// The fixed-format prompt for dynamic fact generation.
fn facts_prompt(name: &str, location: Option<&str>) -> String {
    let location_line = location
        .map(|l| format!("Location: {}\n", l))
        .unwrap_or_default();
    format!(
        "Provide factual information about: {}\n{}\n\
         Respond in this exact format:\n\
         NAME: [Official name]\n\
         LOCATION: [City, Country]\n\
         BUILT: [Construction period]\n\
         BUILDER: [Who built it]\n\
         PURPOSE: [Original purpose]\n\
         STYLE: [Architectural/artistic style]\n\
         MATERIAL: [Primary materials]\n\
         UNESCO: [Yes/No]\n\n\
         Keep responses factual and concise.",
        name, location_line
    )
}

/// Parse the six-field structured response by prefix-matched line scanning.
///
/// Every unrecognized or missing field stays at its "Unknown" default;
/// UNESCO defaults to false.
fn parse_facts(content: &str, default_name: &str) -> Facts {
    let mut facts = Facts::unknown(default_name, None);

    for line in content.lines() {
        let line = line.trim();
        if let Some(value) = line.strip_prefix("NAME:") {
            facts.name = value.trim().to_string();
        } else if let Some(value) = line.strip_prefix("LOCATION:") {
            facts.location = value.trim().to_string();
        } else if let Some(value) = line.strip_prefix("BUILT:") {
            facts.built = value.trim().to_string();
        } else if let Some(value) = line.strip_prefix("BUILDER:") {
            facts.builder = value.trim().to_string();
        } else if let Some(value) = line.strip_prefix("PURPOSE:") {
            facts.purpose = value.trim().to_string();
        } else if let Some(value) = line.strip_prefix("STYLE:") {
            facts.style = value.trim().to_string();
        } else if let Some(value) = line.strip_prefix("MATERIAL:") {
            facts.material = value.trim().to_string();
        } else if let Some(value) = line.strip_prefix("UNESCO:") {
            let v = value.trim().to_lowercase();
            facts.unesco = v == "yes" || v == "true";
        }
    }

    facts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::MockTextGenerator;
    use pretty_assertions::assert_eq;

    fn store_with_taj() -> Arc<SourceStore> {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("landmarks.json"),
            r#"{"taj_mahal": {"name": "Taj Mahal", "location": "Agra, India",
                "built": "1632-1653", "builder": "Emperor Shah Jahan",
                "purpose": "mausoleum", "style": "Mughal architecture",
                "material": "white marble", "unesco": true}}"#,
        )
        .unwrap();
        Arc::new(SourceStore::load(dir.path()))
    }

    #[tokio::test]
    async fn test_store_hit_returns_facts_with_summary() {
        let resolver = KnowledgeResolver::new(store_with_taj(), None);
        let sheet = resolver.get_facts("taj_mahal", None, None).await;
        assert_eq!(sheet.facts.name, "Taj Mahal");
        assert!(sheet.summary.contains("Built between 1632-1653"));
        assert!(!sheet.is_error());
    }

    #[tokio::test]
    async fn test_store_hit_never_invokes_generator() {
        let mock = Arc::new(MockTextGenerator::with_response("should not be used"));
        let resolver = KnowledgeResolver::new(store_with_taj(), Some(mock.clone()));
        let _ = resolver.get_facts("taj_mahal", Some("Taj Mahal"), None).await;
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_store_hit_is_idempotent() {
        let resolver = KnowledgeResolver::new(store_with_taj(), None);
        let first = resolver.get_facts("taj_mahal", None, None).await;
        let second = resolver.get_facts("taj_mahal", None, None).await;
        assert_eq!(first.summary, second.summary);
        assert_eq!(first.facts.name, second.facts.name);
    }

    #[tokio::test]
    async fn test_miss_without_detected_name_is_error_flagged() {
        let resolver = KnowledgeResolver::new(Arc::new(SourceStore::empty()), None);
        let sheet = resolver.get_facts("atlantis", None, Some("the sea")).await;
        assert!(sheet.is_error());
        assert_eq!(sheet.facts.name, "atlantis");
        assert_eq!(sheet.facts.location, "the sea");
    }

    #[tokio::test]
    async fn test_miss_with_generator_produces_generated_sheet() {
        let mock = Arc::new(MockTextGenerator::with_response(
            "NAME: Eiffel Tower\nLOCATION: Paris, France\nBUILT: 1887-1889\n\
             BUILDER: Gustave Eiffel\nPURPOSE: exhibition tower\nSTYLE: wrought-iron lattice\n\
             MATERIAL: iron\nUNESCO: Yes",
        ));
        let resolver = KnowledgeResolver::new(Arc::new(SourceStore::empty()), Some(mock));
        let sheet = resolver
            .get_facts("eiffel_tower", Some("Eiffel Tower"), None)
            .await;

        assert!(!sheet.is_error());
        assert_eq!(sheet.facts.location, "Paris, France");
        assert!(sheet.facts.unesco);
        assert_eq!(sheet.generated_by.as_deref(), Some("mock-model"));
        assert!(sheet
            .facts
            .sources
            .iter()
            .any(|s| s == "Verification recommended"));
        assert!(sheet.summary.contains("Eiffel Tower is located in Paris, France."));
    }

    #[tokio::test]
    async fn test_generation_failure_degrades_to_error_sheet() {
        let mock = Arc::new(MockTextGenerator::failing());
        let resolver = KnowledgeResolver::new(Arc::new(SourceStore::empty()), Some(mock));
        let sheet = resolver
            .get_facts("mystery", Some("Mystery Spire"), None)
            .await;
        assert!(sheet.is_error());
        assert_eq!(sheet.facts.name, "Mystery Spire");
    }

    #[test]
    fn test_parse_facts_defaults_unrecognized_fields() {
        let facts = parse_facts("LOCATION: Rome, Italy\ngarbage line\nUNESCO: maybe", "Colosseum");
        assert_eq!(facts.name, "Colosseum");
        assert_eq!(facts.location, "Rome, Italy");
        assert_eq!(facts.built, "Unknown");
        assert_eq!(facts.builder, "Unknown");
        assert!(!facts.unesco);
    }

    #[test]
    fn test_parse_facts_full_response() {
        let content = "NAME: Great Wall of China\nLOCATION: Northern China\nBUILT: 7th century BC - 17th century AD\nBUILDER: Multiple dynasties\nPURPOSE: fortification\nSTYLE: defensive architecture\nMATERIAL: stone, brick, earth\nUNESCO: yes";
        let facts = parse_facts(content, "fallback");
        assert_eq!(facts.name, "Great Wall of China");
        assert_eq!(facts.material, "stone, brick, earth");
        assert!(facts.unesco);
    }

    #[test]
    fn test_facts_prompt_includes_location_when_present() {
        let prompt = facts_prompt("Petra", Some("Jordan"));
        assert!(prompt.contains("Location: Jordan"));
        assert!(prompt.contains("UNESCO: [Yes/No]"));
        let prompt = facts_prompt("Petra", None);
        assert!(!prompt.contains("Location:"));
    }
}
