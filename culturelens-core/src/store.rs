//! The source store: immutable, preloaded heritage data.
//!
//! Loaded once at startup from a directory of JSON files and shared via
//! `Arc` across request handlers. A missing or malformed file degrades to
//! an empty mapping with a warning; the service keeps running with reduced
//! data rather than refusing to start.

use crate::error::StoreError;
use crate::types::{BiasData, Facts, LensNarrative, SentimentRecord};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

/// Read-only mapping from object identifier to structured heritage records.
#[derive(Debug, Default)]
pub struct SourceStore {
    landmarks: BTreeMap<String, Facts>,
    narratives: BTreeMap<String, BTreeMap<String, LensNarrative>>,
    bias: BTreeMap<String, BiasData>,
    sentiment: BTreeMap<String, SentimentRecord>,
}

impl SourceStore {
    /// Load the store from a data directory.
    ///
    /// Each file is loaded independently; a failure in one leaves the
    /// others intact.
    pub fn load(data_dir: &Path) -> Self {
        let landmarks = load_mapping(&data_dir.join("landmarks.json"));
        let narratives = load_mapping(&data_dir.join("narratives.json"));
        let bias = load_mapping(&data_dir.join("bias.json"));
        let sentiment = load_mapping(&data_dir.join("community_sentiment.json"));

        info!(
            landmarks = landmarks.len(),
            narratives = narratives.len(),
            bias = bias.len(),
            sentiment = sentiment.len(),
            "Source store loaded"
        );

        Self {
            landmarks,
            narratives,
            bias,
            sentiment,
        }
    }

    /// An empty store, for tests and degraded startup.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn facts(&self, object_id: &str) -> Option<&Facts> {
        self.landmarks.get(object_id)
    }

    pub fn narrative(&self, object_id: &str, lens: &str) -> Option<&LensNarrative> {
        self.narratives.get(object_id)?.get(lens)
    }

    /// Lens keys with precomputed content for this object.
    pub fn lenses_with_content(&self, object_id: &str) -> Vec<String> {
        self.narratives
            .get(object_id)
            .map(|lenses| lenses.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn bias(&self, object_id: &str) -> Option<&BiasData> {
        self.bias.get(object_id)
    }

    pub fn sentiment(&self, object_id: &str) -> Option<&SentimentRecord> {
        self.sentiment.get(object_id)
    }

    pub fn landmark_count(&self) -> usize {
        self.landmarks.len()
    }
}

/// Load one JSON mapping file, degrading to an empty map on any failure.
fn load_mapping<T: DeserializeOwned>(path: &Path) -> BTreeMap<String, T> {
    match try_load_mapping(path) {
        Ok(map) => map,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Store file unavailable, using empty mapping");
            BTreeMap::new()
        }
    }
}

fn try_load_mapping<T: DeserializeOwned>(path: &Path) -> Result<BTreeMap<String, T>, StoreError> {
    let raw = std::fs::read_to_string(path).map_err(|_| StoreError::FileNotFound {
        path: path.to_path_buf(),
    })?;
    serde_json::from_str(&raw).map_err(|e| StoreError::Malformed {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_file(dir: &Path, name: &str, content: &str) {
        fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn test_load_missing_directory_degrades_to_empty() {
        let store = SourceStore::load(Path::new("/nonexistent/data"));
        assert_eq!(store.landmark_count(), 0);
        assert!(store.facts("taj_mahal").is_none());
    }

    #[test]
    fn test_load_malformed_file_degrades_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "landmarks.json", "{ not valid json");
        let store = SourceStore::load(dir.path());
        assert_eq!(store.landmark_count(), 0);
    }

    #[test]
    fn test_load_partial_data_keeps_valid_files() {
        let dir = tempfile::tempdir().unwrap();
        write_file(
            dir.path(),
            "landmarks.json",
            r#"{"taj_mahal": {"name": "Taj Mahal", "location": "Agra, India",
                "built": "1632-1653", "builder": "Shah Jahan", "purpose": "mausoleum",
                "style": "Mughal", "material": "marble", "unesco": true}}"#,
        );
        write_file(dir.path(), "bias.json", "broken");

        let store = SourceStore::load(dir.path());
        assert_eq!(store.landmark_count(), 1);
        assert_eq!(store.facts("taj_mahal").unwrap().name, "Taj Mahal");
        assert!(store.bias("taj_mahal").is_none());
    }

    #[test]
    fn test_narrative_lookup_and_lens_listing() {
        let dir = tempfile::tempdir().unwrap();
        write_file(
            dir.path(),
            "narratives.json",
            r#"{"colosseum": {
                "local": {"perspective": "Roman/Italian Community",
                          "narrative": "A symbol of the city's ancient grandeur.",
                          "emotional_context": "Pride, historical weight"},
                "european": {"perspective": "European Classical Heritage",
                             "narrative": "Foundational to Western architectural tradition.",
                             "emotional_context": "Cultural foundation"}}}"#,
        );

        let store = SourceStore::load(dir.path());
        let narrative = store.narrative("colosseum", "local").unwrap();
        assert_eq!(narrative.perspective, "Roman/Italian Community");
        assert!(store.narrative("colosseum", "indigenous").is_none());

        let lenses = store.lenses_with_content("colosseum");
        assert_eq!(lenses, vec!["european".to_string(), "local".to_string()]);
        assert!(store.lenses_with_content("unknown_site").is_empty());
    }
}
