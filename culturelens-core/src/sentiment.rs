//! Community sentiment aggregation.
//!
//! Serves precomputed sentiment from the source store, or an empty-state
//! placeholder. User reflections are acknowledged but not durably stored.

use crate::store::SourceStore;
use crate::types::{ReflectionAck, SentimentSummary};
use std::sync::Arc;

pub struct SentimentAggregator {
    store: Arc<SourceStore>,
}

impl SentimentAggregator {
    pub fn new(store: Arc<SourceStore>) -> Self {
        Self { store }
    }

    /// Aggregated community sentiment for an object.
    pub fn get_sentiment(&self, object_id: &str) -> SentimentSummary {
        match self.store.sentiment(object_id) {
            Some(record) => SentimentSummary {
                emotions: record.emotions.clone(),
                common_themes: record.themes.clone(),
                reflections_count: record.count,
                sample_quotes: record.quotes.clone(),
                message: None,
            },
            None => SentimentSummary::empty_state(),
        }
    }

    /// Acknowledge a user reflection.
    ///
    /// Persistence is a non-goal; the reflection is received and thanked,
    /// nothing more.
    pub fn add_reflection(&self, object_id: &str, _reflection: &str) -> ReflectionAck {
        ReflectionAck {
            status: "received".to_string(),
            message: "Thank you for sharing your perspective!".to_string(),
            reflection_id: format!("{}_{}", object_id, uuid::Uuid::new_v4()),
            received_at: chrono::Utc::now(),
        }
    }
}
