//! The interpretation orchestrator.
//!
//! Sequences knowledge -> lens -> bias -> sentiment per request and
//! assembles the composite response. Stages run strictly in order, each
//! consuming the prior stage's output plus the original request; there is
//! no logic here beyond composition order. Concurrent requests share only
//! the immutable source store.

use crate::bias::BiasAnalyzer;
use crate::knowledge::KnowledgeResolver;
use crate::lens::LensInterpreter;
use crate::sentiment::SentimentAggregator;
use crate::store::SourceStore;
use crate::types::{BiasReport, FactSheet, Interpretation, SentimentSummary};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// An interpretation request as received from the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterpretRequest {
    pub object_id: String,
    #[serde(default = "default_lens")]
    pub cultural_lens: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_context: Option<UserContext>,
}

fn default_lens() -> String {
    "neutral".to_string()
}

/// Optional client-supplied context from a prior recognition step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserContext {
    #[serde(default)]
    pub detected_name: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

/// The composite response assembled from every stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositeResponse {
    pub object_id: String,
    pub facts: FactSheet,
    pub interpretation: Interpretation,
    pub bias_report: BiasReport,
    pub community_sentiment: SentimentSummary,
    pub available_lenses: Vec<String>,
}

/// The per-request interpretation pipeline.
pub struct InterpretPipeline {
    knowledge: KnowledgeResolver,
    interpreter: Arc<dyn LensInterpreter>,
    bias: BiasAnalyzer,
    sentiment: SentimentAggregator,
}

impl InterpretPipeline {
    pub fn new(
        store: Arc<SourceStore>,
        knowledge: KnowledgeResolver,
        interpreter: Arc<dyn LensInterpreter>,
    ) -> Self {
        Self {
            knowledge,
            interpreter,
            bias: BiasAnalyzer::new(store.clone()),
            sentiment: SentimentAggregator::new(store),
        }
    }

    /// Run the full pipeline for one request.
    ///
    /// Infallible by construction: every stage degrades locally, so the
    /// composite always assembles.
    pub async fn interpret(&self, request: &InterpretRequest) -> CompositeResponse {
        debug!(
            object_id = %request.object_id,
            lens = %request.cultural_lens,
            "Running interpretation pipeline"
        );

        let context = request.user_context.clone().unwrap_or_default();
        let facts = self
            .knowledge
            .get_facts(
                &request.object_id,
                context.detected_name.as_deref(),
                context.location.as_deref(),
            )
            .await;

        let interpretation = self
            .interpreter
            .interpret(&request.object_id, &request.cultural_lens, &facts)
            .await;

        let bias_report = self.bias.analyze(&request.object_id, &request.cultural_lens);
        let community_sentiment = self.sentiment.get_sentiment(&request.object_id);
        let available_lenses = self.interpreter.available_lenses(&request.object_id);

        CompositeResponse {
            object_id: request.object_id.clone(),
            facts,
            interpretation,
            bias_report,
            community_sentiment,
            available_lenses,
        }
    }

    pub fn knowledge(&self) -> &KnowledgeResolver {
        &self.knowledge
    }

    pub fn interpreter(&self) -> &Arc<dyn LensInterpreter> {
        &self.interpreter
    }

    pub fn sentiment(&self) -> &SentimentAggregator {
        &self.sentiment
    }
}
