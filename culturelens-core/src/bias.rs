//! Bias analyzer: entropy-based diversity scoring over a source-attribution
//! distribution, plus the assembled transparency report.

use crate::store::SourceStore;
use crate::types::{BiasData, BiasReport};
use std::collections::BTreeMap;
use std::sync::Arc;

const RECOMMENDATION: &str =
    "Consider exploring multiple cultural lenses for a fuller understanding";

/// Computes diversity scores and assembles transparency reports.
pub struct BiasAnalyzer {
    store: Arc<SourceStore>,
}

impl BiasAnalyzer {
    pub fn new(store: Arc<SourceStore>) -> Self {
        Self { store }
    }

    /// Analyze source bias for an object.
    ///
    /// The `lens` parameter shapes only downstream presentation today; the
    /// diversity computation is lens-independent by design.
    pub fn analyze(&self, object_id: &str, _lens: &str) -> BiasReport {
        let Some(bias) = self.store.bias(object_id) else {
            return BiasReport {
                source_dominance: None,
                diversity_score: None,
                missing_perspectives: Vec::new(),
                power_imbalances: Vec::new(),
                representation_gaps: BTreeMap::new(),
                transparency_note: "Bias analysis not yet available for this object".to_string(),
                recommendation: "Seek multiple sources and perspectives".to_string(),
            };
        };

        BiasReport {
            source_dominance: Some(bias.source_dominance.clone()),
            diversity_score: Some(diversity_score(&bias.source_dominance)),
            missing_perspectives: bias.missing_perspectives.clone(),
            power_imbalances: bias.power_imbalances.clone(),
            representation_gaps: bias.representation_gaps.clone(),
            transparency_note: transparency_note(bias),
            recommendation: RECOMMENDATION.to_string(),
        }
    }
}

/// Normalized Shannon entropy of a probability distribution, in [0, 1].
///
/// 0.0 for a single dominant source, 1.0 for a uniform distribution.
/// Rounded to two decimal places; 0.0 when there is at most one category.
pub fn diversity_score(distribution: &BTreeMap<String, f64>) -> f64 {
    let k = distribution.len();
    if k <= 1 {
        return 0.0;
    }

    let entropy: f64 = distribution
        .values()
        .map(|&p| if p > 0.0 { -p * p.ln() } else { 0.0 })
        .sum();
    let max_entropy = (k as f64).ln();

    (entropy / max_entropy * 100.0).round() / 100.0
}

/// Human-readable note identifying the dominant source category.
fn transparency_note(bias: &BiasData) -> String {
    let Some((category, probability)) = bias
        .source_dominance
        .iter()
        .max_by(|a, b| a.1.total_cmp(b.1))
    else {
        return "Bias analysis not yet available for this object".to_string();
    };

    format!(
        "Most available sources ({}%) come from {} perspectives. \
         This may not represent the full range of cultural interpretations. \
         Consider exploring multiple lenses for a more complete understanding.",
        (probability * 100.0).round() as i64,
        category.replace('_', " ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn distribution(entries: &[(&str, f64)]) -> BTreeMap<String, f64> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), *v))
            .collect()
    }

    fn store_with_bias() -> Arc<SourceStore> {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("bias.json"),
            r#"{"taj_mahal": {
                "source_dominance": {"colonial_era": 0.45, "indian_academic": 0.35,
                                     "local_oral": 0.10, "international": 0.10},
                "missing_perspectives": ["Artisan families and their economic conditions"],
                "power_imbalances": ["Most English-language sources reflect colonial-era interpretations"],
                "representation_gaps": {"workers": "Minimal documentation of artisan perspectives"}}}"#,
        )
        .unwrap();
        Arc::new(SourceStore::load(dir.path()))
    }

    #[test]
    fn test_uniform_distribution_scores_one() {
        let dist = distribution(&[("a", 0.25), ("b", 0.25), ("c", 0.25), ("d", 0.25)]);
        assert_eq!(diversity_score(&dist), 1.0);
    }

    #[test]
    fn test_degenerate_distribution_scores_zero() {
        let dist = distribution(&[("a", 1.0), ("b", 0.0), ("c", 0.0)]);
        assert_eq!(diversity_score(&dist), 0.0);
    }

    #[test]
    fn test_single_category_scores_zero() {
        let dist = distribution(&[("only", 1.0)]);
        assert_eq!(diversity_score(&dist), 0.0);
        assert_eq!(diversity_score(&BTreeMap::new()), 0.0);
    }

    #[test]
    fn test_score_invariant_under_permutation() {
        let a = distribution(&[("x", 0.5), ("y", 0.3), ("z", 0.2)]);
        let b = distribution(&[("z", 0.5), ("x", 0.3), ("y", 0.2)]);
        // Same probability multiset over renamed categories.
        assert_eq!(diversity_score(&a), diversity_score(&b));
    }

    #[test]
    fn test_score_for_skewed_distribution_between_zero_and_one() {
        let dist = distribution(&[("dominant", 0.9), ("minor", 0.1)]);
        let score = diversity_score(&dist);
        assert!(score > 0.0 && score < 1.0, "score was {}", score);
        // -0.9 ln 0.9 - 0.1 ln 0.1 over ln 2, rounded.
        assert_eq!(score, 0.47);
    }

    #[test]
    fn test_analyze_with_record() {
        let analyzer = BiasAnalyzer::new(store_with_bias());
        let report = analyzer.analyze("taj_mahal", "local");

        let score = report.diversity_score.unwrap();
        assert!((0.0..=1.0).contains(&score));
        assert_eq!(
            report.transparency_note,
            "Most available sources (45%) come from colonial era perspectives. \
             This may not represent the full range of cultural interpretations. \
             Consider exploring multiple lenses for a more complete understanding."
        );
        assert_eq!(report.missing_perspectives.len(), 1);
        assert!(report.recommendation.contains("multiple cultural lenses"));
    }

    #[test]
    fn test_analyze_lens_does_not_change_score() {
        let analyzer = BiasAnalyzer::new(store_with_bias());
        let local = analyzer.analyze("taj_mahal", "local");
        let european = analyzer.analyze("taj_mahal", "european");
        assert_eq!(local.diversity_score, european.diversity_score);
        assert_eq!(local.transparency_note, european.transparency_note);
    }

    #[test]
    fn test_analyze_without_record_is_degenerate() {
        let analyzer = BiasAnalyzer::new(Arc::new(SourceStore::empty()));
        let report = analyzer.analyze("unknown", "neutral");
        assert!(report.source_dominance.is_none());
        assert!(report.diversity_score.is_none());
        assert_eq!(
            report.transparency_note,
            "Bias analysis not yet available for this object"
        );
        assert_eq!(report.recommendation, "Seek multiple sources and perspectives");
    }
}
