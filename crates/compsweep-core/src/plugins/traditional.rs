//! Tier 1: deterministic text-similarity and execution-performance metrics.
//!
//! Pure CPU work with no external calls. Similarities are computed against
//! every reference text and the best-matching reference is reported.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::error::{ConfigResult, ConfigurationError, TierResult};
use crate::domain::result::{Tier, Tier1Result, TierOutput};
use crate::plugins::{normalise, unit, EvaluationInput, EvaluatorPlugin};

/// Tunables for tier 1.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Tier1Settings {
    pub similarity_weight: f64,
    pub time_weight: f64,
    pub success_weight: f64,
    /// Best similarity at or above this counts as task success.
    pub success_threshold: f64,
    /// Agent time (seconds) at which `time_score` drops to 0.5.
    pub time_reference_secs: f64,
    /// Outputs shorter than this (trimmed chars) get zero similarity.
    pub min_output_chars: usize,
}

impl Default for Tier1Settings {
    fn default() -> Self {
        Self {
            similarity_weight: 0.6,
            time_weight: 0.2,
            success_weight: 0.2,
            success_threshold: 0.5,
            time_reference_secs: 60.0,
            min_output_chars: 20,
        }
    }
}

/// Tier-1 evaluator.
#[derive(Debug, Clone)]
pub struct TraditionalMetricsPlugin {
    settings: Tier1Settings,
    weights: [f64; 3],
}

impl TraditionalMetricsPlugin {
    pub const NAME: &'static str = "traditional_metrics";

    pub fn new(settings: Tier1Settings) -> ConfigResult<Self> {
        let w = normalise(&[
            settings.similarity_weight,
            settings.time_weight,
            settings.success_weight,
        ])
        .ok_or_else(|| ConfigurationError::InvalidWeights {
            scope: "tier1",
            reason: "weights must be non-negative with a positive sum".to_string(),
        })?;
        if !(settings.time_reference_secs > 0.0 && settings.time_reference_secs.is_finite()) {
            return Err(ConfigurationError::ZeroDuration {
                field: "time_reference_secs",
            });
        }
        Ok(Self {
            settings,
            weights: [w[0], w[1], w[2]],
        })
    }

    /// Score `output` against `references` and the agent's elapsed time.
    pub fn score(&self, output: &str, references: &[String], elapsed_ms: u64) -> Tier1Result {
        let mut warnings = Vec::new();
        let elapsed_secs = elapsed_ms as f64 / 1000.0;
        let time_score = unit(1.0 / (1.0 + elapsed_secs / self.settings.time_reference_secs));

        let usable_refs: Vec<&String> = references.iter().filter(|r| !r.trim().is_empty()).collect();
        let too_short = output.trim().chars().count() < self.settings.min_output_chars;

        let (cosine, jaccard, bigram) = if too_short {
            warnings.push(format!(
                "output shorter than {} characters; similarity scored as zero",
                self.settings.min_output_chars
            ));
            (0.0, 0.0, 0.0)
        } else if usable_refs.is_empty() {
            warnings.push("no reference text available; similarity scored as zero".to_string());
            (0.0, 0.0, 0.0)
        } else {
            let out_tokens = tokenize(output);
            usable_refs
                .iter()
                .map(|r| {
                    let ref_tokens = tokenize(r);
                    (
                        cosine_similarity(&out_tokens, &ref_tokens),
                        jaccard_similarity(&out_tokens, &ref_tokens),
                        bigram_similarity(&out_tokens, &ref_tokens),
                    )
                })
                .fold((0.0, 0.0, 0.0), |best, cur| {
                    if mean3(cur) > mean3(best) {
                        cur
                    } else {
                        best
                    }
                })
        };

        let similarity = mean3((cosine, jaccard, bigram));
        let task_success = if similarity >= self.settings.success_threshold {
            1.0
        } else {
            0.0
        };
        let [ws, wt, wsucc] = self.weights;
        let overall_score = unit(ws * similarity + wt * time_score + wsucc * task_success);

        Tier1Result {
            cosine_similarity: cosine,
            jaccard_similarity: jaccard,
            bigram_similarity: bigram,
            time_score,
            task_success,
            overall_score,
            warnings,
        }
    }
}

impl Default for TraditionalMetricsPlugin {
    fn default() -> Self {
        Self {
            settings: Tier1Settings::default(),
            weights: [0.6, 0.2, 0.2],
        }
    }
}

#[async_trait]
impl EvaluatorPlugin for TraditionalMetricsPlugin {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn tier(&self) -> Tier {
        Tier::Traditional
    }

    async fn evaluate(&self, input: &EvaluationInput<'_>) -> TierResult<TierOutput> {
        Ok(TierOutput::Traditional(self.score(
            &input.output.text,
            &input.reference.texts,
            input.output.elapsed_ms,
        )))
    }
}

fn mean3((a, b, c): (f64, f64, f64)) -> f64 {
    (a + b + c) / 3.0
}

/// Lowercased alphanumeric word tokens.
fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn cosine_similarity(a: &[String], b: &[String]) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    fn tf(tokens: &[String]) -> HashMap<&str, f64> {
        let mut m = HashMap::new();
        for t in tokens {
            *m.entry(t.as_str()).or_insert(0.0) += 1.0;
        }
        m
    }
    let (ta, tb) = (tf(a), tf(b));
    let dot: f64 = ta
        .iter()
        .filter_map(|(k, va)| tb.get(k).map(|vb| va * vb))
        .sum();
    let norm = |m: &HashMap<&str, f64>| m.values().map(|v| v * v).sum::<f64>().sqrt();
    unit(dot / (norm(&ta) * norm(&tb)))
}

fn jaccard_similarity(a: &[String], b: &[String]) -> f64 {
    let sa: HashSet<&str> = a.iter().map(String::as_str).collect();
    let sb: HashSet<&str> = b.iter().map(String::as_str).collect();
    let union = sa.union(&sb).count();
    if union == 0 {
        return 0.0;
    }
    sa.intersection(&sb).count() as f64 / union as f64
}

/// Dice coefficient over word bigrams.
fn bigram_similarity(a: &[String], b: &[String]) -> f64 {
    let bigrams = |tokens: &[String]| -> HashSet<(String, String)> {
        tokens
            .windows(2)
            .map(|w| (w[0].clone(), w[1].clone()))
            .collect()
    };
    let (ba, bb) = (bigrams(a), bigrams(b));
    if ba.is_empty() || bb.is_empty() {
        return 0.0;
    }
    2.0 * ba.intersection(&bb).count() as f64 / (ba.len() + bb.len()) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    const REF: &str = "The paper proposes a novel attention mechanism and evaluates it on three benchmarks.";

    #[test]
    fn test_identical_output_scores_full_similarity() {
        let plugin = TraditionalMetricsPlugin::default();
        let r = plugin.score(REF, &[REF.to_string()], 0);
        assert!((r.cosine_similarity - 1.0).abs() < 1e-9);
        assert!((r.jaccard_similarity - 1.0).abs() < 1e-9);
        assert!((r.bigram_similarity - 1.0).abs() < 1e-9);
        assert_eq!(r.task_success, 1.0);
        assert!((r.time_score - 1.0).abs() < 1e-9);
        assert!((r.overall_score - 1.0).abs() < 1e-9);
        assert!(r.warnings.is_empty());
    }

    #[test]
    fn test_deterministic() {
        let plugin = TraditionalMetricsPlugin::default();
        let out = "A novel attention mechanism evaluated on benchmarks with mixed results.";
        let a = plugin.score(out, &[REF.to_string()], 12_000);
        let b = plugin.score(out, &[REF.to_string()], 12_000);
        assert_eq!(a, b);
        assert!(a.overall_score > 0.0 && a.overall_score < 1.0);
    }

    #[test]
    fn test_best_reference_wins() {
        let plugin = TraditionalMetricsPlugin::default();
        let refs = vec![
            "completely unrelated text about gardening tools".to_string(),
            REF.to_string(),
        ];
        let r = plugin.score(REF, &refs, 0);
        assert!((r.cosine_similarity - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_short_output_degrades_with_warning() {
        let plugin = TraditionalMetricsPlugin::default();
        let r = plugin.score("ok", &[REF.to_string()], 0);
        assert_eq!(r.cosine_similarity, 0.0);
        assert_eq!(r.task_success, 0.0);
        assert_eq!(r.warnings.len(), 1);
        assert!(r.warnings[0].contains("shorter"));
        // time still contributes
        assert!((r.overall_score - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_missing_reference_degrades_with_warning() {
        let plugin = TraditionalMetricsPlugin::default();
        let r = plugin.score(REF, &[], 0);
        assert_eq!(r.jaccard_similarity, 0.0);
        assert!(r.warnings[0].contains("no reference"));
    }

    #[test]
    fn test_time_score_halves_at_reference() {
        let plugin = TraditionalMetricsPlugin::default();
        let r = plugin.score(REF, &[REF.to_string()], 60_000);
        assert!((r.time_score - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_weights_rejected() {
        let settings = Tier1Settings {
            similarity_weight: 0.0,
            time_weight: 0.0,
            success_weight: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            TraditionalMetricsPlugin::new(settings),
            Err(ConfigurationError::InvalidWeights { .. })
        ));
    }

    #[test]
    fn test_cosine_weights_repeated_terms() {
        let a = tokenize("alpha alpha beta");
        let b = tokenize("alpha beta");
        let expected = 3.0 / 10f64.sqrt();
        assert!((cosine_similarity(&a, &b) - expected).abs() < 1e-9);
        assert_eq!(cosine_similarity(&a, &[]), 0.0);
    }

    #[test]
    fn test_tokenize_lowercases_and_splits() {
        assert_eq!(tokenize("Hello, World! 42x"), vec!["hello", "world", "42x"]);
    }
}
