//! Tier 2: model-backed quality judging.
//!
//! The plugin makes a single backend call per attempt and never retries on
//! its own; retry and backoff are applied by the pipeline the sweep runner
//! configures. Backend failures surface as typed [`TierError`]s, never as
//! silently zeroed scores.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::error::{ConfigResult, ConfigurationError, JudgeError, TierError, TierResult};
use crate::domain::result::{Tier, Tier2Result, TierOutput};
use crate::domain::role::AgentRole;
use crate::plugins::{normalise, EvaluationInput, EvaluatorPlugin};

/// What the judge is asked to score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgeRequest {
    pub task_id: String,
    pub roles: Vec<AgentRole>,
    pub output: String,
    pub references: Vec<String>,
}

/// Structured verdict returned by a judge backend. Scores are in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgeVerdict {
    pub technical_accuracy: f64,
    pub constructiveness: f64,
    pub clarity: f64,
    pub planning_rationality: f64,
    #[serde(default)]
    pub rationale: String,
}

impl JudgeVerdict {
    /// Reject scores outside [0, 1] or non-finite.
    pub fn validate(&self) -> Result<(), JudgeError> {
        for (name, v) in [
            ("technical_accuracy", self.technical_accuracy),
            ("constructiveness", self.constructiveness),
            ("clarity", self.clarity),
            ("planning_rationality", self.planning_rationality),
        ] {
            if !v.is_finite() || !(0.0..=1.0).contains(&v) {
                return Err(JudgeError::Parse(format!("{name} out of range: {v}")));
            }
        }
        Ok(())
    }
}

/// The provider abstraction the judge plugin calls.
#[async_trait]
pub trait JudgeBackend: Send + Sync {
    /// Model or backend identifier recorded on results.
    fn model(&self) -> &str;

    async fn score(&self, request: &JudgeRequest) -> Result<JudgeVerdict, JudgeError>;
}

/// Tunables for tier 2.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Tier2Settings {
    pub technical_accuracy_weight: f64,
    pub constructiveness_weight: f64,
    pub clarity_weight: f64,
    pub planning_rationality_weight: f64,
    /// Outputs shorter than this are scored zero without calling the judge.
    pub min_output_chars: usize,
}

impl Default for Tier2Settings {
    fn default() -> Self {
        Self {
            technical_accuracy_weight: 0.35,
            constructiveness_weight: 0.25,
            clarity_weight: 0.20,
            planning_rationality_weight: 0.20,
            min_output_chars: 20,
        }
    }
}

/// Tier-2 evaluator backed by a [`JudgeBackend`].
pub struct LlmJudgePlugin {
    backend: Arc<dyn JudgeBackend>,
    settings: Tier2Settings,
    weights: [f64; 4],
}

impl LlmJudgePlugin {
    pub const NAME: &'static str = "llm_judge";

    pub fn new(backend: Arc<dyn JudgeBackend>, settings: Tier2Settings) -> ConfigResult<Self> {
        let w = normalise(&[
            settings.technical_accuracy_weight,
            settings.constructiveness_weight,
            settings.clarity_weight,
            settings.planning_rationality_weight,
        ])
        .ok_or_else(|| ConfigurationError::InvalidWeights {
            scope: "tier2",
            reason: "weights must be non-negative with a positive sum".to_string(),
        })?;
        Ok(Self {
            backend,
            settings,
            weights: [w[0], w[1], w[2], w[3]],
        })
    }

    fn overall(&self, v: &JudgeVerdict) -> f64 {
        let [a, b, c, d] = self.weights;
        (a * v.technical_accuracy
            + b * v.constructiveness
            + c * v.clarity
            + d * v.planning_rationality)
            .clamp(0.0, 1.0)
    }
}

#[async_trait]
impl EvaluatorPlugin for LlmJudgePlugin {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn tier(&self) -> Tier {
        Tier::LlmJudge
    }

    async fn evaluate(&self, input: &EvaluationInput<'_>) -> TierResult<TierOutput> {
        let mut warnings = Vec::new();

        if input.output.text.trim().chars().count() < self.settings.min_output_chars {
            warnings.push(format!(
                "output shorter than {} characters; judge not called",
                self.settings.min_output_chars
            ));
            return Ok(TierOutput::LlmJudge(Tier2Result {
                judge: self.backend.model().to_string(),
                warnings,
                ..Default::default()
            }));
        }
        if input.reference.is_empty() {
            warnings.push("no reference text available; judged without reference".to_string());
        }

        let request = JudgeRequest {
            task_id: input.reference.task_id.clone(),
            roles: input.composition.roles().to_vec(),
            output: input.output.text.clone(),
            references: input.reference.texts.clone(),
        };

        let verdict = self.backend.score(&request).await.map_err(TierError::from)?;
        verdict.validate().map_err(TierError::from)?;

        Ok(TierOutput::LlmJudge(Tier2Result {
            technical_accuracy: verdict.technical_accuracy,
            constructiveness: verdict.constructiveness,
            clarity: verdict.clarity,
            planning_rationality: verdict.planning_rationality,
            overall_score: self.overall(&verdict),
            rationale: verdict.rationale,
            judge: self.backend.model().to_string(),
            warnings,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::composition::AgentComposition;
    use crate::domain::trace::{AgentOutput, ExecutionTrace, ReferenceData};
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FixedJudge {
        verdict: Result<JudgeVerdict, JudgeError>,
        calls: AtomicU32,
    }

    #[async_trait]
    impl JudgeBackend for FixedJudge {
        fn model(&self) -> &str {
            "fixed"
        }

        async fn score(&self, _request: &JudgeRequest) -> Result<JudgeVerdict, JudgeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.verdict.clone()
        }
    }

    fn verdict(score: f64) -> JudgeVerdict {
        JudgeVerdict {
            technical_accuracy: score,
            constructiveness: score,
            clarity: score,
            planning_rationality: score,
            rationale: "solid".to_string(),
        }
    }

    async fn run(judge: Arc<FixedJudge>, text: &str, refs: Vec<String>) -> TierResult<TierOutput> {
        let plugin = LlmJudgePlugin::new(judge, Tier2Settings::default()).unwrap();
        let composition = AgentComposition::new([AgentRole::Manager]).unwrap();
        let output = AgentOutput::new(text, 10);
        let reference = ReferenceData::new("t1", refs);
        let trace = ExecutionTrace::default();
        plugin
            .evaluate(&EvaluationInput {
                composition: &composition,
                output: &output,
                reference: &reference,
                trace: &trace,
            })
            .await
    }

    const TEXT: &str = "A long enough review of the submitted paper's methodology.";

    #[tokio::test]
    async fn test_verdict_is_weighted() {
        let judge = Arc::new(FixedJudge {
            verdict: Ok(verdict(0.8)),
            calls: AtomicU32::new(0),
        });
        let out = run(judge.clone(), TEXT, vec!["ref".into()]).await.unwrap();
        match out {
            TierOutput::LlmJudge(r) => {
                assert!((r.overall_score - 0.8).abs() < 1e-9);
                assert_eq!(r.judge, "fixed");
                assert_eq!(r.rationale, "solid");
                assert!(r.warnings.is_empty());
            }
            other => panic!("unexpected output {other:?}"),
        }
        assert_eq!(judge.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_short_output_skips_backend() {
        let judge = Arc::new(FixedJudge {
            verdict: Ok(verdict(1.0)),
            calls: AtomicU32::new(0),
        });
        let out = run(judge.clone(), "tiny", vec!["ref".into()]).await.unwrap();
        assert_eq!(out.overall_score(), 0.0);
        assert_eq!(judge.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_backend_failure_is_typed() {
        let judge = Arc::new(FixedJudge {
            verdict: Err(JudgeError::Network("refused".into())),
            calls: AtomicU32::new(0),
        });
        let err = run(judge, TEXT, vec![]).await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_out_of_range_verdict_is_rejected() {
        let judge = Arc::new(FixedJudge {
            verdict: Ok(verdict(7.0)),
            calls: AtomicU32::new(0),
        });
        let err = run(judge, TEXT, vec!["ref".into()]).await.unwrap_err();
        assert!(matches!(err, TierError::Transient { .. }));
        assert!(err.to_string().contains("out of range"));
    }

    #[tokio::test]
    async fn test_missing_reference_warns() {
        let judge = Arc::new(FixedJudge {
            verdict: Ok(verdict(0.5)),
            calls: AtomicU32::new(0),
        });
        match run(judge, TEXT, vec![]).await.unwrap() {
            TierOutput::LlmJudge(r) => assert_eq!(r.warnings.len(), 1),
            other => panic!("unexpected output {other:?}"),
        }
    }
}
