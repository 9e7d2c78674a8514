//! Evaluator plugins and the tier-ordered registry.
//!
//! # Module layout
//!
//! - [`registry`] - `PluginRegistry`: tier → ordered plugins
//! - [`traditional`] - tier 1, deterministic text/performance metrics
//! - [`llm_judge`] - tier 2, model-judged quality via a `JudgeBackend`
//! - [`judge_http`] - OpenAI-compatible `JudgeBackend`
//! - [`graph`] - tier 3, coordination metrics over the interaction trace

pub mod graph;
pub mod judge_http;
pub mod llm_judge;
pub mod registry;
pub mod traditional;

use async_trait::async_trait;

use crate::domain::composition::AgentComposition;
use crate::domain::error::TierResult;
use crate::domain::result::{Tier, TierOutput};
use crate::domain::trace::{AgentOutput, ExecutionTrace, ReferenceData};

pub use graph::{GraphEvaluatorPlugin, Tier3Settings};
pub use judge_http::{HttpJudgeBackend, HttpJudgeConfig};
pub use llm_judge::{JudgeBackend, JudgeRequest, JudgeVerdict, LlmJudgePlugin, Tier2Settings};
pub use registry::PluginRegistry;
pub use traditional::{Tier1Settings, TraditionalMetricsPlugin};

/// Everything a plugin may read for one trial. All borrows are read-only.
#[derive(Debug, Clone, Copy)]
pub struct EvaluationInput<'a> {
    pub composition: &'a AgentComposition,
    pub output: &'a AgentOutput,
    pub reference: &'a ReferenceData,
    pub trace: &'a ExecutionTrace,
}

/// Capability contract for a pluggable evaluator.
///
/// Recoverable conditions (output too short, missing reference) must yield
/// `Ok` with degraded scores and a warning; `Err` is reserved for conditions
/// that make evaluation impossible.
#[async_trait]
pub trait EvaluatorPlugin: Send + Sync {
    /// Stable plugin name used in records and logs.
    fn name(&self) -> &str;

    /// Tier this plugin evaluates.
    fn tier(&self) -> Tier;

    async fn evaluate(&self, input: &EvaluationInput<'_>) -> TierResult<TierOutput>;
}

/// Clamp a score into [0, 1], mapping non-finite values to 0.
pub(crate) fn unit(score: f64) -> f64 {
    if score.is_finite() {
        score.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Normalise non-negative weights so they sum to 1.
pub(crate) fn normalise(weights: &[f64]) -> Option<Vec<f64>> {
    if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
        return None;
    }
    let sum: f64 = weights.iter().sum();
    if sum <= 0.0 {
        return None;
    }
    Some(weights.iter().map(|w| w / sum).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_clamps() {
        assert_eq!(unit(1.5), 1.0);
        assert_eq!(unit(-0.1), 0.0);
        assert_eq!(unit(f64::NAN), 0.0);
        assert_eq!(unit(0.25), 0.25);
    }

    #[test]
    fn test_normalise() {
        assert_eq!(normalise(&[1.0, 1.0]), Some(vec![0.5, 0.5]));
        assert_eq!(normalise(&[0.0, 0.0]), None);
        assert_eq!(normalise(&[1.0, -1.0]), None);
    }
}
