//! Per-tier and per-trial result records.
//!
//! Every record here is plain data with stable field names so an outer
//! layer can persist or display it without loss.

use serde::{Deserialize, Serialize};

use crate::domain::composition::AgentComposition;
use crate::domain::error::TierError;
use crate::domain::role::AgentRole;

/// One stage of evaluation. Tiers always execute in ascending order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Tier {
    /// Deterministic text-similarity and performance metrics.
    Traditional,
    /// Model-judged quality.
    LlmJudge,
    /// Graph/coordination structure of the trace.
    Graph,
}

impl Tier {
    /// All tiers in execution order.
    pub const ALL: [Tier; 3] = [Tier::Traditional, Tier::LlmJudge, Tier::Graph];

    pub fn number(&self) -> u8 {
        match self {
            Tier::Traditional => 1,
            Tier::LlmJudge => 2,
            Tier::Graph => 3,
        }
    }

    /// Only the network-bound judge tier is worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Tier::LlmJudge)
    }
}

impl From<Tier> for u8 {
    fn from(tier: Tier) -> Self {
        tier.number()
    }
}

impl TryFrom<u8> for Tier {
    type Error = String;

    fn try_from(n: u8) -> Result<Self, Self::Error> {
        match n {
            1 => Ok(Tier::Traditional),
            2 => Ok(Tier::LlmJudge),
            3 => Ok(Tier::Graph),
            other => Err(format!("unknown tier {other}")),
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// Tier 1: deterministic similarity and performance scores.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tier1Result {
    pub cosine_similarity: f64,
    pub jaccard_similarity: f64,
    pub bigram_similarity: f64,
    pub time_score: f64,
    /// 1.0 when the best similarity met the success threshold.
    pub task_success: f64,
    /// Weighted combination in [0, 1].
    pub overall_score: f64,
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// Tier 2: model-judged quality scores.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tier2Result {
    pub technical_accuracy: f64,
    pub constructiveness: f64,
    pub clarity: f64,
    pub planning_rationality: f64,
    /// Weighted combination in [0, 1].
    pub overall_score: f64,
    pub rationale: String,
    /// Name of the judge model or backend.
    pub judge: String,
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// Tier 3: coordination metrics over the interaction graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tier3Result {
    pub delegation_depth: u32,
    pub max_fan_out: u32,
    pub message_count: u32,
    pub role_utilization: f64,
    pub utilization_balance: f64,
    pub connectivity: f64,
    /// Mean of utilization, balance and connectivity, in [0, 1].
    pub overall_score: f64,
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// The typed result a plugin produced for its tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tier", rename_all = "snake_case")]
pub enum TierOutput {
    Traditional(Tier1Result),
    LlmJudge(Tier2Result),
    Graph(Tier3Result),
}

impl TierOutput {
    pub fn tier(&self) -> Tier {
        match self {
            TierOutput::Traditional(_) => Tier::Traditional,
            TierOutput::LlmJudge(_) => Tier::LlmJudge,
            TierOutput::Graph(_) => Tier::Graph,
        }
    }

    pub fn overall_score(&self) -> f64 {
        match self {
            TierOutput::Traditional(r) => r.overall_score,
            TierOutput::LlmJudge(r) => r.overall_score,
            TierOutput::Graph(r) => r.overall_score,
        }
    }
}

/// Terminal status of one trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrialStatus {
    /// Every registered tier completed.
    Succeeded,
    /// At least one tier failed and at least one succeeded.
    Partial,
    /// No tier succeeded, or the trial never reached evaluation.
    Failed,
}

impl TrialStatus {
    /// Whether the trial's scores count towards aggregates.
    pub fn is_scored(&self) -> bool {
        !matches!(self, TrialStatus::Failed)
    }
}

/// Classification of why a tier failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierFailureKind {
    Transient,
    Permanent,
    MalformedInput,
    InvalidTrace,
    Timeout,
}

impl From<&TierError> for TierFailureKind {
    fn from(err: &TierError) -> Self {
        match err {
            TierError::Transient { .. } => TierFailureKind::Transient,
            TierError::Permanent { .. } => TierFailureKind::Permanent,
            TierError::MalformedInput { .. } => TierFailureKind::MalformedInput,
            TierError::InvalidTrace { .. } => TierFailureKind::InvalidTrace,
            TierError::Timeout { .. } => TierFailureKind::Timeout,
        }
    }
}

/// A recorded tier failure for one trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierFailure {
    pub tier: Tier,
    pub plugin: String,
    pub kind: TierFailureKind,
    pub message: String,
    /// Attempts made on the failing plugin (1 when not retried).
    pub attempts: u32,
}

impl TierFailure {
    pub fn new(tier: Tier, plugin: impl Into<String>, err: &TierError, attempts: u32) -> Self {
        Self {
            tier,
            plugin: plugin.into(),
            kind: err.into(),
            message: err.to_string(),
            attempts,
        }
    }
}

/// Classification of a trial that did not fully succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// One or more tiers failed.
    TierExecution,
    /// The trial exceeded its time bound.
    Timeout,
    /// The agent backend raised an error before evaluation.
    AgentExecution,
    /// A plugin or backend panicked.
    Panic,
    /// The registry held no plugins for any tier.
    NoTiers,
}

/// Error classification attached to non-succeeded trials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl TrialFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Per-tier timing for one pipeline run, in seconds.
///
/// Every value is at least the pipeline's minimal epsilon, so a measured
/// zero is never mistaken for a skipped tier. `total_time` is the sum of
/// the tier times; `wall_time` is elapsed wall-clock time, which is lower
/// when tiers 2 and 3 overlap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStats {
    pub tier1_time: f64,
    pub tier2_time: f64,
    pub tier3_time: f64,
    pub total_time: f64,
    pub wall_time: f64,
}

impl ExecutionStats {
    /// Stats for a trial that never reached evaluation.
    pub fn floor(epsilon: f64) -> Self {
        Self {
            tier1_time: epsilon,
            tier2_time: epsilon,
            tier3_time: epsilon,
            total_time: epsilon * 3.0,
            wall_time: epsilon,
        }
    }
}

/// One execution of the pipeline for one (composition, task, repetition).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialResult {
    pub composition_id: String,
    pub roles: Vec<AgentRole>,
    pub task_id: String,
    pub repetition: u32,
    pub status: TrialStatus,
    pub tier1: Option<Tier1Result>,
    pub tier2: Option<Tier2Result>,
    pub tier3: Option<Tier3Result>,
    #[serde(default)]
    pub tier_failures: Vec<TierFailure>,
    /// Present whenever `status` is not `succeeded`.
    pub failure: Option<TrialFailure>,
    pub stats: ExecutionStats,
    /// Seconds the agent backend took before evaluation started.
    #[serde(default)]
    pub agent_time: f64,
}

impl TrialResult {
    /// A failed trial that produced no tier results.
    pub fn failed(
        composition: &AgentComposition,
        task_id: &str,
        repetition: u32,
        failure: TrialFailure,
        epsilon: f64,
    ) -> Self {
        Self {
            composition_id: composition.id().to_string(),
            roles: composition.roles().to_vec(),
            task_id: task_id.to_string(),
            repetition,
            status: TrialStatus::Failed,
            tier1: None,
            tier2: None,
            tier3: None,
            tier_failures: Vec::new(),
            failure: Some(failure),
            stats: ExecutionStats::floor(epsilon),
            agent_time: 0.0,
        }
    }

    /// Whether the failure was caused by the trial timeout.
    pub fn is_timeout(&self) -> bool {
        self.failure
            .as_ref()
            .is_some_and(|f| f.kind == FailureKind::Timeout)
    }

    /// Mean of the `overall_score`s of every tier that produced a result.
    pub fn composite_score(&self) -> Option<f64> {
        let scores: Vec<f64> = [
            self.tier1.as_ref().map(|r| r.overall_score),
            self.tier2.as_ref().map(|r| r.overall_score),
            self.tier3.as_ref().map(|r| r.overall_score),
        ]
        .into_iter()
        .flatten()
        .collect();
        if scores.is_empty() {
            None
        } else {
            Some(scores.iter().sum::<f64>() / scores.len() as f64)
        }
    }

    /// Score for a given tier, if that tier produced a result.
    pub fn tier_score(&self, tier: Tier) -> Option<f64> {
        match tier {
            Tier::Traditional => self.tier1.as_ref().map(|r| r.overall_score),
            Tier::LlmJudge => self.tier2.as_ref().map(|r| r.overall_score),
            Tier::Graph => self.tier3.as_ref().map(|r| r.overall_score),
        }
    }
}
