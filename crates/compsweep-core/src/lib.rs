//! Composition sweep core.
//!
//! Generates every valid agent-role composition, runs each one through a
//! tiered evaluation pipeline over a bounded worker pool, and aggregates the
//! results into per-composition statistics and a markdown summary.

pub mod analyzer;
pub mod backend;
pub mod config;
pub mod domain;
pub mod generator;
pub mod metrics;
pub mod obs;
pub mod pipeline;
pub mod plugins;
pub mod process;
pub mod report;
pub mod retry;
pub mod runner;
pub mod telemetry;

pub use analyzer::{
    calculate_statistics, generate_markdown_summary, rank_compositions,
    render_baseline_comparison, CompositionStats, ScoreSummary, SummaryOptions,
};
pub use backend::{
    AgentBackend, BaselineInvoker, BaselineOutput, BaselineRecord, BaselineRequest,
    BaselineStatus, InMemoryReferences, ReferenceSource,
};
pub use config::{CompositionConstraints, SweepConfig};
pub use domain::{
    AgentComposition, AgentError, AgentOutput, AgentRole, AgentRun, BaselineError, ConfigResult,
    ConfigurationError, ExecutionStats, ExecutionTrace, FailureKind, InteractionKind, JudgeError,
    ReferenceData, Result, SweepError, TaskInput, Tier, Tier1Result, Tier2Result, Tier3Result,
    TierError, TierFailure, TierFailureKind, TierOutput, TierResult, TraceEvent, TrialFailure,
    TrialResult, TrialStatus,
};
pub use generator::generate_all_compositions;
pub use metrics::{MetricsSnapshot, SweepMetrics};
pub use pipeline::{EvaluationPipeline, PipelineSettings};
pub use plugins::{
    EvaluationInput, EvaluatorPlugin, GraphEvaluatorPlugin, HttpJudgeBackend, HttpJudgeConfig,
    JudgeBackend, JudgeRequest, JudgeVerdict, LlmJudgePlugin, PluginRegistry, Tier1Settings,
    Tier2Settings, Tier3Settings, TraditionalMetricsPlugin,
};
pub use process::{AgentCommandConfig, BaselineCommandConfig, CommandAgentBackend, CommandBaseline};
pub use report::{SweepReport, SCHEMA_VERSION};
pub use retry::{RetryPolicy, Sleeper, TokioSleeper};
pub use runner::{SweepOutcome, SweepRunner};

/// Crate version, recorded in reports.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
