//! Domain models for composition sweeps.
//!
//! - `AgentRole` / `AgentComposition`: which roles are enabled per trial
//! - `AgentOutput` / `ExecutionTrace` / `ReferenceData`: evaluation inputs
//! - `Tier*Result` / `TrialResult`: evaluation outputs
//! - error taxonomy shared by every layer

pub mod composition;
pub mod error;
pub mod result;
pub mod role;
pub mod trace;

pub use composition::{AgentComposition, EmptyComposition};
pub use error::{
    AgentError, BaselineError, ConfigResult, ConfigurationError, JudgeError, Result, SweepError,
    TierError, TierResult,
};
pub use result::{
    ExecutionStats, FailureKind, Tier, Tier1Result, Tier2Result, Tier3Result, TierFailure,
    TierFailureKind, TierOutput, TrialFailure, TrialResult, TrialStatus,
};
pub use role::{AgentRole, UnknownRole};
pub use trace::{
    AgentOutput, AgentRun, ExecutionTrace, InteractionKind, ReferenceData, TaskInput, TraceEvent,
};
