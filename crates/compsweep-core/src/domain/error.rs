//! Error taxonomy for composition sweeps.
//!
//! Only [`ConfigurationError`] aborts a sweep, and it does so before any
//! trial runs. Every other kind is captured into the relevant trial or
//! baseline record and the sweep continues.

use crate::domain::role::AgentRole;

/// Invalid sweep configuration or composition constraints.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("role universe must not be empty")]
    EmptyUniverse,

    #[error("min_roles must be at least 1")]
    ZeroMinRoles,

    #[error("min_roles ({min}) exceeds max_roles ({max})")]
    MinExceedsMax { min: usize, max: usize },

    #[error("min_roles ({min}) exceeds role universe size ({universe})")]
    MinExceedsUniverse { min: usize, universe: usize },

    #[error("required role {role} is not part of the role universe")]
    RequiredRoleNotInUniverse { role: AgentRole },

    #[error("{required} required roles cannot fit within max_roles ({max})")]
    RequiredExceedsMax { required: usize, max: usize },

    #[error("excluded combination {combination} contains only required roles")]
    RequiredRolesExcluded { combination: String },

    #[error("excluded combination must not be empty")]
    EmptyExcludedCombination,

    #[error("constraints admit zero valid compositions")]
    NoValidCompositions,

    #[error("repetitions must be at least 1")]
    ZeroRepetitions,

    #[error("concurrency_limit must be at least 1")]
    ZeroConcurrency,

    #[error("{field} must be greater than zero")]
    ZeroDuration { field: &'static str },

    #[error("tasks must contain at least one task identifier")]
    NoTasks,

    #[error("retry policy max_attempts must be at least 1")]
    ZeroRetryAttempts,

    #[error("no evaluator plugins registered")]
    EmptyRegistry,

    #[error("external baseline requested but no baseline invoker configured")]
    MissingBaselineInvoker,

    #[error("invalid weights for {scope}: {reason}")]
    InvalidWeights { scope: &'static str, reason: String },
}

/// Result type for configuration validation.
pub type ConfigResult<T> = std::result::Result<T, ConfigurationError>;

/// A failure raised by one evaluator plugin for one trial.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TierError {
    /// Recoverable by retrying (network hiccup, rate limit, unparsable verdict).
    #[error("transient failure: {reason}")]
    Transient { reason: String },

    /// Not recoverable by retrying (auth failure, rejected request).
    #[error("permanent failure: {reason}")]
    Permanent { reason: String },

    #[error("malformed input: {reason}")]
    MalformedInput { reason: String },

    #[error("invalid execution trace: {reason}")]
    InvalidTrace { reason: String },

    #[error("tier attempt timed out after {limit_ms}ms")]
    Timeout { limit_ms: u64 },
}

impl TierError {
    /// Whether a retry could plausibly produce a different outcome.
    pub fn is_transient(&self) -> bool {
        matches!(self, TierError::Transient { .. } | TierError::Timeout { .. })
    }
}

/// Result type for evaluator plugins.
pub type TierResult<T> = std::result::Result<T, TierError>;

/// Failure reported by an LLM judge backend.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum JudgeError {
    #[error("judge backend unreachable: {0}")]
    Network(String),

    #[error("judge backend rate limited: {0}")]
    RateLimited(String),

    #[error("judge backend returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("judge verdict could not be parsed: {0}")]
    Parse(String),

    #[error("judge request rejected: {0}")]
    Rejected(String),
}

impl From<JudgeError> for TierError {
    fn from(err: JudgeError) -> Self {
        let transient = match &err {
            JudgeError::Network(_) | JudgeError::RateLimited(_) | JudgeError::Parse(_) => true,
            JudgeError::Status { status, .. } => *status >= 500,
            JudgeError::Rejected(_) => false,
        };
        if transient {
            TierError::Transient {
                reason: err.to_string(),
            }
        } else {
            TierError::Permanent {
                reason: err.to_string(),
            }
        }
    }
}

/// Failure raised by the agent execution backend.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AgentError {
    #[error("agent execution failed: {0}")]
    Execution(String),

    #[error("agent command exited with code {code}: {stderr}")]
    NonZeroExit { code: i32, stderr: String },

    #[error("agent output could not be decoded: {0}")]
    Decode(String),

    #[error("io error: {0}")]
    Io(String),
}

/// Failure raised by an external baseline invocation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BaselineError {
    #[error("baseline command is empty")]
    EmptyCommand,

    #[error("baseline exited with code {code}: {stderr}")]
    NonZeroExit { code: i32, stderr: String },

    #[error("baseline timed out after {limit_ms}ms")]
    Timeout { limit_ms: u64 },

    #[error("io error: {0}")]
    Io(String),
}

/// Errors surfaced from a sweep.
///
/// Errors that abort a sweep before any trial runs. Trial, tier and
/// baseline failures are recorded on the outcome instead.
#[derive(Debug, thiserror::Error)]
pub enum SweepError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
}

/// Result type for sweep operations.
pub type Result<T> = std::result::Result<T, SweepError>;
