//! Inputs to evaluation: agent output, execution trace, reference data.

use serde::{Deserialize, Serialize};

use crate::domain::role::AgentRole;

/// Final output produced by the agent system for one trial.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentOutput {
    /// Generated text (e.g. the review or report).
    pub text: String,
    /// Wall-clock time the agent system spent producing it.
    #[serde(default)]
    pub elapsed_ms: u64,
}

impl AgentOutput {
    pub fn new(text: impl Into<String>, elapsed_ms: u64) -> Self {
        Self {
            text: text.into(),
            elapsed_ms,
        }
    }
}

/// Kind of interaction between two roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    /// `from` handed a sub-task to `to`.
    Delegation,
    /// `to` returned a result to `from`'s request.
    Response,
    /// Free-form message passing.
    Message,
}

/// One edge in the interaction trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEvent {
    pub from: AgentRole,
    pub to: AgentRole,
    pub kind: InteractionKind,
    /// Milliseconds since trial start, if the backend records it.
    #[serde(default)]
    pub at_ms: Option<u64>,
}

impl TraceEvent {
    pub fn new(from: AgentRole, to: AgentRole, kind: InteractionKind) -> Self {
        Self {
            from,
            to,
            kind,
            at_ms: None,
        }
    }
}

/// Ordered record of the interactions that happened during a trial.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionTrace {
    #[serde(default)]
    pub events: Vec<TraceEvent>,
}

impl ExecutionTrace {
    pub fn new(events: Vec<TraceEvent>) -> Self {
        Self { events }
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// What the agent backend returns for one trial.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentRun {
    pub output: AgentOutput,
    #[serde(default)]
    pub trace: ExecutionTrace,
}

/// Read-only reference texts for one task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReferenceData {
    pub task_id: String,
    #[serde(default)]
    pub texts: Vec<String>,
}

impl ReferenceData {
    pub fn new(task_id: impl Into<String>, texts: Vec<String>) -> Self {
        Self {
            task_id: task_id.into(),
            texts,
        }
    }

    /// An empty reference for a task whose data is missing.
    pub fn missing(task_id: impl Into<String>) -> Self {
        Self::new(task_id, Vec::new())
    }

    /// True when there is no non-blank reference text.
    pub fn is_empty(&self) -> bool {
        self.texts.iter().all(|t| t.trim().is_empty())
    }
}

/// Identifies one unit of work handed to the agent backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskInput {
    pub task_id: String,
    pub repetition: u32,
}
