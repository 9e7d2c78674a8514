//! Narrow interfaces to the collaborators a sweep consumes.
//!
//! - [`AgentBackend`] runs the agent system for one composition and task.
//! - [`ReferenceSource`] supplies read-only reference texts per task.
//! - [`BaselineInvoker`] runs the external baseline once per composition.
//!
//! Command-backed implementations live in [`crate::process`].

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::composition::AgentComposition;
use crate::domain::error::{AgentError, BaselineError};
use crate::domain::role::AgentRole;
use crate::domain::trace::{AgentRun, ReferenceData, TaskInput};

/// Runs the agent system with a given set of enabled roles.
#[async_trait]
pub trait AgentBackend: Send + Sync {
    async fn execute(
        &self,
        composition: &AgentComposition,
        task: &TaskInput,
    ) -> Result<AgentRun, AgentError>;
}

/// Read-only reference texts keyed by task identifier.
pub trait ReferenceSource: Send + Sync {
    fn reference(&self, task_id: &str) -> Option<ReferenceData>;
}

/// In-memory reference collection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InMemoryReferences {
    texts: HashMap<String, Vec<String>>,
}

impl InMemoryReferences {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, task_id: impl Into<String>, texts: Vec<String>) -> &mut Self {
        self.texts.insert(task_id.into(), texts);
        self
    }

    pub fn len(&self) -> usize {
        self.texts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }
}

impl From<HashMap<String, Vec<String>>> for InMemoryReferences {
    fn from(texts: HashMap<String, Vec<String>>) -> Self {
        Self { texts }
    }
}

impl ReferenceSource for InMemoryReferences {
    fn reference(&self, task_id: &str) -> Option<ReferenceData> {
        self.texts
            .get(task_id)
            .map(|texts| ReferenceData::new(task_id, texts.clone()))
    }
}

/// Fixed payload handed to the external baseline for one composition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineRequest {
    pub composition_id: String,
    pub roles: Vec<AgentRole>,
    pub tasks: Vec<String>,
}

impl BaselineRequest {
    pub fn new(composition: &AgentComposition, tasks: &[String]) -> Self {
        Self {
            composition_id: composition.id().to_string(),
            roles: composition.roles().to_vec(),
            tasks: tasks.to_vec(),
        }
    }
}

/// What a baseline run reports back.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BaselineOutput {
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub output: String,
}

/// Runs the external baseline.
#[async_trait]
pub trait BaselineInvoker: Send + Sync {
    async fn invoke(&self, request: &BaselineRequest) -> Result<BaselineOutput, BaselineError>;
}

/// Outcome of a baseline invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaselineStatus {
    Succeeded,
    Failed,
    Timeout,
}

/// Baseline result recorded alongside trial results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineRecord {
    pub composition_id: String,
    pub status: BaselineStatus,
    pub score: Option<f64>,
    #[serde(default)]
    pub output: String,
    pub error: Option<String>,
    pub elapsed_secs: f64,
}
