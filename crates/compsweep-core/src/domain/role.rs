//! Closed role vocabulary for multi-agent compositions.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The agent roles that can be enabled in a composition.
///
/// Variant order is the canonical role order used for identifiers and
/// generation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    Manager,
    Researcher,
    Analyst,
    Synthesiser,
}

impl AgentRole {
    /// Every role, in canonical order.
    pub const ALL: [AgentRole; 4] = [
        AgentRole::Manager,
        AgentRole::Researcher,
        AgentRole::Analyst,
        AgentRole::Synthesiser,
    ];

    /// Stable lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentRole::Manager => "manager",
            AgentRole::Researcher => "researcher",
            AgentRole::Analyst => "analyst",
            AgentRole::Synthesiser => "synthesiser",
        }
    }
}

impl std::fmt::Display for AgentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown role name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown agent role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for AgentRole {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "manager" => Ok(AgentRole::Manager),
            "researcher" => Ok(AgentRole::Researcher),
            "analyst" => Ok(AgentRole::Analyst),
            "synthesiser" | "synthesizer" => Ok(AgentRole::Synthesiser),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}
