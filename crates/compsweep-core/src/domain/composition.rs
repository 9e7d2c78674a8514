//! `AgentComposition`: an immutable, non-empty set of enabled roles.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use sha2::Digest as _;

use crate::domain::role::AgentRole;

/// Separator between role names in a composition identifier.
pub const ID_SEPARATOR: char = '+';

/// A specific subset of agent roles active for a trial.
///
/// Roles are held in canonical order, so two compositions built from the
/// same set in any order compare equal and share an identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "CompositionRepr")]
pub struct AgentComposition {
    id: String,
    roles: Vec<AgentRole>,
}

#[derive(Deserialize)]
struct CompositionRepr {
    roles: Vec<AgentRole>,
}

impl TryFrom<CompositionRepr> for AgentComposition {
    type Error = EmptyComposition;

    fn try_from(repr: CompositionRepr) -> Result<Self, Self::Error> {
        AgentComposition::new(repr.roles)
    }
}

/// Error returned when building a composition with no roles.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("a composition must contain at least one role")]
pub struct EmptyComposition;

impl AgentComposition {
    /// Build a composition from any collection of roles (duplicates collapse).
    pub fn new(roles: impl IntoIterator<Item = AgentRole>) -> Result<Self, EmptyComposition> {
        let set: BTreeSet<AgentRole> = roles.into_iter().collect();
        if set.is_empty() {
            return Err(EmptyComposition);
        }
        let roles: Vec<AgentRole> = set.into_iter().collect();
        let id = roles
            .iter()
            .map(AgentRole::as_str)
            .collect::<Vec<_>>()
            .join(&ID_SEPARATOR.to_string());
        Ok(Self { id, roles })
    }

    /// Stable identifier, e.g. `manager+researcher`.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Enabled roles in canonical order.
    pub fn roles(&self) -> &[AgentRole] {
        &self.roles
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    pub fn contains(&self, role: AgentRole) -> bool {
        self.roles.binary_search(&role).is_ok()
    }

    /// Whether every role in `other` is enabled here.
    pub fn contains_all<'a>(&self, other: impl IntoIterator<Item = &'a AgentRole>) -> bool {
        other.into_iter().all(|r| self.contains(*r))
    }

    /// Short SHA-256 hex digest of the identifier.
    pub fn fingerprint(&self) -> String {
        let digest = sha2::Sha256::digest(self.id.as_bytes());
        hex::encode(digest)[..12].to_string()
    }
}

impl std::fmt::Display for AgentComposition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_is_order_independent() {
        let a = AgentComposition::new([AgentRole::Analyst, AgentRole::Manager]).unwrap();
        let b = AgentComposition::new([AgentRole::Manager, AgentRole::Analyst]).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.id(), "manager+analyst");
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 12);
    }

    #[test]
    fn test_duplicates_collapse() {
        let c = AgentComposition::new([
            AgentRole::Researcher,
            AgentRole::Researcher,
            AgentRole::Manager,
        ])
        .unwrap();
        assert_eq!(c.len(), 2);
        assert!(c.contains(AgentRole::Researcher));
        assert!(!c.contains(AgentRole::Synthesiser));
    }

    #[test]
    fn test_empty_is_rejected() {
        assert_eq!(AgentComposition::new([]), Err(EmptyComposition));
    }

    #[test]
    fn test_deserialize_revalidates() {
        let json = r#"{"id":"bogus","roles":["synthesiser","manager"]}"#;
        let c: AgentComposition = serde_json::from_str(json).unwrap();
        assert_eq!(c.id(), "manager+synthesiser");

        let empty = r#"{"id":"","roles":[]}"#;
        assert!(serde_json::from_str::<AgentComposition>(empty).is_err());
    }
}
