//! Sweep configuration and validation.

use std::collections::BTreeSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::error::{ConfigResult, ConfigurationError};
use crate::domain::role::AgentRole;
use crate::retry::RetryPolicy;

/// Constraints that decide which role subsets are valid compositions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CompositionConstraints {
    pub min_roles: usize,
    pub max_roles: usize,
    /// Roles every composition must include.
    pub required: Vec<AgentRole>,
    /// Role sets that must not all be enabled together. A composition is
    /// rejected when it contains every role of any entry.
    pub excluded: Vec<Vec<AgentRole>>,
}

impl Default for CompositionConstraints {
    fn default() -> Self {
        Self {
            min_roles: 1,
            max_roles: AgentRole::ALL.len(),
            required: Vec::new(),
            excluded: Vec::new(),
        }
    }
}

/// Declares everything a sweep needs: the role universe, constraints,
/// repetitions, concurrency and time bounds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SweepConfig {
    /// Roles that may appear in a composition.
    pub universe: Vec<AgentRole>,
    pub constraints: CompositionConstraints,
    /// Task identifiers; every composition runs every task.
    pub tasks: Vec<String>,
    /// Trials per (composition, task).
    pub repetitions: u32,
    /// Maximum trials executing simultaneously.
    pub concurrency_limit: usize,
    /// Bound on one whole trial: agent execution plus evaluation.
    pub trial_timeout_ms: u64,
    /// Bound on each tier-2 judge attempt.
    pub judge_timeout_ms: u64,
    /// Retry policy for transient tier-2 failures.
    pub retry: RetryPolicy,
    /// Also invoke the external baseline once per composition.
    pub run_external_baseline: bool,
    /// Bound on each baseline invocation.
    pub baseline_timeout_ms: u64,
    /// Measured durations below this are reported as this value.
    pub min_time_epsilon_secs: f64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            universe: AgentRole::ALL.to_vec(),
            constraints: CompositionConstraints::default(),
            tasks: vec!["default".to_string()],
            repetitions: 3,
            concurrency_limit: 4,
            trial_timeout_ms: 300_000,
            judge_timeout_ms: 60_000,
            retry: RetryPolicy::default(),
            run_external_baseline: false,
            baseline_timeout_ms: 600_000,
            min_time_epsilon_secs: 1e-6,
        }
    }
}

impl SweepConfig {
    pub fn trial_timeout(&self) -> Duration {
        Duration::from_millis(self.trial_timeout_ms)
    }

    pub fn judge_timeout(&self) -> Duration {
        Duration::from_millis(self.judge_timeout_ms)
    }

    pub fn baseline_timeout(&self) -> Duration {
        Duration::from_millis(self.baseline_timeout_ms)
    }

    /// Universe as a canonical, de-duplicated set.
    pub fn universe_set(&self) -> BTreeSet<AgentRole> {
        self.universe.iter().copied().collect()
    }

    /// Check every constraint, returning the first one violated.
    ///
    /// Constraints that merely admit zero compositions (for example an
    /// exclusion that covers every candidate) are caught by the generator.
    pub fn validate(&self) -> ConfigResult<()> {
        let universe = self.universe_set();
        let c = &self.constraints;

        if universe.is_empty() {
            return Err(ConfigurationError::EmptyUniverse);
        }
        if c.min_roles == 0 {
            return Err(ConfigurationError::ZeroMinRoles);
        }
        if c.min_roles > c.max_roles {
            return Err(ConfigurationError::MinExceedsMax {
                min: c.min_roles,
                max: c.max_roles,
            });
        }
        if c.min_roles > universe.len() {
            return Err(ConfigurationError::MinExceedsUniverse {
                min: c.min_roles,
                universe: universe.len(),
            });
        }

        let required: BTreeSet<AgentRole> = c.required.iter().copied().collect();
        if let Some(role) = required.iter().find(|r| !universe.contains(r)) {
            return Err(ConfigurationError::RequiredRoleNotInUniverse { role: *role });
        }
        if required.len() > c.max_roles {
            return Err(ConfigurationError::RequiredExceedsMax {
                required: required.len(),
                max: c.max_roles,
            });
        }
        for combo in &c.excluded {
            if combo.is_empty() {
                return Err(ConfigurationError::EmptyExcludedCombination);
            }
            if combo.iter().all(|r| required.contains(r)) {
                return Err(ConfigurationError::RequiredRolesExcluded {
                    combination: combo
                        .iter()
                        .map(AgentRole::as_str)
                        .collect::<Vec<_>>()
                        .join("+"),
                });
            }
        }

        if self.tasks.is_empty() || self.tasks.iter().any(|t| t.trim().is_empty()) {
            return Err(ConfigurationError::NoTasks);
        }
        if self.repetitions == 0 {
            return Err(ConfigurationError::ZeroRepetitions);
        }
        if self.concurrency_limit == 0 {
            return Err(ConfigurationError::ZeroConcurrency);
        }
        for (field, value) in [
            ("trial_timeout_ms", self.trial_timeout_ms),
            ("judge_timeout_ms", self.judge_timeout_ms),
            ("baseline_timeout_ms", self.baseline_timeout_ms),
        ] {
            if value == 0 {
                return Err(ConfigurationError::ZeroDuration { field });
            }
        }
        if !(self.min_time_epsilon_secs > 0.0 && self.min_time_epsilon_secs.is_finite()) {
            return Err(ConfigurationError::ZeroDuration {
                field: "min_time_epsilon_secs",
            });
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigurationError::ZeroRetryAttempts);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(SweepConfig::default().validate(), Ok(()));
    }

    #[test]
    fn test_min_greater_than_universe() {
        let cfg = SweepConfig {
            universe: vec![AgentRole::Manager, AgentRole::Analyst],
            constraints: CompositionConstraints {
                min_roles: 3,
                max_roles: 4,
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(
            cfg.validate(),
            Err(ConfigurationError::MinExceedsUniverse {
                min: 3,
                universe: 2
            })
        );
    }

    #[test]
    fn test_required_exceeds_max() {
        let cfg = SweepConfig {
            constraints: CompositionConstraints {
                min_roles: 1,
                max_roles: 1,
                required: vec![AgentRole::Manager, AgentRole::Analyst],
                excluded: vec![],
            },
            ..Default::default()
        };
        assert_eq!(
            cfg.validate(),
            Err(ConfigurationError::RequiredExceedsMax {
                required: 2,
                max: 1
            })
        );
    }

    #[test]
    fn test_required_role_outside_universe() {
        let cfg = SweepConfig {
            universe: vec![AgentRole::Manager, AgentRole::Researcher],
            constraints: CompositionConstraints {
                required: vec![AgentRole::Synthesiser],
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(
            cfg.validate(),
            Err(ConfigurationError::RequiredRoleNotInUniverse {
                role: AgentRole::Synthesiser
            })
        );
    }

    #[test]
    fn test_exclusion_of_required_roles_is_rejected() {
        let cfg = SweepConfig {
            constraints: CompositionConstraints {
                required: vec![AgentRole::Manager],
                excluded: vec![vec![AgentRole::Manager]],
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigurationError::RequiredRolesExcluded { .. })
        ));
    }

    #[test]
    fn test_zero_values_are_rejected() {
        let cfg = SweepConfig {
            repetitions: 0,
            ..Default::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigurationError::ZeroRepetitions));

        let cfg = SweepConfig {
            concurrency_limit: 0,
            ..Default::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigurationError::ZeroConcurrency));

        let cfg = SweepConfig {
            trial_timeout_ms: 0,
            ..Default::default()
        };
        assert_eq!(
            cfg.validate(),
            Err(ConfigurationError::ZeroDuration {
                field: "trial_timeout_ms"
            })
        );

        let cfg = SweepConfig {
            tasks: vec![],
            ..Default::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigurationError::NoTasks));
    }

    #[test]
    fn test_partial_toml_style_json_uses_defaults() {
        let cfg: SweepConfig = serde_json::from_str(
            r#"{"repetitions": 5, "constraints": {"min_roles": 2, "required": ["manager"]}}"#,
        )
        .unwrap();
        assert_eq!(cfg.repetitions, 5);
        assert_eq!(cfg.constraints.min_roles, 2);
        assert_eq!(cfg.constraints.max_roles, 4);
        assert_eq!(cfg.universe.len(), 4);
        assert_eq!(cfg.concurrency_limit, 4);
        assert_eq!(cfg.validate(), Ok(()));
    }
}
