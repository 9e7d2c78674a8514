//! Composition generation.
//!
//! Enumerates every subset of the role universe that satisfies the sweep's
//! constraints, ordered by ascending size and then lexicographically by
//! canonical role order.

use std::collections::BTreeSet;

use tracing::debug;

use crate::config::SweepConfig;
use crate::domain::composition::AgentComposition;
use crate::domain::error::{ConfigResult, ConfigurationError};
use crate::domain::role::AgentRole;

/// Generate every valid composition for `config`.
///
/// Fails with a [`ConfigurationError`] when the configuration is invalid or
/// when the constraints admit zero compositions. Output is deterministic for
/// identical configs.
pub fn generate_all_compositions(config: &SweepConfig) -> ConfigResult<Vec<AgentComposition>> {
    config.validate()?;

    let universe: Vec<AgentRole> = config.universe_set().into_iter().collect();
    let c = &config.constraints;
    let max = c.max_roles.min(universe.len());
    let required: BTreeSet<AgentRole> = c.required.iter().copied().collect();

    let mut out = Vec::new();
    for size in c.min_roles..=max {
        for subset in combinations(&universe, size) {
            if !required.iter().all(|r| subset.contains(r)) {
                continue;
            }
            if c
                .excluded
                .iter()
                .any(|combo| combo.iter().all(|r| subset.contains(r)))
            {
                continue;
            }
            // Non-empty because size >= min_roles >= 1.
            if let Ok(composition) = AgentComposition::new(subset) {
                out.push(composition);
            }
        }
    }

    if out.is_empty() {
        return Err(ConfigurationError::NoValidCompositions);
    }

    debug!(count = out.len(), "generated compositions");
    Ok(out)
}

/// All `k`-element subsets of `items`, in lexicographic index order.
fn combinations<T: Copy>(items: &[T], k: usize) -> Vec<Vec<T>> {
    let n = items.len();
    if k == 0 || k > n {
        return Vec::new();
    }

    let mut out = Vec::new();
    let mut idx: Vec<usize> = (0..k).collect();
    loop {
        out.push(idx.iter().map(|&i| items[i]).collect());

        // Rightmost index that can still advance.
        let mut i = k;
        while i > 0 && idx[i - 1] == n - k + (i - 1) {
            i -= 1;
        }
        if i == 0 {
            break;
        }
        idx[i - 1] += 1;
        for j in i..k {
            idx[j] = idx[j - 1] + 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompositionConstraints;

    fn ids(comps: &[AgentComposition]) -> Vec<&str> {
        comps.iter().map(AgentComposition::id).collect()
    }

    #[test]
    fn test_combinations_counts() {
        let items = [1, 2, 3, 4];
        assert_eq!(combinations(&items, 1).len(), 4);
        assert_eq!(combinations(&items, 2).len(), 6);
        assert_eq!(combinations(&items, 4).len(), 1);
        assert!(combinations(&items, 5).is_empty());
        assert_eq!(combinations(&items, 2)[0], vec![1, 2]);
        assert_eq!(combinations(&items, 2)[5], vec![3, 4]);
    }

    #[test]
    fn test_full_universe_yields_fifteen() {
        let comps = generate_all_compositions(&SweepConfig::default()).unwrap();
        assert_eq!(comps.len(), 15);
        assert_eq!(comps[0].id(), "manager");
        assert_eq!(comps[14].id(), "manager+researcher+analyst+synthesiser");
        // ascending size
        assert!(comps.windows(2).all(|w| w[0].len() <= w[1].len()));
    }

    #[test]
    fn test_required_manager_pairs() {
        let cfg = SweepConfig {
            constraints: CompositionConstraints {
                min_roles: 2,
                max_roles: 2,
                required: vec![AgentRole::Manager],
                excluded: vec![],
            },
            ..Default::default()
        };
        let comps = generate_all_compositions(&cfg).unwrap();
        assert_eq!(
            ids(&comps),
            vec!["manager+researcher", "manager+analyst", "manager+synthesiser"]
        );
    }

    #[test]
    fn test_excluded_combination_is_filtered() {
        let cfg = SweepConfig {
            constraints: CompositionConstraints {
                min_roles: 2,
                max_roles: 3,
                required: vec![AgentRole::Manager],
                excluded: vec![vec![AgentRole::Researcher, AgentRole::Analyst]],
            },
            ..Default::default()
        };
        let comps = generate_all_compositions(&cfg).unwrap();
        assert!(comps
            .iter()
            .all(|c| !(c.contains(AgentRole::Researcher) && c.contains(AgentRole::Analyst))));
        assert_eq!(
            ids(&comps),
            vec![
                "manager+researcher",
                "manager+analyst",
                "manager+synthesiser",
                "manager+researcher+synthesiser",
                "manager+analyst+synthesiser",
            ]
        );
    }

    #[test]
    fn test_exclusions_covering_everything_fail() {
        let cfg = SweepConfig {
            universe: vec![AgentRole::Manager, AgentRole::Analyst],
            constraints: CompositionConstraints {
                min_roles: 2,
                max_roles: 2,
                required: vec![],
                excluded: vec![vec![AgentRole::Analyst]],
            },
            ..Default::default()
        };
        assert_eq!(
            generate_all_compositions(&cfg),
            Err(ConfigurationError::NoValidCompositions)
        );
    }

    #[test]
    fn test_duplicate_universe_entries_are_ignored() {
        let cfg = SweepConfig {
            universe: vec![AgentRole::Analyst, AgentRole::Manager, AgentRole::Analyst],
            ..Default::default()
        };
        let comps = generate_all_compositions(&cfg).unwrap();
        assert_eq!(ids(&comps), vec!["manager", "analyst", "manager+analyst"]);
    }
}
