//! Composition generation properties and fail-fast configuration errors.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use compsweep_core::{
    generate_all_compositions, AgentBackend, AgentComposition, AgentError, AgentRole, AgentRun,
    CompositionConstraints, ConfigurationError, PluginRegistry, SweepConfig, SweepError,
    SweepRunner, TaskInput, TraditionalMetricsPlugin,
};

fn config(min: usize, max: usize, required: &[AgentRole]) -> SweepConfig {
    SweepConfig {
        constraints: CompositionConstraints {
            min_roles: min,
            max_roles: max,
            required: required.to_vec(),
            excluded: vec![],
        },
        ..Default::default()
    }
}

fn ids(comps: &[AgentComposition]) -> Vec<String> {
    comps.iter().map(|c| c.id().to_string()).collect()
}

#[test]
fn test_manager_pairs_scenario() {
    let comps = generate_all_compositions(&config(2, 2, &[AgentRole::Manager])).unwrap();
    assert_eq!(comps.len(), 3);
    assert_eq!(
        ids(&comps),
        vec!["manager+researcher", "manager+analyst", "manager+synthesiser"]
    );
}

#[test]
fn test_bounds_and_required_roles_hold_for_every_valid_config() {
    let required_options: Vec<Vec<AgentRole>> = vec![
        vec![],
        vec![AgentRole::Manager],
        vec![AgentRole::Analyst, AgentRole::Synthesiser],
    ];
    for min in 1..=4 {
        for max in min..=4 {
            for required in &required_options {
                let cfg = config(min, max, required);
                let Ok(comps) = generate_all_compositions(&cfg) else {
                    continue;
                };
                assert!(!comps.is_empty());
                for c in &comps {
                    assert!(c.len() >= min && c.len() <= max, "{c} outside [{min}, {max}]");
                    assert!(c.contains_all(required), "{c} misses a required role");
                }
                let mut unique = ids(&comps);
                unique.sort();
                unique.dedup();
                assert_eq!(unique.len(), comps.len(), "duplicates for {cfg:?}");

                // Deterministic across calls.
                assert_eq!(generate_all_compositions(&cfg).unwrap(), comps);
            }
        }
    }
}

#[test]
fn test_identifier_is_order_independent() {
    let a = AgentComposition::new([AgentRole::Synthesiser, AgentRole::Manager]).unwrap();
    let b = AgentComposition::new([AgentRole::Manager, AgentRole::Synthesiser]).unwrap();
    assert_eq!(a.id(), b.id());
    assert_eq!(a.fingerprint(), b.fingerprint());
}

#[test]
fn test_min_roles_beyond_universe_is_rejected() {
    let mut cfg = config(3, 4, &[]);
    cfg.universe = vec![AgentRole::Manager, AgentRole::Researcher];
    let err = generate_all_compositions(&cfg).unwrap_err();
    assert_eq!(
        err,
        ConfigurationError::MinExceedsUniverse {
            min: 3,
            universe: 2
        }
    );
}

#[test]
fn test_required_roles_conflicting_with_max_is_rejected() {
    let cfg = config(
        1,
        1,
        &[AgentRole::Manager, AgentRole::Researcher],
    );
    let err = generate_all_compositions(&cfg).unwrap_err();
    assert!(matches!(err, ConfigurationError::RequiredExceedsMax { required: 2, max: 1 }));
    assert!(err.to_string().contains("max_roles (1)"));
}

struct CountingAgent {
    calls: AtomicU32,
}

#[async_trait]
impl AgentBackend for CountingAgent {
    async fn execute(
        &self,
        _composition: &AgentComposition,
        _task: &TaskInput,
    ) -> Result<AgentRun, AgentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(AgentRun::default())
    }
}

#[tokio::test]
async fn test_invalid_config_fails_before_any_trial() {
    let agent = Arc::new(CountingAgent {
        calls: AtomicU32::new(0),
    });
    let mut registry = PluginRegistry::new();
    registry.register(TraditionalMetricsPlugin::default());
    let runner = SweepRunner::new(Arc::new(registry), agent.clone());

    let mut cfg = config(2, 2, &[AgentRole::Manager]);
    cfg.constraints.excluded = vec![vec![AgentRole::Manager]];
    let err = runner.run_sweep(cfg).await.unwrap_err();
    assert!(matches!(
        err,
        SweepError::Configuration(ConfigurationError::RequiredRolesExcluded { .. })
    ));

    let mut cfg = config(1, 2, &[]);
    cfg.repetitions = 0;
    let err = runner.run_sweep(cfg).await.unwrap_err();
    assert!(err.to_string().contains("repetitions"));

    assert_eq!(agent.calls.load(Ordering::SeqCst), 0);
}
