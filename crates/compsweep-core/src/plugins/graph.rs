//! Tier 3: coordination structure of the interaction trace.
//!
//! Treats roles as nodes and trace events as directed edges. Pure
//! computation; fails only when the trace is structurally invalid.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::composition::AgentComposition;
use crate::domain::error::{TierError, TierResult};
use crate::domain::result::{Tier, Tier3Result, TierOutput};
use crate::domain::role::AgentRole;
use crate::domain::trace::{ExecutionTrace, InteractionKind};
use crate::plugins::{unit, EvaluationInput, EvaluatorPlugin};

/// Tunables for tier 3.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Tier3Settings {
    /// Role the coordination graph is rooted at, when enabled.
    pub root_role: AgentRole,
    /// Roles that, when enabled, must be reachable from the root.
    pub required_roles: Vec<AgentRole>,
}

impl Default for Tier3Settings {
    fn default() -> Self {
        Self {
            root_role: AgentRole::Manager,
            required_roles: Vec::new(),
        }
    }
}

/// Tier-3 evaluator.
#[derive(Debug, Clone, Default)]
pub struct GraphEvaluatorPlugin {
    settings: Tier3Settings,
}

impl GraphEvaluatorPlugin {
    pub const NAME: &'static str = "graph_evaluator";

    pub fn new(settings: Tier3Settings) -> Self {
        Self { settings }
    }

    /// Compute coordination metrics for `trace` under `composition`.
    pub fn analyze(
        &self,
        composition: &AgentComposition,
        trace: &ExecutionTrace,
    ) -> TierResult<Tier3Result> {
        if trace.is_empty() {
            return Ok(Tier3Result {
                warnings: vec!["empty execution trace; coordination scored as zero".to_string()],
                ..Default::default()
            });
        }

        for event in &trace.events {
            for role in [event.from, event.to] {
                if !composition.contains(role) {
                    return Err(TierError::InvalidTrace {
                        reason: format!(
                            "trace references role {role} outside composition {composition}"
                        ),
                    });
                }
            }
        }

        let mut edges: BTreeMap<AgentRole, BTreeSet<AgentRole>> = BTreeMap::new();
        let mut delegations: BTreeMap<AgentRole, BTreeSet<AgentRole>> = BTreeMap::new();
        let mut activity: BTreeMap<AgentRole, u32> = BTreeMap::new();
        for event in &trace.events {
            *activity.entry(event.from).or_insert(0) += 1;
            if event.to != event.from {
                *activity.entry(event.to).or_insert(0) += 1;
            }
            edges.entry(event.from).or_default().insert(event.to);
            if event.kind == InteractionKind::Delegation {
                delegations.entry(event.from).or_default().insert(event.to);
            }
        }

        let root = if composition.contains(self.settings.root_role) {
            self.settings.root_role
        } else {
            trace.events[0].from
        };

        let reachable = bfs_depths(&edges, root);
        for required in &self.settings.required_roles {
            if composition.contains(*required) && !reachable.contains_key(required) {
                return Err(TierError::InvalidTrace {
                    reason: format!("required role {required} is disconnected from {root}"),
                });
            }
        }

        let delegation_depth = bfs_depths(&delegations, root)
            .values()
            .copied()
            .max()
            .unwrap_or(0);
        let max_fan_out = edges
            .iter()
            .map(|(from, tos)| tos.iter().filter(|to| *to != from).count() as u32)
            .max()
            .unwrap_or(0);

        let active: BTreeSet<AgentRole> = activity.keys().copied().collect();
        let role_utilization = active.len() as f64 / composition.len() as f64;
        let connectivity =
            active.iter().filter(|r| reachable.contains_key(r)).count() as f64 / active.len() as f64;

        let counts: Vec<f64> = composition
            .roles()
            .iter()
            .map(|r| f64::from(activity.get(r).copied().unwrap_or(0)))
            .collect();
        let utilization_balance = balance(&counts);

        let overall_score =
            unit((role_utilization + utilization_balance + connectivity) / 3.0);

        Ok(Tier3Result {
            delegation_depth,
            max_fan_out,
            message_count: trace.events.len() as u32,
            role_utilization: unit(role_utilization),
            utilization_balance,
            connectivity: unit(connectivity),
            overall_score,
            warnings: Vec::new(),
        })
    }
}

#[async_trait]
impl EvaluatorPlugin for GraphEvaluatorPlugin {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn tier(&self) -> Tier {
        Tier::Graph
    }

    async fn evaluate(&self, input: &EvaluationInput<'_>) -> TierResult<TierOutput> {
        self.analyze(input.composition, input.trace)
            .map(TierOutput::Graph)
    }
}

/// Shortest hop count from `root` to every reachable node.
fn bfs_depths(
    edges: &BTreeMap<AgentRole, BTreeSet<AgentRole>>,
    root: AgentRole,
) -> BTreeMap<AgentRole, u32> {
    let mut depths = BTreeMap::from([(root, 0u32)]);
    let mut queue = VecDeque::from([root]);
    while let Some(node) = queue.pop_front() {
        let depth = depths[&node];
        for next in edges.get(&node).into_iter().flatten() {
            if !depths.contains_key(next) {
                depths.insert(*next, depth + 1);
                queue.push_back(*next);
            }
        }
    }
    depths
}

/// 1 minus the coefficient of variation, clamped to [0, 1].
fn balance(counts: &[f64]) -> f64 {
    if counts.is_empty() {
        return 0.0;
    }
    let n = counts.len() as f64;
    let mean = counts.iter().sum::<f64>() / n;
    if mean <= 0.0 {
        return 0.0;
    }
    let var = counts.iter().map(|c| (c - mean).powi(2)).sum::<f64>() / n;
    unit(1.0 - var.sqrt() / mean)
}
