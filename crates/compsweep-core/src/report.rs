//! The persisted sweep artifact.
//!
//! The core never writes files; [`SweepReport`] is what an outer layer
//! serializes. Field names are stable across releases of the same
//! `schema_version`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::analyzer::{calculate_statistics, CompositionStats};
use crate::backend::BaselineRecord;
use crate::config::SweepConfig;
use crate::domain::result::TrialResult;
use crate::metrics::MetricsSnapshot;
use crate::runner::SweepOutcome;

pub const SCHEMA_VERSION: &str = "compsweep.report.v1";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepReport {
    pub schema_version: String,
    pub generated_at: DateTime<Utc>,
    pub sweep_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub config: SweepConfig,
    pub compositions: Vec<String>,
    pub trials: Vec<TrialResult>,
    pub stats: Vec<CompositionStats>,
    #[serde(default)]
    pub baselines: Vec<BaselineRecord>,
    pub metrics: MetricsSnapshot,
}

impl SweepReport {
    /// Build a report from a finished sweep, computing statistics.
    pub fn from_outcome(config: SweepConfig, outcome: SweepOutcome) -> Self {
        let stats = calculate_statistics(&outcome.trials);
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            generated_at: Utc::now(),
            sweep_id: outcome.sweep_id,
            started_at: outcome.started_at,
            finished_at: outcome.finished_at,
            config,
            compositions: outcome.compositions,
            trials: outcome.trials,
            stats,
            baselines: outcome.baselines,
            metrics: outcome.metrics,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }

    /// Recompute `stats` from `trials`.
    pub fn refresh_stats(&mut self) {
        self.stats = calculate_statistics(&self.trials);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::composition::AgentComposition;
    use crate::domain::result::{FailureKind, TrialFailure};
    use crate::domain::role::AgentRole;

    fn outcome() -> SweepOutcome {
        let c = AgentComposition::new([AgentRole::Manager, AgentRole::Analyst]).unwrap();
        let now = Utc::now();
        SweepOutcome {
            sweep_id: Uuid::new_v4(),
            started_at: now,
            finished_at: now,
            compositions: vec![c.id().to_string()],
            trials: vec![TrialResult::failed(
                &c,
                "t1",
                0,
                TrialFailure::new(FailureKind::Timeout, "slow"),
                1e-6,
            )],
            baselines: Vec::new(),
            metrics: MetricsSnapshot::default(),
        }
    }

    #[test]
    fn test_report_survives_json() {
        let report = SweepReport::from_outcome(SweepConfig::default(), outcome());
        assert_eq!(report.stats.len(), 1);
        assert_eq!(report.stats[0].timeouts, 1);

        let raw = report.to_json().unwrap();
        let back = SweepReport::from_json(&raw).unwrap();
        assert_eq!(back.schema_version, SCHEMA_VERSION);
        assert_eq!(back.sweep_id, report.sweep_id);
        assert_eq!(back.trials.len(), 1);
        assert!(back.trials[0].is_timeout());
        assert_eq!(back.stats[0].composition_id, report.stats[0].composition_id);
    }

    #[test]
    fn test_refresh_stats() {
        let mut report = SweepReport::from_outcome(SweepConfig::default(), outcome());
        report.stats.clear();
        report.refresh_stats();
        assert_eq!(report.stats[0].composition_id, "manager+analyst");
    }
}
