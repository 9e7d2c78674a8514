//! Statistics and markdown summaries over finished trials.
//!
//! Pure and stateless: the same trial list always yields the same stats
//! and the same text. Failed trials count towards totals and success rate
//! but never towards score aggregates.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::backend::{BaselineRecord, BaselineStatus};
use crate::domain::result::{Tier, TrialResult, TrialStatus};
use crate::domain::role::AgentRole;

/// Mean and sample standard deviation of a set of scores.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreSummary {
    pub mean: f64,
    /// Sample standard deviation (n - 1); zero for a single sample.
    pub std_dev: f64,
    pub count: usize,
}

impl ScoreSummary {
    /// `None` for an empty sample.
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let n = samples.len() as f64;
        let mean = samples.iter().sum::<f64>() / n;
        let std_dev = if samples.len() > 1 {
            (samples.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt()
        } else {
            0.0
        };
        Some(Self {
            mean,
            std_dev,
            count: samples.len(),
        })
    }
}

/// Aggregated view over every trial of one composition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositionStats {
    pub composition_id: String,
    pub roles: Vec<AgentRole>,
    pub trials: usize,
    pub succeeded: usize,
    pub partial: usize,
    pub failed: usize,
    pub timeouts: usize,
    /// (succeeded + partial) / trials.
    pub success_rate: f64,
    pub tier1: Option<ScoreSummary>,
    pub tier2: Option<ScoreSummary>,
    pub tier3: Option<ScoreSummary>,
    /// Per-trial mean of the available tier scores.
    pub composite: Option<ScoreSummary>,
    /// Mean pipeline time over scored trials, in seconds.
    pub mean_total_time: Option<f64>,
    /// Mean agent execution time over scored trials, in seconds.
    pub mean_agent_time: Option<f64>,
}

impl CompositionStats {
    pub fn tier_summary(&self, tier: Tier) -> Option<&ScoreSummary> {
        match tier {
            Tier::Traditional => self.tier1.as_ref(),
            Tier::LlmJudge => self.tier2.as_ref(),
            Tier::Graph => self.tier3.as_ref(),
        }
    }

    pub fn tier1_mean(&self) -> Option<f64> {
        self.tier1.map(|s| s.mean)
    }

    pub fn composite_mean(&self) -> Option<f64> {
        self.composite.map(|s| s.mean)
    }

    /// Whether the success rate falls below `threshold`.
    pub fn is_unreliable(&self, threshold: f64) -> bool {
        self.success_rate < threshold
    }
}

/// Group `trials` by composition, in order of first appearance.
pub fn calculate_statistics(trials: &[TrialResult]) -> Vec<CompositionStats> {
    let mut order: Vec<&str> = Vec::new();
    let mut groups: HashMap<&str, Vec<&TrialResult>> = HashMap::new();
    for trial in trials {
        let id = trial.composition_id.as_str();
        groups
            .entry(id)
            .or_insert_with(|| {
                order.push(id);
                Vec::new()
            })
            .push(trial);
    }

    order
        .into_iter()
        .filter_map(|id| groups.get(id).map(|group| stats_for(id, group)))
        .collect()
}

fn stats_for(id: &str, group: &[&TrialResult]) -> CompositionStats {
    let count = |status: TrialStatus| group.iter().filter(|t| t.status == status).count();
    let succeeded = count(TrialStatus::Succeeded);
    let partial = count(TrialStatus::Partial);
    let failed = count(TrialStatus::Failed);
    let timeouts = group.iter().filter(|t| t.is_timeout()).count();

    let scored: Vec<&TrialResult> = group
        .iter()
        .copied()
        .filter(|t| t.status.is_scored())
        .collect();
    let tier = |tier: Tier| {
        let samples: Vec<f64> = scored.iter().filter_map(|t| t.tier_score(tier)).collect();
        ScoreSummary::from_samples(&samples)
    };
    let composite: Vec<f64> = scored.iter().filter_map(|t| t.composite_score()).collect();
    let mean_of = |values: Vec<f64>| ScoreSummary::from_samples(&values).map(|s| s.mean);

    CompositionStats {
        composition_id: id.to_string(),
        roles: group.first().map(|t| t.roles.clone()).unwrap_or_default(),
        trials: group.len(),
        succeeded,
        partial,
        failed,
        timeouts,
        success_rate: if group.is_empty() {
            0.0
        } else {
            (succeeded + partial) as f64 / group.len() as f64
        },
        tier1: tier(Tier::Traditional),
        tier2: tier(Tier::LlmJudge),
        tier3: tier(Tier::Graph),
        composite: ScoreSummary::from_samples(&composite),
        mean_total_time: mean_of(scored.iter().map(|t| t.stats.total_time).collect()),
        mean_agent_time: mean_of(scored.iter().map(|t| t.agent_time).collect()),
    }
}

/// Higher composite mean first, then lower mean time, then composition id.
/// Missing values sort last.
pub fn rank_compositions(stats: &[CompositionStats]) -> Vec<&CompositionStats> {
    let mut ranked: Vec<&CompositionStats> = stats.iter().collect();
    ranked.sort_by(|a, b| {
        desc_none_last(a.composite_mean(), b.composite_mean())
            .then_with(|| asc_none_last(a.mean_total_time, b.mean_total_time))
            .then_with(|| a.composition_id.cmp(&b.composition_id))
    });
    ranked
}

fn desc_none_last(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.total_cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn asc_none_last(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Rendering options for [`generate_markdown_summary`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryOptions {
    /// Compositions whose success rate is below this are listed as unreliable.
    pub unreliable_threshold: f64,
}

impl Default for SummaryOptions {
    fn default() -> Self {
        Self {
            unreliable_threshold: 0.8,
        }
    }
}

fn fmt_summary(summary: Option<&ScoreSummary>) -> String {
    match summary {
        Some(s) => format!("{:.3} ± {:.3}", s.mean, s.std_dev),
        None => "n/a".to_string(),
    }
}

fn fmt_opt(value: Option<f64>, precision: usize) -> String {
    match value {
        Some(v) => format!("{v:.precision$}"),
        None => "n/a".to_string(),
    }
}

fn pct(rate: f64) -> String {
    format!("{:.1}%", rate * 100.0)
}

/// Ranked markdown table plus an unreliable-composition section.
pub fn generate_markdown_summary(stats: &[CompositionStats], options: &SummaryOptions) -> String {
    let mut out = String::from("# Composition Sweep Summary\n\n");
    if stats.is_empty() {
        out.push_str("No trials were recorded.\n");
        return out;
    }

    let ranked = rank_compositions(stats);
    out.push_str(
        "| Rank | Composition | Roles | Trials | Success | Composite | Tier 1 | Tier 2 | Tier 3 | Mean time (s) |\n",
    );
    out.push_str("|---:|---|---:|---:|---:|---|---|---|---|---:|\n");
    for (i, s) in ranked.iter().enumerate() {
        let tiers = Tier::ALL
            .iter()
            .map(|t| fmt_summary(s.tier_summary(*t)))
            .collect::<Vec<_>>()
            .join(" | ");
        let _ = writeln!(
            out,
            "| {} | `{}` | {} | {} | {} | {} | {} | {} |",
            i + 1,
            s.composition_id,
            s.roles.len(),
            s.trials,
            pct(s.success_rate),
            fmt_summary(s.composite.as_ref()),
            tiers,
            fmt_opt(s.mean_total_time, 3),
        );
    }

    let threshold = options.unreliable_threshold;
    out.push_str("\n## Unreliable compositions\n\n");
    let unreliable: Vec<&&CompositionStats> = ranked
        .iter()
        .filter(|s| s.is_unreliable(threshold))
        .collect();
    if unreliable.is_empty() {
        let _ = writeln!(
            out,
            "None. Every composition met the {} success threshold.",
            pct(threshold)
        );
    } else {
        let _ = writeln!(
            out,
            "Compositions with a success rate below {}:\n",
            pct(threshold)
        );
        for s in unreliable {
            let _ = writeln!(
                out,
                "- `{}`: {} ({} of {} trials scored, {} failed, {} timed out)",
                s.composition_id,
                pct(s.success_rate),
                s.succeeded + s.partial,
                s.trials,
                s.failed,
                s.timeouts,
            );
        }
    }

    if let Some(best) = ranked.first().filter(|s| s.composite.is_some()) {
        let _ = writeln!(
            out,
            "\n**Best composition:** `{}` (composite {})",
            best.composition_id,
            fmt_opt(best.composite_mean(), 3),
        );
    }
    out
}

/// Baseline score next to the sweep's composite score per composition.
pub fn render_baseline_comparison(
    stats: &[CompositionStats],
    baselines: &[BaselineRecord],
) -> String {
    let mut out = String::from("## Baseline comparison\n\n");
    if baselines.is_empty() {
        out.push_str("No baseline runs were recorded.\n");
        return out;
    }

    let by_id: HashMap<&str, &CompositionStats> = stats
        .iter()
        .map(|s| (s.composition_id.as_str(), s))
        .collect();

    out.push_str("| Composition | Sweep composite | Baseline | Baseline score | Delta |\n");
    out.push_str("|---|---:|---|---:|---:|\n");
    for b in baselines {
        let sweep = by_id
            .get(b.composition_id.as_str())
            .and_then(|s| s.composite_mean());
        let status = match b.status {
            BaselineStatus::Succeeded => "succeeded",
            BaselineStatus::Failed => "failed",
            BaselineStatus::Timeout => "timeout",
        };
        let delta = match (sweep, b.score) {
            (Some(s), Some(base)) => format!("{:+.3}", s - base),
            _ => "n/a".to_string(),
        };
        let _ = writeln!(
            out,
            "| `{}` | {} | {} | {} | {} |",
            b.composition_id,
            fmt_opt(sweep, 3),
            status,
            fmt_opt(b.score, 3),
            delta,
        );
    }
    out
}
