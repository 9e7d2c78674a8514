//! Tiered evaluation pipeline for one trial.
//!
//! Tier 1 always runs first and is recorded before tiers 2 and 3 are
//! dispatched; tiers 2 and 3 then run concurrently. Plugins registered on
//! the same tier are tried in order until one succeeds. Only the judge tier
//! is retried, and only on transient errors, following the [`RetryPolicy`]
//! schedule through the injected [`Sleeper`].

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::time::Instant;
use tracing::debug;

use crate::config::SweepConfig;
use crate::domain::error::TierError;
use crate::domain::result::{
    ExecutionStats, FailureKind, Tier, TierFailure, TierOutput, TrialFailure, TrialResult,
    TrialStatus,
};
use crate::metrics::SweepMetrics;
use crate::obs;
use crate::plugins::{EvaluationInput, EvaluatorPlugin, PluginRegistry};
use crate::retry::{RetryPolicy, Sleeper, TokioSleeper};

/// Knobs the pipeline needs from the sweep configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub retry: RetryPolicy,
    /// Bound on each tier-2 attempt.
    pub judge_timeout: Duration,
    /// Measured durations below this are reported as this value.
    pub min_time_epsilon_secs: f64,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from_config(&SweepConfig::default())
    }
}

impl PipelineSettings {
    pub fn from_config(config: &SweepConfig) -> Self {
        Self {
            retry: config.retry.clone(),
            judge_timeout: config.judge_timeout(),
            min_time_epsilon_secs: config.min_time_epsilon_secs,
        }
    }

    /// Seconds with microsecond precision, never below the epsilon.
    fn clamp(&self, elapsed: Duration) -> f64 {
        (elapsed.as_micros() as f64 / 1_000_000.0).max(self.min_time_epsilon_secs)
    }
}

/// What happened on one tier during one run.
struct TierOutcome {
    registered: bool,
    output: Option<TierOutput>,
    failure: Option<TierFailure>,
    elapsed: Duration,
}

impl TierOutcome {
    fn skipped() -> Self {
        Self {
            registered: false,
            output: None,
            failure: None,
            elapsed: Duration::ZERO,
        }
    }
}

/// Runs the registered tiers over one trial's output and trace.
///
/// A pipeline is cheap to build; the sweep runner builds one per trial so
/// no state is shared between trials. [`execution_stats`](Self::execution_stats)
/// reports timing from the most recent [`run`](Self::run).
pub struct EvaluationPipeline {
    registry: Arc<PluginRegistry>,
    settings: PipelineSettings,
    sleeper: Arc<dyn Sleeper>,
    metrics: Option<Arc<SweepMetrics>>,
    last_stats: Option<ExecutionStats>,
}

impl EvaluationPipeline {
    pub fn new(
        registry: Arc<PluginRegistry>,
        settings: PipelineSettings,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        Self {
            registry,
            settings,
            sleeper,
            metrics: None,
            last_stats: None,
        }
    }

    /// Pipeline with default settings and a real-time sleeper.
    pub fn with_registry(registry: Arc<PluginRegistry>) -> Self {
        Self::new(registry, PipelineSettings::default(), Arc::new(TokioSleeper))
    }

    /// Count tier-2 retries on `metrics`.
    pub fn with_metrics(mut self, metrics: Arc<SweepMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Timing of the last run, or `None` before the first run.
    pub fn execution_stats(&self) -> Option<ExecutionStats> {
        self.last_stats
    }

    /// Alias of [`execution_stats`](Self::execution_stats).
    pub fn get_execution_stats(&self) -> Option<ExecutionStats> {
        self.execution_stats()
    }

    /// Evaluate one trial.
    pub async fn run(&mut self, input: &EvaluationInput<'_>, repetition: u32) -> TrialResult {
        let started = Instant::now();

        let tier1 = self.run_tier(Tier::Traditional, input).await;
        let (tier2, tier3) = tokio::join!(
            self.run_tier(Tier::LlmJudge, input),
            self.run_tier(Tier::Graph, input),
        );

        let wall = started.elapsed();
        let result = self.assemble(input, repetition, [tier1, tier2, tier3], wall);
        self.last_stats = Some(result.stats);
        result
    }

    async fn run_tier(&self, tier: Tier, input: &EvaluationInput<'_>) -> TierOutcome {
        let plugins = self.registry.get_tier(tier);
        if plugins.is_empty() {
            return TierOutcome::skipped();
        }

        let started = Instant::now();
        let max_attempts = if tier.is_retryable() {
            self.settings.retry.max_attempts.max(1)
        } else {
            1
        };

        let mut last_failure = None;
        for plugin in plugins {
            let mut attempt = 1;
            let err = loop {
                match self.attempt(tier, plugin.as_ref(), input).await {
                    Ok(output) => {
                        debug!(
                            tier = tier.number(),
                            plugin = plugin.name(),
                            attempt,
                            "tier completed"
                        );
                        return TierOutcome {
                            registered: true,
                            output: Some(output),
                            failure: None,
                            elapsed: started.elapsed(),
                        };
                    }
                    Err(err) if err.is_transient() && attempt < max_attempts => {
                        let delay = self.settings.retry.delay_after(attempt);
                        obs::emit_tier_retry(
                            tier,
                            plugin.name(),
                            attempt,
                            delay.as_millis() as u64,
                            &err,
                        );
                        if let Some(metrics) = &self.metrics {
                            metrics.inc_tier2_retries();
                        }
                        self.sleeper.sleep(delay).await;
                        attempt += 1;
                    }
                    Err(err) => break err,
                }
            };
            obs::emit_tier_failed(tier, plugin.name(), attempt, &err);
            last_failure = Some(TierFailure::new(tier, plugin.name(), &err, attempt));
        }

        TierOutcome {
            registered: true,
            output: None,
            failure: last_failure,
            elapsed: started.elapsed(),
        }
    }

    async fn attempt(
        &self,
        tier: Tier,
        plugin: &dyn EvaluatorPlugin,
        input: &EvaluationInput<'_>,
    ) -> Result<TierOutput, TierError> {
        // A panicking plugin fails its own tier only.
        let evaluation = AssertUnwindSafe(plugin.evaluate(input)).catch_unwind();
        let caught = if tier == Tier::LlmJudge {
            let limit = self.settings.judge_timeout;
            tokio::time::timeout(limit, evaluation)
                .await
                .map_err(|_| TierError::Timeout {
                    limit_ms: limit.as_millis() as u64,
                })?
        } else {
            evaluation.await
        };
        let output = caught.map_err(|payload| TierError::Permanent {
            reason: format!(
                "plugin {} panicked: {}",
                plugin.name(),
                panic_message(payload.as_ref())
            ),
        })??;

        if output.tier() != tier {
            return Err(TierError::Permanent {
                reason: format!(
                    "plugin {} returned a tier {} result on tier {}",
                    plugin.name(),
                    output.tier(),
                    tier
                ),
            });
        }
        Ok(output)
    }

    fn assemble(
        &self,
        input: &EvaluationInput<'_>,
        repetition: u32,
        outcomes: [TierOutcome; 3],
        wall: Duration,
    ) -> TrialResult {
        let [o1, o2, o3] = outcomes;
        let stats = {
            let tier1_time = self.settings.clamp(o1.elapsed);
            let tier2_time = self.settings.clamp(o2.elapsed);
            let tier3_time = self.settings.clamp(o3.elapsed);
            ExecutionStats {
                tier1_time,
                tier2_time,
                tier3_time,
                total_time: tier1_time + tier2_time + tier3_time,
                wall_time: self.settings.clamp(wall),
            }
        };

        let registered = [&o1, &o2, &o3].iter().filter(|o| o.registered).count();
        let succeeded = [&o1, &o2, &o3]
            .iter()
            .filter(|o| o.output.is_some())
            .count();

        let tier_failures: Vec<TierFailure> = [&o1, &o2, &o3]
            .iter()
            .filter_map(|o| o.failure.clone())
            .collect();

        let (status, failure) = if registered == 0 {
            (
                TrialStatus::Failed,
                Some(TrialFailure::new(
                    FailureKind::NoTiers,
                    "no evaluator plugins registered",
                )),
            )
        } else if succeeded == registered {
            (TrialStatus::Succeeded, None)
        } else {
            let message = tier_failures
                .iter()
                .map(|f| format!("tier {} ({}): {}", f.tier, f.plugin, f.message))
                .collect::<Vec<_>>()
                .join("; ");
            let status = if succeeded > 0 {
                TrialStatus::Partial
            } else {
                TrialStatus::Failed
            };
            (
                status,
                Some(TrialFailure::new(FailureKind::TierExecution, message)),
            )
        };

        let mut result = TrialResult {
            composition_id: input.composition.id().to_string(),
            roles: input.composition.roles().to_vec(),
            task_id: input.reference.task_id.clone(),
            repetition,
            status,
            tier1: None,
            tier2: None,
            tier3: None,
            tier_failures,
            failure,
            stats,
            agent_time: input.output.elapsed_ms as f64 / 1_000.0,
        };
        for output in [o1.output, o2.output, o3.output].into_iter().flatten() {
            match output {
                TierOutput::Traditional(r) => result.tier1 = Some(r),
                TierOutput::LlmJudge(r) => result.tier2 = Some(r),
                TierOutput::Graph(r) => result.tier3 = Some(r),
            }
        }
        result
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
