//! Sweep runner: compositions × tasks × repetitions over a bounded pool.
//!
//! Every trial is spawned onto a [`JoinSet`] and waits for a permit from a
//! semaphore sized to `concurrency_limit`, so at most that many trials run
//! at once. Each trial carries its own timeout and panic guard; a failing
//! trial is recorded and never affects its siblings. The join set is the
//! single collection point for finished trials.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{warn, Instrument};
use uuid::Uuid;

use crate::backend::{
    AgentBackend, BaselineInvoker, BaselineRecord, BaselineRequest, BaselineStatus,
    InMemoryReferences, ReferenceSource,
};
use crate::config::SweepConfig;
use crate::domain::composition::AgentComposition;
use crate::domain::error::{BaselineError, ConfigurationError, Result};
use crate::domain::result::{FailureKind, TrialFailure, TrialResult, TrialStatus};
use crate::domain::trace::{ReferenceData, TaskInput};
use crate::generator::generate_all_compositions;
use crate::metrics::{MetricsSnapshot, SweepMetrics};
use crate::obs;
use crate::pipeline::{panic_message, EvaluationPipeline, PipelineSettings};
use crate::plugins::{EvaluationInput, PluginRegistry};
use crate::retry::{Sleeper, TokioSleeper};

/// Everything a finished sweep produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepOutcome {
    pub sweep_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Composition ids in generation order.
    pub compositions: Vec<String>,
    /// One record per (composition, task, repetition), in generation order.
    pub trials: Vec<TrialResult>,
    /// One record per composition when the external baseline was requested.
    pub baselines: Vec<BaselineRecord>,
    pub metrics: MetricsSnapshot,
}

/// Orchestrates trials against a read-only plugin registry.
///
/// The registry is shared behind an `Arc`, so it cannot be mutated while a
/// sweep holds it.
pub struct SweepRunner {
    registry: Arc<PluginRegistry>,
    agent: Arc<dyn AgentBackend>,
    references: Arc<dyn ReferenceSource>,
    baseline: Option<Arc<dyn BaselineInvoker>>,
    sleeper: Arc<dyn Sleeper>,
}

impl SweepRunner {
    pub fn new(registry: Arc<PluginRegistry>, agent: Arc<dyn AgentBackend>) -> Self {
        Self {
            registry,
            agent,
            references: Arc::new(InMemoryReferences::new()),
            baseline: None,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    pub fn with_references(mut self, references: Arc<dyn ReferenceSource>) -> Self {
        self.references = references;
        self
    }

    pub fn with_baseline(mut self, baseline: Arc<dyn BaselineInvoker>) -> Self {
        self.baseline = Some(baseline);
        self
    }

    /// Replace the retry sleeper (tests use a recording stub).
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    /// Run every trial the configuration describes.
    ///
    /// Fails only with [`SweepError::Configuration`](crate::SweepError::Configuration),
    /// before any trial starts. Trial, tier and baseline failures are
    /// recorded in the outcome.
    pub async fn run_sweep(&self, config: SweepConfig) -> Result<SweepOutcome> {
        config.validate()?;
        if self.registry.is_empty() {
            return Err(ConfigurationError::EmptyRegistry.into());
        }
        if config.run_external_baseline && self.baseline.is_none() {
            return Err(ConfigurationError::MissingBaselineInvoker.into());
        }
        let compositions = generate_all_compositions(&config)?;

        let sweep_id = Uuid::new_v4();
        let span = obs::sweep_span(&sweep_id.to_string());
        Ok(self
            .execute(sweep_id, config, compositions)
            .instrument(span)
            .await)
    }

    async fn execute(
        &self,
        sweep_id: Uuid,
        config: SweepConfig,
        compositions: Vec<AgentComposition>,
    ) -> SweepOutcome {
        let started_at = Utc::now();
        let clock = Instant::now();
        let metrics = Arc::new(SweepMetrics::new());
        let semaphore = Arc::new(Semaphore::new(config.concurrency_limit));
        let settings = PipelineSettings::from_config(&config);
        let epsilon = config.min_time_epsilon_secs;

        let mut slots = Vec::new();
        for composition in &compositions {
            for task_id in &config.tasks {
                for repetition in 0..config.repetitions {
                    slots.push((composition.clone(), task_id.clone(), repetition));
                }
            }
        }

        obs::emit_sweep_started(
            &sweep_id.to_string(),
            compositions.len(),
            slots.len(),
            config.concurrency_limit,
        );

        let mut trial_set = JoinSet::new();
        for (index, (composition, task_id, repetition)) in slots.iter().cloned().enumerate() {
            let ctx = TrialContext {
                registry: Arc::clone(&self.registry),
                agent: Arc::clone(&self.agent),
                references: Arc::clone(&self.references),
                sleeper: Arc::clone(&self.sleeper),
                metrics: Arc::clone(&metrics),
                settings: settings.clone(),
                trial_timeout: config.trial_timeout(),
            };
            let semaphore = Arc::clone(&semaphore);
            let span = obs::trial_span(composition.id(), &task_id, repetition);
            trial_set.spawn(
                async move {
                    let _permit = semaphore.acquire_owned().await.ok();
                    ctx.metrics.inc_trials_started();
                    (index, ctx.run(composition, task_id, repetition).await)
                }
                .instrument(span),
            );
        }

        let mut baseline_set = JoinSet::new();
        if config.run_external_baseline {
            if let Some(invoker) = &self.baseline {
                for (index, composition) in compositions.iter().enumerate() {
                    let invoker = Arc::clone(invoker);
                    let semaphore = Arc::clone(&semaphore);
                    let request = BaselineRequest::new(composition, &config.tasks);
                    let limit = config.baseline_timeout();
                    baseline_set.spawn(async move {
                        let _permit = semaphore.acquire_owned().await.ok();
                        (index, invoke_baseline(invoker, request, limit).await)
                    });
                }
            }
        }

        let mut collected: Vec<Option<TrialResult>> = vec![None; slots.len()];
        while let Some(joined) = trial_set.join_next().await {
            match joined {
                Ok((index, trial)) => {
                    metrics.record_trial(&trial);
                    obs::emit_trial_finished(&trial);
                    collected[index] = Some(trial);
                }
                Err(e) => warn!(error = %e, "trial task did not complete"),
            }
        }

        let trials: Vec<TrialResult> = collected
            .into_iter()
            .zip(&slots)
            .map(|(trial, (composition, task_id, repetition))| {
                trial.unwrap_or_else(|| {
                    let trial = TrialResult::failed(
                        composition,
                        task_id,
                        *repetition,
                        TrialFailure::new(FailureKind::Panic, "trial task aborted"),
                        epsilon,
                    );
                    metrics.record_trial(&trial);
                    trial
                })
            })
            .collect();

        let mut baseline_slots: Vec<Option<BaselineRecord>> = vec![None; compositions.len()];
        while let Some(joined) = baseline_set.join_next().await {
            match joined {
                Ok((index, record)) => {
                    if record.status != BaselineStatus::Succeeded {
                        metrics.inc_baseline_failures();
                    }
                    baseline_slots[index] = Some(record);
                }
                Err(e) => warn!(error = %e, "baseline task did not complete"),
            }
        }
        let baselines: Vec<BaselineRecord> = baseline_slots.into_iter().flatten().collect();

        let failed = trials
            .iter()
            .filter(|t| t.status == TrialStatus::Failed)
            .count();
        let snapshot = metrics.flush(&sweep_id.to_string());
        obs::emit_sweep_finished(
            &sweep_id.to_string(),
            clock.elapsed().as_millis() as u64,
            trials.len(),
            failed,
        );

        SweepOutcome {
            sweep_id,
            started_at,
            finished_at: Utc::now(),
            compositions: compositions.iter().map(|c| c.id().to_string()).collect(),
            trials,
            baselines,
            metrics: snapshot,
        }
    }
}

/// Owned handles one spawned trial needs.
struct TrialContext {
    registry: Arc<PluginRegistry>,
    agent: Arc<dyn AgentBackend>,
    references: Arc<dyn ReferenceSource>,
    sleeper: Arc<dyn Sleeper>,
    metrics: Arc<SweepMetrics>,
    settings: PipelineSettings,
    trial_timeout: Duration,
}

impl TrialContext {
    async fn run(
        &self,
        composition: AgentComposition,
        task_id: String,
        repetition: u32,
    ) -> TrialResult {
        let epsilon = self.settings.min_time_epsilon_secs;
        let work =
            AssertUnwindSafe(self.evaluate(&composition, &task_id, repetition)).catch_unwind();

        match tokio::time::timeout(self.trial_timeout, work).await {
            Ok(Ok(result)) => result,
            Ok(Err(payload)) => TrialResult::failed(
                &composition,
                &task_id,
                repetition,
                TrialFailure::new(
                    FailureKind::Panic,
                    format!("trial panicked: {}", panic_message(payload.as_ref())),
                ),
                epsilon,
            ),
            Err(_) => TrialResult::failed(
                &composition,
                &task_id,
                repetition,
                TrialFailure::new(
                    FailureKind::Timeout,
                    format!("trial exceeded {}ms", self.trial_timeout.as_millis()),
                ),
                epsilon,
            ),
        }
    }

    async fn evaluate(
        &self,
        composition: &AgentComposition,
        task_id: &str,
        repetition: u32,
    ) -> TrialResult {
        let task = TaskInput {
            task_id: task_id.to_string(),
            repetition,
        };

        let started = tokio::time::Instant::now();
        let mut run = match self.agent.execute(composition, &task).await {
            Ok(run) => run,
            Err(e) => {
                warn!(error = %e, "agent backend failed");
                return TrialResult::failed(
                    composition,
                    task_id,
                    repetition,
                    TrialFailure::new(FailureKind::AgentExecution, e.to_string()),
                    self.settings.min_time_epsilon_secs,
                );
            }
        };
        if run.output.elapsed_ms == 0 {
            run.output.elapsed_ms = started.elapsed().as_millis() as u64;
        }

        let reference = self
            .references
            .reference(task_id)
            .unwrap_or_else(|| ReferenceData::missing(task_id));

        let mut pipeline = EvaluationPipeline::new(
            Arc::clone(&self.registry),
            self.settings.clone(),
            Arc::clone(&self.sleeper),
        )
        .with_metrics(Arc::clone(&self.metrics));

        pipeline
            .run(
                &EvaluationInput {
                    composition,
                    output: &run.output,
                    reference: &reference,
                    trace: &run.trace,
                },
                repetition,
            )
            .await
    }
}

async fn invoke_baseline(
    invoker: Arc<dyn BaselineInvoker>,
    request: BaselineRequest,
    limit: Duration,
) -> BaselineRecord {
    let started = Instant::now();
    let outcome = match tokio::time::timeout(limit, invoker.invoke(&request)).await {
        Ok(result) => result,
        Err(_) => Err(BaselineError::Timeout {
            limit_ms: limit.as_millis() as u64,
        }),
    };
    let elapsed_secs = started.elapsed().as_secs_f64();

    let record = match outcome {
        Ok(output) => BaselineRecord {
            composition_id: request.composition_id,
            status: BaselineStatus::Succeeded,
            score: output.score,
            output: output.output,
            error: None,
            elapsed_secs,
        },
        Err(e) => {
            warn!(composition = %request.composition_id, error = %e, "baseline invocation failed");
            BaselineRecord {
                composition_id: request.composition_id,
                status: if matches!(e, BaselineError::Timeout { .. }) {
                    BaselineStatus::Timeout
                } else {
                    BaselineStatus::Failed
                },
                score: None,
                output: String::new(),
                error: Some(e.to_string()),
                elapsed_secs,
            }
        }
    };
    obs::emit_baseline_finished(
        &record.composition_id,
        record.status == BaselineStatus::Succeeded,
        record.elapsed_secs,
    );
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::AgentError;
    use crate::domain::trace::AgentRun;
    use crate::plugins::TraditionalMetricsPlugin;
    use crate::SweepError;
    use async_trait::async_trait;

    struct EchoAgent;

    #[async_trait]
    impl AgentBackend for EchoAgent {
        async fn execute(
            &self,
            composition: &AgentComposition,
            _task: &TaskInput,
        ) -> std::result::Result<AgentRun, AgentError> {
            Ok(AgentRun {
                output: crate::domain::trace::AgentOutput::new(
                    format!("review produced by {composition}"),
                    5,
                ),
                ..Default::default()
            })
        }
    }

    fn runner(registry: PluginRegistry) -> SweepRunner {
        SweepRunner::new(Arc::new(registry), Arc::new(EchoAgent))
    }

    #[tokio::test]
    async fn test_empty_registry_is_configuration_error() {
        let err = runner(PluginRegistry::new())
            .run_sweep(SweepConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SweepError::Configuration(ConfigurationError::EmptyRegistry)
        ));
    }

    #[tokio::test]
    async fn test_baseline_requested_without_invoker() {
        let mut registry = PluginRegistry::new();
        registry.register(TraditionalMetricsPlugin::default());
        let config = SweepConfig {
            run_external_baseline: true,
            ..Default::default()
        };
        let err = runner(registry).run_sweep(config).await.unwrap_err();
        assert!(err.to_string().contains("no baseline invoker"));
    }

    #[tokio::test]
    async fn test_trials_are_in_generation_order() {
        let mut registry = PluginRegistry::new();
        registry.register(TraditionalMetricsPlugin::default());
        let mut config = SweepConfig {
            repetitions: 2,
            tasks: vec!["a".into(), "b".into()],
            ..Default::default()
        };
        config.constraints.max_roles = 1;

        let outcome = runner(registry).run_sweep(config).await.unwrap();
        assert_eq!(outcome.compositions.len(), 4);
        assert_eq!(outcome.trials.len(), 16);
        assert_eq!(outcome.trials[0].composition_id, "manager");
        assert_eq!(outcome.trials[0].task_id, "a");
        assert_eq!(outcome.trials[1].repetition, 1);
        assert_eq!(outcome.trials[2].task_id, "b");
        assert_eq!(outcome.trials[15].composition_id, "synthesiser");
        assert_eq!(outcome.metrics.trials_started, 16);
        assert!(outcome.finished_at >= outcome.started_at);
    }
}
