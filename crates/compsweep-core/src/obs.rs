//! Structured observability hooks for sweep lifecycle events.
//!
//! This module provides:
//! - Sweep- and trial-scoped tracing spans via [`sweep_span`] / [`trial_span`]
//! - Emission functions for key lifecycle events: sweep start/finish, trial
//!   finish, tier retry and failure, baseline finish
//!
//! Events are emitted at `info!` level (retries and failures at `warn!`).
//! Filtering follows `RUST_LOG`; see [`crate::telemetry::init_tracing`].

use tracing::{info, warn};

use crate::domain::result::{Tier, TrialResult};

/// Span for one sweep. Attach it to the sweep future with
/// `tracing::Instrument`; an entered guard cannot be held across awaits on
/// a multi-threaded runtime.
///
/// # Example
///
/// ```ignore
/// run(config).instrument(sweep_span(&sweep_id)).await;
/// // every event inside is tagged with sweep_id
/// ```
pub fn sweep_span(sweep_id: &str) -> tracing::Span {
    tracing::info_span!("compsweep.sweep", sweep_id = %sweep_id)
}

/// Span for one trial, attached to the spawned trial task.
pub fn trial_span(composition_id: &str, task_id: &str, repetition: u32) -> tracing::Span {
    tracing::info_span!(
        "compsweep.trial",
        composition = %composition_id,
        task_id = %task_id,
        repetition = repetition,
    )
}

/// Emit event: sweep started.
pub fn emit_sweep_started(sweep_id: &str, compositions: usize, trials: usize, concurrency: usize) {
    info!(
        event = "sweep.started",
        sweep_id = %sweep_id,
        compositions = compositions,
        trials = trials,
        concurrency = concurrency,
    );
}

/// Emit event: one trial reached a terminal status.
pub fn emit_trial_finished(trial: &TrialResult) {
    info!(
        event = "trial.finished",
        composition = %trial.composition_id,
        task_id = %trial.task_id,
        repetition = trial.repetition,
        status = ?trial.status,
        failure = ?trial.failure.as_ref().map(|f| f.kind),
        total_time = trial.stats.total_time,
    );
}

/// Emit event: a transient tier failure will be retried.
pub fn emit_tier_retry(
    tier: Tier,
    plugin: &str,
    attempt: u32,
    delay_ms: u64,
    error: &dyn std::fmt::Display,
) {
    warn!(
        event = "tier.retry",
        tier = tier.number(),
        plugin = %plugin,
        attempt = attempt,
        delay_ms = delay_ms,
        error = %error,
    );
}

/// Emit event: a plugin gave up on its tier for this trial.
pub fn emit_tier_failed(tier: Tier, plugin: &str, attempts: u32, error: &dyn std::fmt::Display) {
    warn!(
        event = "tier.failed",
        tier = tier.number(),
        plugin = %plugin,
        attempts = attempts,
        error = %error,
    );
}

/// Emit event: external baseline finished for one composition.
pub fn emit_baseline_finished(composition_id: &str, success: bool, elapsed_secs: f64) {
    info!(
        event = "baseline.finished",
        composition = %composition_id,
        success = success,
        elapsed_secs = elapsed_secs,
    );
}

/// Emit event: sweep finished.
pub fn emit_sweep_finished(sweep_id: &str, duration_ms: u64, trials: usize, failed: usize) {
    info!(
        event = "sweep.finished",
        sweep_id = %sweep_id,
        duration_ms = duration_ms,
        trials = trials,
        failed = failed,
    );
}
