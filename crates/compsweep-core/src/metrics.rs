//! Per-sweep atomic counters.
//!
//! Each [`SweepRunner`](crate::runner::SweepRunner) owns its own
//! [`SweepMetrics`], so concurrent sweeps in one process never share
//! counts. Call [`SweepMetrics::flush`] to emit the values as a single
//! `tracing::info!` event at the end of a sweep.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::domain::result::{TrialResult, TrialStatus};

/// Lightweight atomic counters: no allocations, no locking.
#[derive(Debug, Default)]
pub struct SweepMetrics {
    trials_started: AtomicU64,
    trials_succeeded: AtomicU64,
    trials_partial: AtomicU64,
    trials_failed: AtomicU64,
    trial_timeouts: AtomicU64,
    tier2_retries: AtomicU64,
    baseline_failures: AtomicU64,
}

/// Point-in-time copy of [`SweepMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub trials_started: u64,
    pub trials_succeeded: u64,
    pub trials_partial: u64,
    pub trials_failed: u64,
    pub trial_timeouts: u64,
    pub tier2_retries: u64,
    pub baseline_failures: u64,
}

impl SweepMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_trials_started(&self) {
        self.trials_started.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "trials_started", "counter incremented");
    }

    /// Count a finished trial under its terminal status.
    pub fn record_trial(&self, trial: &TrialResult) {
        let counter = match trial.status {
            TrialStatus::Succeeded => &self.trials_succeeded,
            TrialStatus::Partial => &self.trials_partial,
            TrialStatus::Failed => &self.trials_failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        if trial.is_timeout() {
            self.trial_timeouts.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn inc_tier2_retries(&self) {
        self.tier2_retries.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "tier2_retries", "counter incremented");
    }

    pub fn inc_baseline_failures(&self) {
        self.baseline_failures.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "baseline_failures", "counter incremented");
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            trials_started: self.trials_started.load(Ordering::Relaxed),
            trials_succeeded: self.trials_succeeded.load(Ordering::Relaxed),
            trials_partial: self.trials_partial.load(Ordering::Relaxed),
            trials_failed: self.trials_failed.load(Ordering::Relaxed),
            trial_timeouts: self.trial_timeouts.load(Ordering::Relaxed),
            tier2_retries: self.tier2_retries.load(Ordering::Relaxed),
            baseline_failures: self.baseline_failures.load(Ordering::Relaxed),
        }
    }

    /// Emit all current counter values as one `info!` event and return them.
    pub fn flush(&self, sweep_id: &str) -> MetricsSnapshot {
        let s = self.snapshot();
        tracing::info!(
            metric = "flush",
            sweep_id = %sweep_id,
            trials_started = s.trials_started,
            trials_succeeded = s.trials_succeeded,
            trials_partial = s.trials_partial,
            trials_failed = s.trials_failed,
            trial_timeouts = s.trial_timeouts,
            tier2_retries = s.tier2_retries,
            baseline_failures = s.baseline_failures,
        );
        s
    }
}
