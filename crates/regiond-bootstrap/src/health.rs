//! Structured health reporting for coordinator lifecycle events.

use std::path::Path;
use std::sync::Arc;

use regiond_config::Config;

use crate::bootstrap::BootstrapError;
use crate::identity::{Role, WorkerOrdinal};
use crate::launch::LaunchError;
use crate::sequence::{SequenceError, SequenceReport, SequenceStep};

const HEALTH_TARGET: &str = concat!(env!("CARGO_CRATE_NAME"), "::health");

/// Observer trait used to surface lifecycle events to telemetry sinks.
pub trait HealthReporter: Send + Sync {
    /// Invoked after configuration and telemetry are ready.
    fn bootstrap_succeeded(&self, config: &Config);

    /// Invoked when configuration, telemetry or layout setup fails.
    fn bootstrap_failed(&self, error: &BootstrapError);

    /// Invoked once the worker's role is known.
    fn role_decided(&self, ordinal: WorkerOrdinal, role: Role);

    /// Invoked before a leader step runs.
    fn step_started(&self, step: SequenceStep);

    /// Invoked after a leader step succeeds.
    fn step_completed(&self, step: SequenceStep);

    /// Invoked when a leader step is not needed on this run.
    fn step_skipped(&self, step: SequenceStep, reason: &str);

    /// Invoked when the leader sequence finishes.
    fn sequence_completed(&self, report: &SequenceReport);

    /// Invoked when the leader sequence aborts.
    fn sequence_failed(&self, error: &SequenceError);

    /// Invoked when a follower starts waiting for the leader.
    fn follower_waiting(&self, ordinal: WorkerOrdinal);

    /// Invoked when a follower observes the readiness marker.
    fn follower_released(&self, ordinal: WorkerOrdinal, polls: u64);

    /// Invoked immediately before the service replaces this process.
    fn launching(&self, ordinal: WorkerOrdinal, program: &Path);

    /// Invoked when the service could not be started.
    fn launch_failed(&self, error: &LaunchError);
}

impl<T> HealthReporter for Arc<T>
where
    T: HealthReporter,
{
    fn bootstrap_succeeded(&self, config: &Config) {
        (**self).bootstrap_succeeded(config);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        (**self).bootstrap_failed(error);
    }

    fn role_decided(&self, ordinal: WorkerOrdinal, role: Role) {
        (**self).role_decided(ordinal, role);
    }

    fn step_started(&self, step: SequenceStep) {
        (**self).step_started(step);
    }

    fn step_completed(&self, step: SequenceStep) {
        (**self).step_completed(step);
    }

    fn step_skipped(&self, step: SequenceStep, reason: &str) {
        (**self).step_skipped(step, reason);
    }

    fn sequence_completed(&self, report: &SequenceReport) {
        (**self).sequence_completed(report);
    }

    fn sequence_failed(&self, error: &SequenceError) {
        (**self).sequence_failed(error);
    }

    fn follower_waiting(&self, ordinal: WorkerOrdinal) {
        (**self).follower_waiting(ordinal);
    }

    fn follower_released(&self, ordinal: WorkerOrdinal, polls: u64) {
        (**self).follower_released(ordinal, polls);
    }

    fn launching(&self, ordinal: WorkerOrdinal, program: &Path) {
        (**self).launching(ordinal, program);
    }

    fn launch_failed(&self, error: &LaunchError) {
        (**self).launch_failed(error);
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredHealthReporter;

impl StructuredHealthReporter {
    /// Builds a new reporter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl HealthReporter for StructuredHealthReporter {
    fn bootstrap_succeeded(&self, config: &Config) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_succeeded",
            worker_index = config.worker_index(),
            data_dir = %config.data_dir,
            log_format = %config.log_format(),
            "coordinator configured"
        );
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "bootstrap_failed",
            error = %error,
            "coordinator configuration failed"
        );
    }

    fn role_decided(&self, ordinal: WorkerOrdinal, role: Role) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "role_decided",
            %ordinal,
            %role,
            "worker role decided"
        );
    }

    fn step_started(&self, step: SequenceStep) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "step_started",
            %step,
            "leader step starting"
        );
    }

    fn step_completed(&self, step: SequenceStep) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "step_completed",
            %step,
            "leader step completed"
        );
    }

    fn step_skipped(&self, step: SequenceStep, reason: &str) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "step_skipped",
            %step,
            reason,
            "leader step skipped"
        );
    }

    fn sequence_completed(&self, report: &SequenceReport) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "sequence_completed",
            seeded = report.seeded,
            mode = ?report.mode,
            database_provisioned = report.database_provisioned,
            "shared state initialised"
        );
    }

    fn sequence_failed(&self, error: &SequenceError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "sequence_failed",
            step = %error.step(),
            error = %error,
            "leader sequence aborted"
        );
    }

    fn follower_waiting(&self, ordinal: WorkerOrdinal) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "follower_waiting",
            %ordinal,
            "waiting for leader readiness"
        );
    }

    fn follower_released(&self, ordinal: WorkerOrdinal, polls: u64) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "follower_released",
            %ordinal,
            polls,
            "leader readiness observed"
        );
    }

    fn launching(&self, ordinal: WorkerOrdinal, program: &Path) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "launching",
            %ordinal,
            program = %program.display(),
            "handing over to region service"
        );
    }

    fn launch_failed(&self, error: &LaunchError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "launch_failed",
            error = %error,
            "region service could not be started"
        );
    }
}
