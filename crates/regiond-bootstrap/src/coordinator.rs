//! Per-worker coordination state machine.
//!
//! Every worker moves through `Resolve`, then `Lead` or `Follow`, and finally
//! `Launch`. `Launch` is terminal: with a real launcher the process image is
//! replaced and nothing after it runs.

use std::sync::Arc;

use regiond_config::BootstrapLayout;
use thiserror::Error;

use crate::address::{AddressDetector, IpCommandLister, NetworkAddressDetector};
use crate::barrier::{MarkerFileBarrier, ReadinessBarrier, wait_for_release};
use crate::bootstrap::{BootstrapError, ConfigLoader, SystemConfigLoader, bootstrap_with};
use crate::command::{CommandRunner, SystemCommandRunner};
use crate::database::{DatabaseAdmin, PsqlAdmin};
use crate::health::{HealthReporter, StructuredHealthReporter};
use crate::identity::{Role, WorkerIndex, WorkerOrdinal};
use crate::launch::{ExecLauncher, LaunchError, ServiceLauncher};
use crate::sequence::{BootstrapSequencer, SequenceDeps, SequenceError, SequenceReport, SequenceSettings};
use crate::telemetry;

/// Errors that stop a worker before it reaches the service.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// Configuration, telemetry or layout setup failed.
    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),
    /// The leader sequence aborted.
    #[error("leader sequence failed: {0}")]
    Sequence(#[from] SequenceError),
    /// The service could not be started.
    #[error(transparent)]
    Launch(#[from] LaunchError),
}

/// Stages of a worker's startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Stage {
    /// Turn the supervisor index into an ordinal and role.
    Resolve,
    /// Run the leader sequence.
    Lead,
    /// Wait for the leader's readiness marker.
    Follow,
    /// Hand over to the service.
    Launch,
}

/// Collaborators shared by every stage.
pub struct Collaborators<'a> {
    /// Readiness marker shared by all workers.
    pub barrier: &'a dyn ReadinessBarrier,
    /// Address source for seeding the region URL.
    pub detector: &'a dyn AddressDetector,
    /// Administrative database connection.
    pub database: &'a dyn DatabaseAdmin,
    /// Runner for the migration command.
    pub runner: &'a dyn CommandRunner,
    /// Service hand-off.
    pub launcher: &'a dyn ServiceLauncher,
    /// Lifecycle observer.
    pub reporter: &'a dyn HealthReporter,
}

/// Inputs for one worker's coordination run.
pub struct CoordinatorPlan<'a> {
    /// Supervisor-assigned index.
    pub index: WorkerIndex,
    /// Shared artefact paths.
    pub layout: &'a BootstrapLayout,
    /// Leader sequence settings.
    pub settings: &'a SequenceSettings,
    /// Injected collaborators.
    pub collaborators: Collaborators<'a>,
}

/// Record of a hand-off that returned control, only possible with a
/// launcher that does not replace the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handoff {
    /// Ordinal passed to the service.
    pub ordinal: WorkerOrdinal,
    /// Role the worker played.
    pub role: Role,
    /// Leader sequence outcome; absent for followers.
    pub report: Option<SequenceReport>,
    /// Polls a follower spent waiting for the marker.
    pub polls: u64,
}

/// Runs the worker through every stage with injected collaborators.
///
/// # Errors
///
/// Returns [`CoordinatorError::Sequence`] when the leader sequence aborts and
/// [`CoordinatorError::Launch`] when the service cannot be started.
pub fn run_coordinator_with(plan: CoordinatorPlan<'_>) -> Result<Handoff, CoordinatorError> {
    let CoordinatorPlan {
        index,
        layout,
        settings,
        collaborators,
    } = plan;
    let reporter = collaborators.reporter;

    let ordinal = index.resolve();
    let role = ordinal.role();
    let span = telemetry::worker_span(ordinal, role);
    let _entered = span.enter();
    let mut handoff = Handoff {
        ordinal,
        role,
        report: None,
        polls: 0,
    };

    let mut stage = Stage::Resolve;
    loop {
        stage = match stage {
            Stage::Resolve => {
                reporter.role_decided(ordinal, role);
                match role {
                    Role::Leader => Stage::Lead,
                    Role::Follower => Stage::Follow,
                }
            }
            Stage::Lead => {
                let sequencer = BootstrapSequencer::new(
                    layout,
                    settings,
                    SequenceDeps {
                        barrier: collaborators.barrier,
                        detector: collaborators.detector,
                        database: collaborators.database,
                        runner: collaborators.runner,
                        reporter,
                    },
                );
                handoff.report = Some(sequencer.run()?);
                Stage::Launch
            }
            Stage::Follow => {
                reporter.follower_waiting(ordinal);
                handoff.polls = wait_for_release(collaborators.barrier, settings.poll_interval);
                reporter.follower_released(ordinal, handoff.polls);
                Stage::Launch
            }
            Stage::Launch => {
                let launcher = collaborators.launcher;
                reporter.launching(ordinal, launcher.program());
                if let Err(error) = launcher.launch(ordinal) {
                    reporter.launch_failed(&error);
                    return Err(error.into());
                }
                return Ok(handoff);
            }
        };
    }
}

/// Runs the worker using the production collaborators.
///
/// On success the process has been replaced by the region service, so this
/// only ever returns an error.
///
/// # Errors
///
/// Returns the [`CoordinatorError`] of whichever stage stopped the worker.
pub fn run_coordinator() -> Result<Handoff, CoordinatorError> {
    run_coordinator_from(&SystemConfigLoader, &StructuredHealthReporter::new())
}

fn run_coordinator_from(
    loader: &dyn ConfigLoader,
    reporter: &dyn HealthReporter,
) -> Result<Handoff, CoordinatorError> {
    let bootstrap = bootstrap_with(loader, reporter)?;
    let config = bootstrap.config();
    let layout = bootstrap.layout();

    let runner: Arc<dyn CommandRunner> = Arc::new(SystemCommandRunner);
    let detector = NetworkAddressDetector::new(
        layout.ipv4_route_table(),
        layout.ipv6_route_table(),
        IpCommandLister::new(config.ip_command(), Arc::clone(&runner)),
    );
    let database = PsqlAdmin::new(
        layout.psql_program(),
        layout.database_socket_dir(),
        Arc::clone(&runner),
    );
    let barrier = MarkerFileBarrier::new(layout.ready_marker_path());
    let launcher = ExecLauncher::new(layout.service_program());

    run_coordinator_with(CoordinatorPlan {
        index: WorkerIndex::new(config.worker_index()),
        layout,
        settings: bootstrap.settings(),
        collaborators: Collaborators {
            barrier: &barrier,
            detector: &detector,
            database: &database,
            runner: runner.as_ref(),
            launcher: &launcher,
            reporter,
        },
    })
}
