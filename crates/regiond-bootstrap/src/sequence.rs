//! Leader-only initialisation of the state shared by every worker.
//!
//! The sequence is fail-fast and performs no rollback. Re-running it after a
//! crash is safe: seeding is guarded by the node configuration's existence,
//! migration is re-runnable by contract and directory creation is
//! non-destructive.

use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use regiond_config::{BootstrapLayout, Config};
use thiserror::Error;
use tracing::info;
use url::Url;

use crate::address::AddressDetector;
use crate::barrier::{BarrierError, ReadinessBarrier};
use crate::command::{CommandError, CommandRunner, CommandSpec};
use crate::database::{self, DatabaseAdmin, DatabaseError, DatabaseIdentifier, ProvisionRequest};
use crate::health::HealthReporter;
use crate::mode::DeploymentMode;
use crate::node_config::{NodeConfigError, NodeConfigFile, NodeConfigKey};

const SEQUENCE_TARGET: &str = concat!(env!("CARGO_CRATE_NAME"), "::sequence");

const REGION_URL_SCHEME: &str = "http";
const REGION_PORT: u16 = 5240;
const REGION_PATH: &str = "/MAAS";
const MIGRATE_ARGS: [&str; 2] = ["migrate", "--configure"];

/// Steps of the leader sequence in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum SequenceStep {
    /// Clear any marker left by an earlier, incomplete run.
    ResetBarrier,
    /// Write the default node configuration.
    SeedConfig,
    /// Create the database role and database.
    ProvisionDatabase,
    /// Bring the schema up to date.
    Migrate,
    /// Create the runtime subdirectories.
    ProvisionDirectories,
    /// Publish the readiness marker.
    Release,
}

/// Errors that abort the leader sequence.
#[derive(Debug, Clone, Error)]
pub enum SequenceError {
    /// The readiness marker could not be reset or published.
    #[error(transparent)]
    Barrier(#[from] BarrierError),
    /// The node configuration could not be inspected or written.
    #[error(transparent)]
    NodeConfig(#[from] NodeConfigError),
    /// Database provisioning failed.
    #[error(transparent)]
    Database(#[from] DatabaseError),
    /// The detected address did not produce a valid region URL.
    #[error("detected address '{address}' does not form a valid region URL: {source}")]
    RegionUrl {
        /// Address returned by detection.
        address: String,
        /// Parser error.
        #[source]
        source: url::ParseError,
    },
    /// The migration command could not be run.
    #[error("failed to run schema migration: {source}")]
    MigrationSpawn {
        /// Runner error.
        #[source]
        source: CommandError,
    },
    /// The migration command exited unsuccessfully.
    #[error("schema migration exited with status {status:?}: {stderr}")]
    Migration {
        /// Exit status, absent when killed by a signal.
        status: Option<i32>,
        /// Diagnostic output of the command.
        stderr: String,
    },
    /// A runtime directory could not be created.
    #[error("failed to create runtime directory '{path}': {source}")]
    Directory {
        /// Directory path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: Arc<io::Error>,
    },
}

impl SequenceError {
    /// Step that raised the error.
    #[must_use]
    pub const fn step(&self) -> SequenceStep {
        match self {
            Self::Barrier(BarrierError::Signal { .. }) => SequenceStep::Release,
            Self::Barrier(_) => SequenceStep::ResetBarrier,
            Self::NodeConfig(NodeConfigError::Append { .. }) | Self::Database(_) => {
                SequenceStep::ProvisionDatabase
            }
            Self::NodeConfig(_) | Self::RegionUrl { .. } => SequenceStep::SeedConfig,
            Self::MigrationSpawn { .. } | Self::Migration { .. } => SequenceStep::Migrate,
            Self::Directory { .. } => SequenceStep::ProvisionDirectories,
        }
    }
}

/// Reasons the configured sequence settings are unusable.
#[derive(Debug, Clone, Error)]
pub enum SettingsError {
    /// A database name or role is not a safe identifier.
    #[error(transparent)]
    Database(#[from] DatabaseError),
    /// The configured poll interval is zero.
    #[error("poll_interval_ms must be at least 1")]
    ZeroPollInterval,
}

/// Database naming and polling cadence used by the sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceSettings {
    /// Database created in standalone mode.
    pub database_name: DatabaseIdentifier,
    /// Role created in standalone mode.
    pub database_user: DatabaseIdentifier,
    /// Interval between database liveness checks and barrier polls.
    pub poll_interval: Duration,
}

impl SequenceSettings {
    /// Validates the database names and polling cadence carried by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Database`] when a name is not a safe
    /// identifier and [`SettingsError::ZeroPollInterval`] when the interval is
    /// zero.
    pub fn from_config(config: &Config) -> Result<Self, SettingsError> {
        if config.poll_interval().is_zero() {
            return Err(SettingsError::ZeroPollInterval);
        }
        Ok(Self {
            database_name: DatabaseIdentifier::new(config.database_name())?,
            database_user: DatabaseIdentifier::new(config.database_user())?,
            poll_interval: config.poll_interval(),
        })
    }
}

/// Outcome of a completed leader sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceReport {
    /// Whether this run wrote the node configuration.
    pub seeded: bool,
    /// Mode observed while seeding; absent when seeding was skipped.
    pub mode: Option<DeploymentMode>,
    /// Whether this run provisioned the database.
    pub database_provisioned: bool,
}

/// Collaborators consulted by the sequence.
pub struct SequenceDeps<'a> {
    /// Readiness marker shared with the followers.
    pub barrier: &'a dyn ReadinessBarrier,
    /// Source of the address seeded into the region URL.
    pub detector: &'a dyn AddressDetector,
    /// Administrative database connection.
    pub database: &'a dyn DatabaseAdmin,
    /// Runner for the migration command.
    pub runner: &'a dyn CommandRunner,
    /// Lifecycle observer.
    pub reporter: &'a dyn HealthReporter,
}

/// Runs the leader initialisation sequence.
pub struct BootstrapSequencer<'a> {
    layout: &'a BootstrapLayout,
    settings: &'a SequenceSettings,
    deps: SequenceDeps<'a>,
}

impl<'a> BootstrapSequencer<'a> {
    /// Binds the sequence to its layout, settings and collaborators.
    #[must_use]
    pub const fn new(
        layout: &'a BootstrapLayout,
        settings: &'a SequenceSettings,
        deps: SequenceDeps<'a>,
    ) -> Self {
        Self {
            layout,
            settings,
            deps,
        }
    }

    /// Executes every step in order, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// Returns the first step's [`SequenceError`]; later steps do not run.
    pub fn run(&self) -> Result<SequenceReport, SequenceError> {
        match self.run_steps() {
            Ok(report) => {
                self.deps.reporter.sequence_completed(&report);
                Ok(report)
            }
            Err(error) => {
                self.deps.reporter.sequence_failed(&error);
                Err(error)
            }
        }
    }

    fn run_steps(&self) -> Result<SequenceReport, SequenceError> {
        self.step(SequenceStep::ResetBarrier, || {
            self.deps.barrier.reset().map_err(SequenceError::from)
        })?;

        let node_config = NodeConfigFile::new(self.layout.node_config_path());
        let report = if node_config.exists()? {
            self.deps
                .reporter
                .step_skipped(SequenceStep::SeedConfig, "node configuration present");
            self.deps
                .reporter
                .step_skipped(SequenceStep::ProvisionDatabase, "node configuration present");
            SequenceReport {
                seeded: false,
                mode: None,
                database_provisioned: false,
            }
        } else {
            self.seed(&node_config)?
        };

        self.step(SequenceStep::Migrate, || self.migrate())?;
        self.step(SequenceStep::ProvisionDirectories, || {
            self.provision_directories()
        })?;
        self.step(SequenceStep::Release, || {
            self.deps
                .barrier
                .signal_and_publish()
                .map_err(SequenceError::from)
        })?;
        Ok(report)
    }

    fn step<T>(
        &self,
        step: SequenceStep,
        action: impl FnOnce() -> Result<T, SequenceError>,
    ) -> Result<T, SequenceError> {
        self.deps.reporter.step_started(step);
        let value = action()?;
        self.deps.reporter.step_completed(step);
        Ok(value)
    }

    fn seed(&self, node_config: &NodeConfigFile) -> Result<SequenceReport, SequenceError> {
        let mode = self.step(SequenceStep::SeedConfig, || {
            let url = region_url(&self.deps.detector.detect())?;
            node_config.create(&[(NodeConfigKey::MaasUrl, url.as_str())])?;
            info!(target: SEQUENCE_TARGET, maas_url = %url, "node configuration seeded");
            Ok(DeploymentMode::read(self.layout.mode_indicator_path()))
        })?;

        if mode != DeploymentMode::Standalone {
            self.deps
                .reporter
                .step_skipped(SequenceStep::ProvisionDatabase, "external database");
            return Ok(SequenceReport {
                seeded: true,
                mode: Some(mode),
                database_provisioned: false,
            });
        }

        self.step(SequenceStep::ProvisionDatabase, || {
            let request = ProvisionRequest {
                host: self.layout.database_socket_dir().to_string(),
                name: self.settings.database_name.clone(),
                user: self.settings.database_user.clone(),
            };
            let credential =
                database::provision(self.deps.database, &request, self.settings.poll_interval)?;
            node_config.append(&credential.entries())?;
            Ok(())
        })?;
        Ok(SequenceReport {
            seeded: true,
            mode: Some(mode),
            database_provisioned: true,
        })
    }

    fn migrate(&self) -> Result<(), SequenceError> {
        let command = CommandSpec::new(self.layout.migrate_program()).args(MIGRATE_ARGS);
        let output = self
            .deps
            .runner
            .run(&command)
            .map_err(|source| SequenceError::MigrationSpawn { source })?;
        if output.succeeded() {
            Ok(())
        } else {
            Err(SequenceError::Migration {
                status: output.status,
                stderr: output.stderr.trim().to_owned(),
            })
        }
    }

    fn provision_directories(&self) -> Result<(), SequenceError> {
        for path in self.layout.runtime_dirs() {
            fs::create_dir_all(path).map_err(|source| SequenceError::Directory {
                path: path.clone(),
                source: Arc::new(source),
            })?;
        }
        Ok(())
    }
}

/// Builds the default region URL around a detected host component.
///
/// # Errors
///
/// Returns [`SequenceError::RegionUrl`] when `address` cannot serve as a URL
/// host.
pub fn region_url(address: &str) -> Result<Url, SequenceError> {
    let raw = format!("{REGION_URL_SCHEME}://{address}:{REGION_PORT}{REGION_PATH}");
    Url::parse(&raw).map_err(|source| SequenceError::RegionUrl {
        address: address.to_owned(),
        source,
    })
}
