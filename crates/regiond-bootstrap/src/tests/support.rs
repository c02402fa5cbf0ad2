//! Test harness shared by the coordinator behaviour suites.
//!
//! Every scenario runs against a temporary host layout with fake external
//! collaborators: the database, the address detector, the migration command
//! and the service launcher all record what they were asked to do.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicI32, AtomicU32, Ordering};
use std::thread;
use std::time::Duration;

use camino::Utf8PathBuf;
use regiond_config::{BootstrapLayout, Config};
use tempfile::TempDir;

use crate::address::AddressDetector;
use crate::barrier::MarkerFileBarrier;
use crate::bootstrap::BootstrapError;
use crate::command::{CommandError, CommandOutput, CommandRunner, CommandSpec};
use crate::coordinator::{Collaborators, CoordinatorPlan, Handoff, run_coordinator_with};
use crate::database::{AdminStatement, DatabaseAdmin, DatabaseError};
use crate::health::HealthReporter;
use crate::identity::{Role, WorkerIndex, WorkerOrdinal};
use crate::launch::{LaunchError, ServiceLauncher};
use crate::node_config::{NodeConfig, NodeConfigFile};
use crate::sequence::{
    BootstrapSequencer, SequenceDeps, SequenceError, SequenceReport, SequenceSettings,
    SequenceStep,
};

/// Address returned by the fake detector.
pub const DETECTED_ADDRESS: &str = "192.168.0.10";

const POLL_INTERVAL_MS: u64 = 5;

/// Temporary data, common and installation roots.
pub struct Site {
    _dir: TempDir,
    pub config: Config,
    pub layout: BootstrapLayout,
    pub settings: SequenceSettings,
}

impl Site {
    fn new() -> Self {
        let dir = TempDir::new().expect("create temp dir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf())
            .expect("temporary directory should be UTF-8");
        let config = Config {
            data_dir: root.join("data"),
            common_dir: root.join("common"),
            install_root: root.join("install"),
            ipv4_route_table: root.join("route"),
            ipv6_route_table: root.join("ipv6_route"),
            poll_interval_ms: POLL_INTERVAL_MS,
            ..Config::default()
        };
        for path in [&config.data_dir, &config.common_dir] {
            fs::create_dir_all(path).expect("create site root");
        }
        let layout = BootstrapLayout::from_config(&config).expect("site layout is absolute");
        let settings = SequenceSettings::from_config(&config).expect("default names are valid");
        Self {
            _dir: dir,
            config,
            layout,
            settings,
        }
    }

    /// Writes the deployment mode indicator.
    pub fn set_mode(&self, contents: &str) {
        fs::write(self.layout.mode_indicator_path(), contents).expect("write mode indicator");
    }

    /// Node configuration handle.
    pub fn node_config(&self) -> NodeConfigFile {
        NodeConfigFile::new(self.layout.node_config_path())
    }

    /// Parsed node configuration; empty when absent.
    pub fn read_node_config(&self) -> NodeConfig {
        let file = self.node_config();
        if file.exists().expect("inspect node configuration") {
            file.read().expect("read node configuration")
        } else {
            NodeConfig::default()
        }
    }

    /// Raw node configuration text.
    pub fn raw_node_config(&self) -> String {
        fs::read_to_string(self.layout.node_config_path()).expect("read node configuration")
    }

    pub fn marker_present(&self) -> bool {
        self.layout.ready_marker_path().exists()
    }

    pub fn runtime_dirs_present(&self) -> bool {
        self.layout.runtime_dirs().iter().all(|path| path.is_dir())
    }
}

/// Database that refuses a configured number of probes, then accepts
/// everything.
#[derive(Default)]
pub struct FakeDatabase {
    unavailable_probes: AtomicU32,
    probes: AtomicU32,
    statements: Mutex<Vec<&'static str>>,
}

impl FakeDatabase {
    pub fn refuse_probes(&self, count: u32) {
        self.unavailable_probes.store(count, Ordering::SeqCst);
    }

    pub fn probe_count(&self) -> u32 {
        self.probes.load(Ordering::SeqCst)
    }

    pub fn statements(&self) -> Vec<&'static str> {
        self.statements
            .lock()
            .expect("database mutex poisoned")
            .clone()
    }
}

impl DatabaseAdmin for FakeDatabase {
    fn probe(&self) -> Result<(), DatabaseError> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        let refused = self
            .unavailable_probes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            Err(DatabaseError::Statement {
                statement: "ping",
                status: Some(2),
                stderr: "could not connect to server".to_owned(),
            })
        } else {
            Ok(())
        }
    }

    fn execute(&self, statement: &AdminStatement) -> Result<(), DatabaseError> {
        self.statements
            .lock()
            .expect("database mutex poisoned")
            .push(statement.label());
        Ok(())
    }
}

/// Detector returning [`DETECTED_ADDRESS`] and counting calls.
#[derive(Default)]
pub struct FakeDetector {
    calls: AtomicU32,
}

impl FakeDetector {
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl AddressDetector for FakeDetector {
    fn detect(&self) -> String {
        self.calls.fetch_add(1, Ordering::SeqCst);
        DETECTED_ADDRESS.to_owned()
    }
}

/// Migration command double exiting with a configurable status.
#[derive(Default)]
pub struct MigrationRunner {
    status: AtomicI32,
    runs: AtomicU32,
    commands: Mutex<Vec<CommandSpec>>,
}

impl MigrationRunner {
    pub fn exit_with(&self, status: i32) {
        self.status.store(status, Ordering::SeqCst);
    }

    pub fn runs(&self) -> u32 {
        self.runs.load(Ordering::SeqCst)
    }

    pub fn commands(&self) -> Vec<CommandSpec> {
        self.commands
            .lock()
            .expect("runner mutex poisoned")
            .clone()
    }
}

impl CommandRunner for MigrationRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        self.commands
            .lock()
            .expect("runner mutex poisoned")
            .push(spec.clone());
        match self.status.load(Ordering::SeqCst) {
            0 => Ok(CommandOutput::success("")),
            status => Ok(CommandOutput::failure(status, "migration failed\n")),
        }
    }
}

/// Shared state observed by a worker at the moment it launched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchRecord {
    pub ordinal: u64,
    pub runtime_dirs_present: bool,
    pub node_config_entries: usize,
}

/// Launcher that records hand-offs instead of replacing the process.
pub struct RecordingLauncher {
    program: PathBuf,
    runtime_dirs: Vec<PathBuf>,
    node_config: NodeConfigFile,
    fail: bool,
    launches: Mutex<Vec<LaunchRecord>>,
}

impl RecordingLauncher {
    fn new(layout: &BootstrapLayout) -> Self {
        Self {
            program: layout.service_program(),
            runtime_dirs: layout.runtime_dirs().to_vec(),
            node_config: NodeConfigFile::new(layout.node_config_path()),
            fail: false,
            launches: Mutex::new(Vec::new()),
        }
    }

    pub fn launches(&self) -> Vec<LaunchRecord> {
        self.launches
            .lock()
            .expect("launcher mutex poisoned")
            .clone()
    }
}

impl ServiceLauncher for RecordingLauncher {
    fn program(&self) -> &Path {
        self.program.as_path()
    }

    fn launch(&self, ordinal: WorkerOrdinal) -> Result<(), LaunchError> {
        if self.fail {
            return Err(LaunchError::Unsupported);
        }
        let node_config_entries = self
            .node_config
            .read()
            .map(|config| config.len())
            .unwrap_or_default();
        let record = LaunchRecord {
            ordinal: ordinal.get(),
            runtime_dirs_present: self.runtime_dirs.iter().all(|path| path.is_dir()),
            node_config_entries,
        };
        self.launches
            .lock()
            .expect("launcher mutex poisoned")
            .push(record);
        Ok(())
    }
}

/// Structured health events tracked during scenarios.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthEvent {
    BootstrapSucceeded,
    BootstrapFailed(String),
    RoleDecided(u64, Role),
    StepStarted(SequenceStep),
    StepCompleted(SequenceStep),
    StepSkipped(SequenceStep),
    SequenceCompleted,
    SequenceFailed(SequenceStep),
    FollowerWaiting(u64),
    FollowerReleased(u64),
    Launching(u64),
    LaunchFailed,
}

/// Records health events for assertions.
#[derive(Debug, Default)]
pub struct RecordingHealthReporter {
    events: Mutex<Vec<HealthEvent>>,
}

impl RecordingHealthReporter {
    /// Captures a copy of the recorded events.
    pub fn events(&self) -> Vec<HealthEvent> {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .clone()
    }

    fn record(&self, event: HealthEvent) {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .push(event);
    }
}

impl HealthReporter for RecordingHealthReporter {
    fn bootstrap_succeeded(&self, _config: &Config) {
        self.record(HealthEvent::BootstrapSucceeded);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        self.record(HealthEvent::BootstrapFailed(error.to_string()));
    }

    fn role_decided(&self, ordinal: WorkerOrdinal, role: Role) {
        self.record(HealthEvent::RoleDecided(ordinal.get(), role));
    }

    fn step_started(&self, step: SequenceStep) {
        self.record(HealthEvent::StepStarted(step));
    }

    fn step_completed(&self, step: SequenceStep) {
        self.record(HealthEvent::StepCompleted(step));
    }

    fn step_skipped(&self, step: SequenceStep, _reason: &str) {
        self.record(HealthEvent::StepSkipped(step));
    }

    fn sequence_completed(&self, _report: &SequenceReport) {
        self.record(HealthEvent::SequenceCompleted);
    }

    fn sequence_failed(&self, error: &SequenceError) {
        self.record(HealthEvent::SequenceFailed(error.step()));
    }

    fn follower_waiting(&self, ordinal: WorkerOrdinal) {
        self.record(HealthEvent::FollowerWaiting(ordinal.get()));
    }

    fn follower_released(&self, ordinal: WorkerOrdinal, _polls: u64) {
        self.record(HealthEvent::FollowerReleased(ordinal.get()));
    }

    fn launching(&self, ordinal: WorkerOrdinal, _program: &Path) {
        self.record(HealthEvent::Launching(ordinal.get()));
    }

    fn launch_failed(&self, _error: &LaunchError) {
        self.record(HealthEvent::LaunchFailed);
    }
}

/// Scenario world shared across BDD steps.
pub struct TestWorld {
    pub site: Site,
    pub database: FakeDatabase,
    pub detector: FakeDetector,
    pub runner: MigrationRunner,
    pub barrier: MarkerFileBarrier,
    pub launcher: RecordingLauncher,
    pub reporter: RecordingHealthReporter,
    pub sequence_result: Option<Result<SequenceReport, SequenceError>>,
    pub handoffs: Vec<Result<Handoff, String>>,
    pub original_node_config: Option<String>,
}

impl TestWorld {
    /// Builds a world around a fresh, unconfigured host.
    pub fn new() -> Self {
        let site = Site::new();
        let barrier = MarkerFileBarrier::new(site.layout.ready_marker_path());
        let launcher = RecordingLauncher::new(&site.layout);
        Self {
            site,
            database: FakeDatabase::default(),
            detector: FakeDetector::default(),
            runner: MigrationRunner::default(),
            barrier,
            launcher,
            reporter: RecordingHealthReporter::default(),
            sequence_result: None,
            handoffs: Vec::new(),
            original_node_config: None,
        }
    }

    /// Makes the service launcher fail.
    pub fn fail_launches(&mut self) {
        self.launcher.fail = true;
    }

    /// Runs the leader sequence directly.
    pub fn run_sequence(&mut self) {
        let result = BootstrapSequencer::new(
            &self.site.layout,
            &self.site.settings,
            SequenceDeps {
                barrier: &self.barrier,
                detector: &self.detector,
                database: &self.database,
                runner: &self.runner,
                reporter: &self.reporter,
            },
        )
        .run();
        self.sequence_result = Some(result);
    }

    /// Returns the last sequence result.
    pub fn sequence_result(&self) -> &Result<SequenceReport, SequenceError> {
        self.sequence_result
            .as_ref()
            .expect("the leader sequence has not run")
    }

    /// Runs one coordinator per index, each on its own thread, with the
    /// given start delays.
    pub fn run_workers(&self, workers: &[(u32, Duration)]) -> Vec<Result<Handoff, String>> {
        thread::scope(|scope| {
            let handles: Vec<_> = workers
                .iter()
                .map(|&(index, delay)| {
                    scope.spawn(move || {
                        thread::sleep(delay);
                        self.coordinate(index)
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().expect("worker thread panicked"))
                .collect()
        })
    }

    fn coordinate(&self, index: u32) -> Result<Handoff, String> {
        run_coordinator_with(CoordinatorPlan {
            index: WorkerIndex::new(index),
            layout: &self.site.layout,
            settings: &self.site.settings,
            collaborators: Collaborators {
                barrier: &self.barrier,
                detector: &self.detector,
                database: &self.database,
                runner: &self.runner,
                launcher: &self.launcher,
                reporter: &self.reporter,
            },
        })
        .map_err(|error| error.to_string())
    }
}

impl Default for TestWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds a fresh scenario world.
pub fn world() -> TestWorld {
    TestWorld::new()
}
