//! Terminal hand-off into the long-running region service.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::identity::WorkerOrdinal;

/// Environment variable carrying the one-based worker ordinal to the service.
pub const WORKER_ID_ENV_VAR: &str = "MAAS_REGIOND_WORKER_ID";

/// Errors raised while handing over to the service.
#[derive(Debug, Clone, Error)]
pub enum LaunchError {
    /// Replacing the process image failed.
    #[error("failed to exec region service '{program}': {source}")]
    Exec {
        /// Service entry point.
        program: PathBuf,
        /// Underlying IO error.
        #[source]
        source: Arc<io::Error>,
    },
    /// The platform cannot replace the running process image.
    #[error("process replacement is not supported on this platform")]
    Unsupported,
}

/// Starts the region service in place of the coordinator.
pub trait ServiceLauncher: Send + Sync {
    /// Service entry point, for reporting.
    fn program(&self) -> &Path;

    /// Replaces the current process with the service for `ordinal`.
    ///
    /// Production launchers only ever return an error; returning `Ok` is
    /// reserved for launchers that record the hand-off instead of performing
    /// it.
    fn launch(&self, ordinal: WorkerOrdinal) -> Result<(), LaunchError>;
}

/// Launcher that `exec`s the service binary.
#[derive(Debug, Clone)]
pub struct ExecLauncher {
    program: PathBuf,
}

impl ExecLauncher {
    /// Launches `program`.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl ServiceLauncher for ExecLauncher {
    fn program(&self) -> &Path {
        self.program.as_path()
    }

    #[cfg(unix)]
    fn launch(&self, ordinal: WorkerOrdinal) -> Result<(), LaunchError> {
        use std::os::unix::process::CommandExt;
        use std::process::Command;

        let source = Command::new(&self.program)
            .env(WORKER_ID_ENV_VAR, ordinal.to_string())
            .exec();
        Err(LaunchError::Exec {
            program: self.program.clone(),
            source: Arc::new(source),
        })
    }

    #[cfg(not(unix))]
    fn launch(&self, _ordinal: WorkerOrdinal) -> Result<(), LaunchError> {
        Err(LaunchError::Unsupported)
    }
}

#[cfg(test)]
#[cfg(unix)]
mod tests {
    use super::*;
    use crate::identity::WorkerIndex;

    #[test]
    fn missing_service_binary_reports_exec_failure() {
        let launcher = ExecLauncher::new("/nonexistent/regiond-bootstrap-test-service");
        let error = launcher
            .launch(WorkerIndex::new(1).resolve())
            .expect_err("exec of a missing binary returns");
        assert!(matches!(error, LaunchError::Exec { .. }));
        assert_eq!(
            launcher.program(),
            Path::new("/nonexistent/regiond-bootstrap-test-service")
        );
    }
}
