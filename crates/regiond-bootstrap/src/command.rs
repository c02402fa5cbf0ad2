//! Execution of the external commands the coordinator depends on.
//!
//! Address listing, database administration and schema migration are all
//! delegated to separate programs. [`CommandRunner`] abstracts their execution
//! so the sequencing logic can be exercised without spawning processes.

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

const COMMAND_TARGET: &str = concat!(env!("CARGO_CRATE_NAME"), "::command");

/// Program invocation with its arguments and optional standard input.
///
/// Arguments are never logged. Secrets belong on standard input, which is
/// neither logged nor visible in the process table, and which `Debug` omits.
#[derive(Clone, PartialEq, Eq)]
pub struct CommandSpec {
    program: PathBuf,
    args: Vec<OsString>,
    stdin: Option<String>,
}

impl CommandSpec {
    /// Builds an invocation of `program` without arguments.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stdin: None,
        }
    }

    /// Appends arguments to the invocation.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|arg| arg.as_ref().to_os_string()));
        self
    }

    /// Feeds `input` to the program's standard input, which is then closed.
    #[must_use]
    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    /// Program to execute.
    #[must_use]
    pub fn program(&self) -> &Path {
        self.program.as_path()
    }

    /// Arguments passed to the program.
    #[must_use]
    pub const fn arguments(&self) -> &[OsString] {
        self.args.as_slice()
    }

    /// Text written to standard input, if any.
    #[must_use]
    pub fn input(&self) -> Option<&str> {
        self.stdin.as_deref()
    }
}

impl fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandSpec")
            .field("program", &self.program)
            .field("args", &self.args)
            .field("has_stdin", &self.stdin.is_some())
            .finish()
    }
}

/// Captured result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, absent when the process was terminated by a signal.
    pub status: Option<i32>,
    /// Standard output decoded lossily as UTF-8.
    pub stdout: String,
    /// Standard error decoded lossily as UTF-8.
    pub stderr: String,
}

impl CommandOutput {
    /// Output of a command that exited with status zero.
    #[must_use]
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            status: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Output of a command that exited with `status` and wrote `stderr`.
    #[must_use]
    pub fn failure(status: i32, stderr: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Whether the command exited with status zero.
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        matches!(self.status, Some(0))
    }
}

/// Errors raised when a command cannot be run at all.
#[derive(Debug, Clone, Error)]
pub enum CommandError {
    /// The program could not be spawned or awaited.
    #[error("failed to run '{program}': {source}")]
    Spawn {
        /// Program that failed to run.
        program: PathBuf,
        /// Underlying IO error.
        #[source]
        source: Arc<io::Error>,
    },
    /// Standard input could not be delivered to the running program.
    #[error("failed to write standard input of '{program}': {source}")]
    Input {
        /// Program whose input failed.
        program: PathBuf,
        /// Underlying IO error.
        #[source]
        source: Arc<io::Error>,
    },
}

/// Abstraction over running external programs to completion.
pub trait CommandRunner: Send + Sync {
    /// Runs the command and captures its output.
    ///
    /// A non-zero exit is reported through [`CommandOutput::status`], not as
    /// an error; callers decide what a failing exit means.
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError>;
}

/// Runner that spawns real processes with [`std::process::Command`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError> {
        debug!(
            target: COMMAND_TARGET,
            program = %spec.program().display(),
            arg_count = spec.arguments().len(),
            has_stdin = spec.input().is_some(),
            "running command"
        );
        let spawn_error = |source: io::Error| CommandError::Spawn {
            program: spec.program().to_path_buf(),
            source: Arc::new(source),
        };
        let stdin = if spec.input().is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        };
        let mut child = Command::new(spec.program())
            .args(spec.arguments())
            .stdin(stdin)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(spawn_error)?;
        if let (Some(input), Some(mut pipe)) = (spec.input(), child.stdin.take()) {
            // The pipe is dropped at the end of this block, closing the
            // program's standard input.
            pipe.write_all(input.as_bytes())
                .map_err(|source| CommandError::Input {
                    program: spec.program().to_path_buf(),
                    source: Arc::new(source),
                })?;
        }
        let output = child.wait_with_output().map_err(spawn_error)?;
        let captured = CommandOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        debug!(
            target: COMMAND_TARGET,
            program = %spec.program().display(),
            status = ?captured.status,
            "command finished"
        );
        Ok(captured)
    }
}
