//! Administrative connection through the bundled `psql` client.
//!
//! Statements travel on the client's standard input so role passwords never
//! appear in the process table.

use std::path::PathBuf;
use std::sync::Arc;

use camino::Utf8PathBuf;

use super::{AdminStatement, DatabaseAdmin, DatabaseError};
use crate::command::{CommandRunner, CommandSpec};

const ADMIN_DATABASE: &str = "postgres";
const ADMIN_ROLE: &str = "postgres";
/// Reads the script from standard input.
const SCRIPT_FROM_STDIN: [&str; 2] = ["-f", "-"];

/// Runs statements as the superuser over the engine's local socket.
#[derive(Clone)]
pub struct PsqlAdmin {
    program: PathBuf,
    socket_dir: Utf8PathBuf,
    runner: Arc<dyn CommandRunner>,
}

impl PsqlAdmin {
    /// Connects through the socket in `socket_dir` using `program`.
    #[must_use]
    pub fn new(
        program: impl Into<PathBuf>,
        socket_dir: impl Into<Utf8PathBuf>,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            program: program.into(),
            socket_dir: socket_dir.into(),
            runner,
        }
    }

    fn command(&self, statement: &AdminStatement) -> CommandSpec {
        CommandSpec::new(&self.program)
            .args([
                "-h",
                self.socket_dir.as_str(),
                "-d",
                ADMIN_DATABASE,
                "-U",
                ADMIN_ROLE,
                "-v",
                "ON_ERROR_STOP=1",
            ])
            .args(SCRIPT_FROM_STDIN)
            .stdin(format!("{};\n", statement.sql()))
    }
}

impl DatabaseAdmin for PsqlAdmin {
    fn probe(&self) -> Result<(), DatabaseError> {
        self.execute(&AdminStatement::Ping)
    }

    fn execute(&self, statement: &AdminStatement) -> Result<(), DatabaseError> {
        let output = self.runner.run(&self.command(statement))?;
        if output.succeeded() {
            Ok(())
        } else {
            Err(DatabaseError::Statement {
                statement: statement.label(),
                status: output.status,
                stderr: output.stderr.trim().to_owned(),
            })
        }
    }
}
