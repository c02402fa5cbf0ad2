//! Provisioning of the colocated database.
//!
//! Statements are issued one at a time over an administrative connection and
//! are not wrapped in a transaction. A crash part-way through can leave the
//! role without its database; nothing here attempts to repair that.

use std::fmt;
use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::command::CommandError;

mod credential;
mod psql;

pub use credential::{DatabaseCredential, PASSWORD_LENGTH, Password};
pub use psql::PsqlAdmin;

pub(crate) const DATABASE_TARGET: &str = concat!(env!("CARGO_CRATE_NAME"), "::database");

/// Probe failures between two warnings while waiting for the database.
const PROBE_WARN_EVERY: u64 = 20;
const IDENTIFIER_MAX_LEN: usize = 63;

/// Errors raised while talking to the database.
#[derive(Debug, Clone, Error)]
pub enum DatabaseError {
    /// A configured name is not a plain lower-case SQL identifier.
    #[error("'{value}' is not a valid database identifier")]
    InvalidIdentifier {
        /// Rejected value.
        value: String,
    },
    /// The administration client could not be run.
    #[error(transparent)]
    Command(#[from] CommandError),
    /// The administration client rejected a statement.
    #[error("database statement '{statement}' failed with status {status:?}: {stderr}")]
    Statement {
        /// Label of the failing statement; never its text.
        statement: &'static str,
        /// Exit status of the client.
        status: Option<i32>,
        /// Diagnostic output of the client.
        stderr: String,
    },
}

/// Role or database name safe to splice into statements.
///
/// Only `[a-z_][a-z0-9_]*` up to 63 characters is accepted, so the value can
/// be double-quoted without escaping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseIdentifier(String);

impl DatabaseIdentifier {
    /// Validates `raw`.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::InvalidIdentifier`] for anything outside the
    /// accepted alphabet or length.
    pub fn new(raw: impl Into<String>) -> Result<Self, DatabaseError> {
        let value = raw.into();
        let mut chars = value.chars();
        let valid_head = chars
            .next()
            .is_some_and(|c| c.is_ascii_lowercase() || c == '_');
        let valid_tail = chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
        if valid_head && valid_tail && value.len() <= IDENTIFIER_MAX_LEN {
            Ok(Self(value))
        } else {
            Err(DatabaseError::InvalidIdentifier { value })
        }
    }

    /// Identifier text.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for DatabaseIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Administrative statements issued during provisioning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminStatement {
    /// Trivial liveness query.
    Ping,
    /// Creates the login role.
    CreateRole {
        /// Role name.
        user: DatabaseIdentifier,
        /// Role password.
        password: Password,
    },
    /// Creates the database.
    CreateDatabase {
        /// Database name.
        name: DatabaseIdentifier,
    },
    /// Grants the role every privilege on the database.
    GrantAll {
        /// Database name.
        name: DatabaseIdentifier,
        /// Role name.
        user: DatabaseIdentifier,
    },
}

impl AdminStatement {
    /// SQL text of the statement. Contains secrets; never log it.
    #[must_use]
    pub fn sql(&self) -> String {
        match self {
            Self::Ping => "SELECT now()".to_owned(),
            Self::CreateRole { user, password } => format!(
                "CREATE USER \"{user}\" WITH PASSWORD '{}'",
                password.expose()
            ),
            Self::CreateDatabase { name } => format!("CREATE DATABASE \"{name}\""),
            Self::GrantAll { name, user } => {
                format!("GRANT ALL PRIVILEGES ON DATABASE \"{name}\" TO \"{user}\"")
            }
        }
    }

    /// Loggable name of the statement.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Ping => "ping",
            Self::CreateRole { .. } => "create_role",
            Self::CreateDatabase { .. } => "create_database",
            Self::GrantAll { .. } => "grant_all",
        }
    }
}

/// Administrative connection to the database server.
pub trait DatabaseAdmin: Send + Sync {
    /// Runs the liveness query once.
    fn probe(&self) -> Result<(), DatabaseError>;

    /// Executes a single statement.
    fn execute(&self, statement: &AdminStatement) -> Result<(), DatabaseError>;
}

/// What to provision and where the service will find it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionRequest {
    /// Host recorded for the service.
    pub host: String,
    /// Database to create.
    pub name: DatabaseIdentifier,
    /// Role to create.
    pub user: DatabaseIdentifier,
}

/// Polls `admin` every `interval` until the liveness query succeeds.
///
/// There is no upper bound. Returns the number of failed probes.
#[must_use]
pub fn wait_until_live(admin: &dyn DatabaseAdmin, interval: Duration) -> u64 {
    let mut failures = 0_u64;
    loop {
        match admin.probe() {
            Ok(()) => {
                debug!(target: DATABASE_TARGET, failures, "database is accepting queries");
                return failures;
            }
            Err(error) => {
                failures = failures.saturating_add(1);
                if failures.is_multiple_of(PROBE_WARN_EVERY) {
                    warn!(target: DATABASE_TARGET, failures, %error, "database still unreachable");
                } else {
                    debug!(target: DATABASE_TARGET, failures, %error, "database not ready");
                }
            }
        }
        thread::sleep(interval);
    }
}

/// Waits for the database, then creates the role and database and grants
/// the role full privileges on it.
///
/// The returned credential has not been persisted anywhere yet.
///
/// # Errors
///
/// Returns the first error raised by a provisioning statement; later
/// statements are not attempted.
pub fn provision(
    admin: &dyn DatabaseAdmin,
    request: &ProvisionRequest,
    interval: Duration,
) -> Result<DatabaseCredential, DatabaseError> {
    let refused_probes = wait_until_live(admin, interval);

    let password = Password::generate();
    let statements = [
        AdminStatement::CreateRole {
            user: request.user.clone(),
            password: password.clone(),
        },
        AdminStatement::CreateDatabase {
            name: request.name.clone(),
        },
        AdminStatement::GrantAll {
            name: request.name.clone(),
            user: request.user.clone(),
        },
    ];
    for statement in &statements {
        admin.execute(statement)?;
        debug!(target: DATABASE_TARGET, statement = statement.label(), "statement applied");
    }
    info!(
        target: DATABASE_TARGET,
        database = %request.name,
        user = %request.user,
        refused_probes,
        "database provisioned"
    );

    Ok(DatabaseCredential {
        host: request.host.clone(),
        name: request.name.clone(),
        user: request.user.clone(),
        password,
    })
}
