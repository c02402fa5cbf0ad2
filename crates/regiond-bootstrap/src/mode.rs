//! Deployment mode selection from the shared mode indicator.

use std::fs;
use std::io;
use std::path::Path;

use tracing::warn;

const STANDALONE_INDICATOR: &str = "all";
const MODE_TARGET: &str = concat!(env!("CARGO_CRATE_NAME"), "::mode");

/// Whether this bootstrap owns the database engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum DeploymentMode {
    /// The database engine is colocated and provisioned here.
    Standalone,
    /// A database already exists and is reachable elsewhere.
    External,
}

impl DeploymentMode {
    /// Interprets the indicator contents; only `all` selects standalone.
    #[must_use]
    pub fn from_indicator(contents: &str) -> Self {
        if contents.trim() == STANDALONE_INDICATOR {
            Self::Standalone
        } else {
            Self::External
        }
    }

    /// Reads the indicator at `path`.
    ///
    /// A missing or unreadable indicator selects [`DeploymentMode::External`]
    /// so a database is never provisioned on an unconfigured host.
    #[must_use]
    pub fn read(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => Self::from_indicator(&contents),
            Err(error) => {
                let state = if error.kind() == io::ErrorKind::NotFound {
                    "missing"
                } else {
                    "unreadable"
                };
                warn!(
                    target: MODE_TARGET,
                    path = %path.display(),
                    state,
                    %error,
                    "mode indicator unavailable; assuming external database"
                );
                Self::External
            }
        }
    }
}
