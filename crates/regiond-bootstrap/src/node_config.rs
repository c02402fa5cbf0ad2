//! The node configuration file shared with the region service.
//!
//! The file is line oriented, one `key: value` pair per line. The leader
//! creates it once and only ever appends afterwards; the region service reads
//! it at its own startup, so the key names are a stable contract. Existence of
//! the file is what tells a restarted leader that seeding already happened.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use strum::{Display, EnumString, IntoStaticStr};
use tempfile::Builder;
use thiserror::Error;

#[cfg(unix)]
use std::{fs::Permissions, os::unix::fs::PermissionsExt};

/// Keys written to the node configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum NodeConfigKey {
    /// URL the region advertises to the rest of the deployment.
    MaasUrl,
    /// Database host; a socket directory for the colocated engine.
    DatabaseHost,
    /// Database name.
    DatabaseName,
    /// Database role.
    DatabaseUser,
    /// Database role password.
    #[strum(serialize = "database_pass")]
    DatabasePass,
}

/// Errors raised while reading or writing the node configuration.
#[derive(Debug, Clone, Error)]
pub enum NodeConfigError {
    /// Checking for the file failed for a reason other than absence.
    #[error("failed to check node configuration '{path}': {source}")]
    Probe {
        /// Node configuration path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: Arc<io::Error>,
    },
    /// Creating the file failed, including when it already exists.
    #[error("failed to create node configuration '{path}': {source}")]
    Create {
        /// Node configuration path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: Arc<io::Error>,
    },
    /// Appending to the file failed.
    #[error("failed to append to node configuration '{path}': {source}")]
    Append {
        /// Node configuration path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: Arc<io::Error>,
    },
    /// Reading the file failed.
    #[error("failed to read node configuration '{path}': {source}")]
    Read {
        /// Node configuration path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: Arc<io::Error>,
    },
    /// A value would break the line-oriented format.
    #[error("value for '{key}' must be a single line")]
    MultilineValue {
        /// Key whose value was rejected.
        key: NodeConfigKey,
    },
}

/// Parsed contents of the node configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeConfig {
    entries: Vec<(String, String)>,
}

impl NodeConfig {
    /// Parses `key: value` lines, ignoring blank lines and lines without a
    /// separator.
    #[must_use]
    pub fn parse(contents: &str) -> Self {
        let entries = contents
            .lines()
            .filter_map(|line| line.split_once(':'))
            .map(|(key, value)| (key.trim().to_owned(), value.trim().to_owned()))
            .filter(|(key, _)| !key.is_empty())
            .collect();
        Self { entries }
    }

    /// First value recorded for `key`.
    #[must_use]
    pub fn get(&self, key: NodeConfigKey) -> Option<&str> {
        let name: &'static str = key.into();
        self.entries
            .iter()
            .find(|(entry, _)| entry == name)
            .map(|(_, value)| value.as_str())
    }

    /// Keys in file order, including duplicates.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    /// Number of recorded entries.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the file held no entries.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Handle on the node configuration file.
#[derive(Debug, Clone)]
pub struct NodeConfigFile {
    path: PathBuf,
}

impl NodeConfigFile {
    /// Wraps the node configuration at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the file.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// Whether the file exists.
    ///
    /// # Errors
    ///
    /// Returns [`NodeConfigError::Probe`] when existence cannot be determined.
    pub fn exists(&self) -> Result<bool, NodeConfigError> {
        self.path
            .try_exists()
            .map_err(|source| NodeConfigError::Probe {
                path: self.path.clone(),
                source: Arc::new(source),
            })
    }

    /// Creates the file holding `entries`.
    ///
    /// The contents are written to a private temporary file, flushed, and
    /// linked into place without replacing an existing file, so readers see
    /// either nothing or the complete first record.
    ///
    /// # Errors
    ///
    /// Returns [`NodeConfigError::Create`] when the file already exists or
    /// cannot be written, and [`NodeConfigError::MultilineValue`] for a value
    /// spanning lines.
    pub fn create(&self, entries: &[(NodeConfigKey, &str)]) -> Result<(), NodeConfigError> {
        let contents = render(entries)?;
        let create_error = |source: io::Error| NodeConfigError::Create {
            path: self.path.clone(),
            source: Arc::new(source),
        };
        let directory = self.path.parent().ok_or_else(|| {
            create_error(io::Error::new(
                io::ErrorKind::NotFound,
                "node configuration path has no parent directory",
            ))
        })?;

        let mut builder = Builder::new();
        builder.prefix(".regiond.conf");
        #[cfg(unix)]
        builder.permissions(Permissions::from_mode(0o600));
        let mut file = builder.tempfile_in(directory).map_err(create_error)?;
        file.write_all(contents.as_bytes()).map_err(create_error)?;
        file.as_file().sync_all().map_err(create_error)?;
        file.persist_noclobber(&self.path)
            .map_err(|error| create_error(error.error))?;
        Ok(())
    }

    /// Appends `entries` to the existing file and flushes them to disk.
    ///
    /// # Errors
    ///
    /// Returns [`NodeConfigError::Append`] when the file is missing or cannot
    /// be written.
    pub fn append(&self, entries: &[(NodeConfigKey, &str)]) -> Result<(), NodeConfigError> {
        let contents = render(entries)?;
        let append_error = |source: io::Error| NodeConfigError::Append {
            path: self.path.clone(),
            source: Arc::new(source),
        };
        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(append_error)?;
        file.write_all(contents.as_bytes()).map_err(append_error)?;
        file.sync_all().map_err(append_error)?;
        Ok(())
    }

    /// Reads and parses the file.
    ///
    /// # Errors
    ///
    /// Returns [`NodeConfigError::Read`] when the file cannot be read.
    pub fn read(&self) -> Result<NodeConfig, NodeConfigError> {
        std::fs::read_to_string(&self.path)
            .map(|contents| NodeConfig::parse(&contents))
            .map_err(|source| NodeConfigError::Read {
                path: self.path.clone(),
                source: Arc::new(source),
            })
    }
}

fn render(entries: &[(NodeConfigKey, &str)]) -> Result<String, NodeConfigError> {
    let mut contents = String::new();
    for (key, value) in entries {
        if value.contains(['\n', '\r']) {
            return Err(NodeConfigError::MultilineValue { key: *key });
        }
        contents.push_str(&format!("{key}: {value}\n"));
    }
    Ok(contents)
}
