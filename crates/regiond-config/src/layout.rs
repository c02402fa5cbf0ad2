//! Derives the artefact paths shared by every worker on the host.
//!
//! All workers must agree on where the node configuration, readiness marker,
//! mode indicator and external commands live, since those files are the only
//! coordination channel between them.

use std::path::{Path, PathBuf};

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;

use crate::Config;

/// Subdirectories of the data root provisioned by the leader before release.
pub const RUNTIME_SUBDIRECTORIES: [&str; 3] = ["bind", "proxy", "syslog"];

const NODE_CONFIG_FILE: &str = "regiond.conf";
const READY_MARKER_FILE: &str = "regiond.ready";
const MODE_INDICATOR_FILE: &str = "snap_mode";
const DATABASE_SOCKET_DIR: &str = "db";

/// Canonical paths used by the bootstrap coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapLayout {
    data_dir: PathBuf,
    node_config_path: PathBuf,
    ready_marker_path: PathBuf,
    mode_indicator_path: PathBuf,
    database_socket_dir: Utf8PathBuf,
    runtime_dirs: Vec<PathBuf>,
    bin_dir: PathBuf,
    ipv4_route_table: PathBuf,
    ipv6_route_table: PathBuf,
}

impl BootstrapLayout {
    /// Derives the layout from the shared configuration.
    ///
    /// The data, common and installation roots must be absolute so every
    /// worker resolves the same files regardless of its working directory.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::RelativeRoot`] naming the first relative root.
    pub fn from_config(config: &Config) -> Result<Self, LayoutError> {
        let data_dir = require_absolute("data_dir", &config.data_dir)?;
        let common_dir = require_absolute("common_dir", &config.common_dir)?;
        let install_root = require_absolute("install_root", &config.install_root)?;
        Ok(Self {
            node_config_path: data_dir.join(NODE_CONFIG_FILE).into_std_path_buf(),
            ready_marker_path: data_dir.join(READY_MARKER_FILE).into_std_path_buf(),
            mode_indicator_path: common_dir.join(MODE_INDICATOR_FILE).into_std_path_buf(),
            database_socket_dir: common_dir.join(DATABASE_SOCKET_DIR),
            runtime_dirs: RUNTIME_SUBDIRECTORIES
                .iter()
                .map(|name| data_dir.join(name).into_std_path_buf())
                .collect(),
            bin_dir: install_root.join("bin").into_std_path_buf(),
            ipv4_route_table: config.ipv4_route_table.clone().into_std_path_buf(),
            ipv6_route_table: config.ipv6_route_table.clone().into_std_path_buf(),
            data_dir: data_dir.into_std_path_buf(),
        })
    }

    /// Per-revision data root.
    #[must_use]
    pub fn data_dir(&self) -> &Path {
        self.data_dir.as_path()
    }

    /// Path to the node configuration consumed by the region service.
    #[must_use]
    pub fn node_config_path(&self) -> &Path {
        self.node_config_path.as_path()
    }

    /// Path to the presence-only readiness marker.
    #[must_use]
    pub fn ready_marker_path(&self) -> &Path {
        self.ready_marker_path.as_path()
    }

    /// Path to the file selecting the deployment mode.
    #[must_use]
    pub fn mode_indicator_path(&self) -> &Path {
        self.mode_indicator_path.as_path()
    }

    /// Socket directory of the colocated database, recorded as its host.
    #[must_use]
    pub fn database_socket_dir(&self) -> &Utf8Path {
        self.database_socket_dir.as_path()
    }

    /// Directories the leader ensures exist before releasing followers.
    #[must_use]
    pub const fn runtime_dirs(&self) -> &[PathBuf] {
        self.runtime_dirs.as_slice()
    }

    /// Database administration client.
    #[must_use]
    pub fn psql_program(&self) -> PathBuf {
        self.bin_dir.join("psql")
    }

    /// Schema migration command.
    #[must_use]
    pub fn migrate_program(&self) -> PathBuf {
        self.bin_dir.join("maas-region")
    }

    /// Long-running region service entry point.
    #[must_use]
    pub fn service_program(&self) -> PathBuf {
        self.bin_dir.join("regiond")
    }

    /// Kernel IPv4 routing table.
    #[must_use]
    pub fn ipv4_route_table(&self) -> &Path {
        self.ipv4_route_table.as_path()
    }

    /// Kernel IPv6 routing table.
    #[must_use]
    pub fn ipv6_route_table(&self) -> &Path {
        self.ipv6_route_table.as_path()
    }
}

fn require_absolute(field: &'static str, path: &Utf8Path) -> Result<Utf8PathBuf, LayoutError> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Err(LayoutError::RelativeRoot {
            field,
            path: path.to_string(),
        })
    }
}

/// Errors raised while deriving the bootstrap layout.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LayoutError {
    /// A configured root was not an absolute path.
    #[error("{field} must be an absolute path, got '{path}'")]
    RelativeRoot {
        /// Configuration field holding the path.
        field: &'static str,
        /// Offending value.
        path: String,
    },
}
