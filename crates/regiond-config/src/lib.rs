//! Shared configuration for the region worker bootstrap coordinator.
//!
//! Configuration is layered with `ortho_config`: built-in defaults are
//! overridden by a configuration file (`--config-path` or
//! `REGIOND_BOOTSTRAP_CONFIG_PATH`), then by `REGIOND_BOOTSTRAP_*` environment
//! variables, then by command-line flags. The only value without a default is
//! the zero-based `worker_index` assigned by the process supervisor.
//!
//! Load through the [`OrthoConfig`] trait: `Config::load()` reads the process
//! arguments and `Config::load_from_iter(args)` an explicit argument list.
//!
//! [`BootstrapLayout`] turns the loaded roots into the concrete artefact paths
//! the coordinator reads and writes.

use std::time::Duration;

use camino::Utf8PathBuf;
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

mod defaults;
mod layout;
mod logging;

pub use defaults::{
    DEFAULT_COMMON_DIR, DEFAULT_DATA_DIR, DEFAULT_DATABASE_NAME, DEFAULT_DATABASE_USER,
    DEFAULT_INSTALL_ROOT, DEFAULT_IP_COMMAND, DEFAULT_IPV4_ROUTE_TABLE, DEFAULT_IPV6_ROUTE_TABLE,
    DEFAULT_LOG_FILTER, DEFAULT_POLL_INTERVAL_MS, default_log_filter, default_log_format,
};
pub use layout::{BootstrapLayout, LayoutError, RUNTIME_SUBDIRECTORIES};
pub use logging::{LogFormat, LogFormatParseError};

/// Resolved configuration for one bootstrap coordinator process.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "REGIOND_BOOTSTRAP")]
pub struct Config {
    /// Zero-based worker index assigned by the external supervisor.
    pub worker_index: u32,
    /// Per-revision persistent data root holding the node configuration and
    /// the readiness marker.
    #[serde(default = "defaults::default_data_dir")]
    pub data_dir: Utf8PathBuf,
    /// Revision-independent root holding the mode indicator and database
    /// socket directory.
    #[serde(default = "defaults::default_common_dir")]
    pub common_dir: Utf8PathBuf,
    /// Installation root whose `bin/` directory provides the external commands.
    #[serde(default = "defaults::default_install_root")]
    pub install_root: Utf8PathBuf,
    /// Kernel IPv4 routing table.
    #[serde(default = "defaults::default_ipv4_route_table")]
    pub ipv4_route_table: Utf8PathBuf,
    /// Kernel IPv6 routing table.
    #[serde(default = "defaults::default_ipv6_route_table")]
    pub ipv6_route_table: Utf8PathBuf,
    /// Address-listing command, resolved through `PATH` when not absolute.
    #[serde(default = "defaults::default_ip_command")]
    pub ip_command: String,
    /// Fixed interval between readiness and database liveness polls.
    #[serde(default = "defaults::default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Database created for the region in standalone mode.
    #[serde(default = "defaults::default_database_name")]
    pub database_name: String,
    /// Database role created for the region in standalone mode.
    #[serde(default = "defaults::default_database_user")]
    pub database_user: String,
    /// Tracing filter expression.
    #[serde(default = "defaults::default_log_filter_string")]
    pub log_filter: String,
    /// Tracing output format.
    #[serde(default = "defaults::default_log_format")]
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            worker_index: 0,
            data_dir: defaults::default_data_dir(),
            common_dir: defaults::default_common_dir(),
            install_root: defaults::default_install_root(),
            ipv4_route_table: defaults::default_ipv4_route_table(),
            ipv6_route_table: defaults::default_ipv6_route_table(),
            ip_command: defaults::default_ip_command(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            database_name: defaults::default_database_name(),
            database_user: defaults::default_database_user(),
            log_filter: defaults::default_log_filter_string(),
            log_format: default_log_format(),
        }
    }
}

impl Config {
    /// Zero-based worker index supplied by the supervisor.
    #[must_use]
    pub const fn worker_index(&self) -> u32 {
        self.worker_index
    }

    /// Interval between polls of the readiness marker and the database.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Database name used for standalone provisioning.
    #[must_use]
    pub const fn database_name(&self) -> &str {
        self.database_name.as_str()
    }

    /// Database role used for standalone provisioning.
    #[must_use]
    pub const fn database_user(&self) -> &str {
        self.database_user.as_str()
    }

    /// Address-listing command.
    #[must_use]
    pub const fn ip_command(&self) -> &str {
        self.ip_command.as_str()
    }

    /// Tracing filter expression.
    #[must_use]
    pub const fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Tracing output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }
}
