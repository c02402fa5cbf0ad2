use camino::Utf8PathBuf;

use crate::logging::LogFormat;

/// Per-revision data root of a snap installation.
pub const DEFAULT_DATA_DIR: &str = "/var/snap/maas/current";

/// Revision-independent data root of a snap installation.
pub const DEFAULT_COMMON_DIR: &str = "/var/snap/maas/common";

/// Read-only installation root of a snap installation.
pub const DEFAULT_INSTALL_ROOT: &str = "/snap/maas/current";

/// Kernel IPv4 routing table.
pub const DEFAULT_IPV4_ROUTE_TABLE: &str = "/proc/net/route";

/// Kernel IPv6 routing table.
pub const DEFAULT_IPV6_ROUTE_TABLE: &str = "/proc/net/ipv6_route";

/// Address-listing command.
pub const DEFAULT_IP_COMMAND: &str = "ip";

/// Interval between readiness and liveness polls, in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

/// Database provisioned in standalone mode.
pub const DEFAULT_DATABASE_NAME: &str = "maasdb";

/// Database role provisioned in standalone mode.
pub const DEFAULT_DATABASE_USER: &str = "maas";

/// Default log filter expression used by the binary.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default log filter expression used by the binary.
#[must_use]
pub const fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

pub(crate) fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the binary.
#[must_use]
pub const fn default_log_format() -> LogFormat {
    LogFormat::Json
}

pub(crate) fn default_data_dir() -> Utf8PathBuf {
    Utf8PathBuf::from(DEFAULT_DATA_DIR)
}

pub(crate) fn default_common_dir() -> Utf8PathBuf {
    Utf8PathBuf::from(DEFAULT_COMMON_DIR)
}

pub(crate) fn default_install_root() -> Utf8PathBuf {
    Utf8PathBuf::from(DEFAULT_INSTALL_ROOT)
}

pub(crate) fn default_ipv4_route_table() -> Utf8PathBuf {
    Utf8PathBuf::from(DEFAULT_IPV4_ROUTE_TABLE)
}

pub(crate) fn default_ipv6_route_table() -> Utf8PathBuf {
    Utf8PathBuf::from(DEFAULT_IPV6_ROUTE_TABLE)
}

pub(crate) fn default_ip_command() -> String {
    DEFAULT_IP_COMMAND.to_owned()
}

pub(crate) const fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

pub(crate) fn default_database_name() -> String {
    DEFAULT_DATABASE_NAME.to_owned()
}

pub(crate) fn default_database_user() -> String {
    DEFAULT_DATABASE_USER.to_owned()
}
