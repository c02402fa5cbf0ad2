//! Best-effort discovery of the host's primary address.
//!
//! The address only seeds the default region URL, so detection never fails.
//! Sources are tried in a fixed order and each miss falls through silently:
//!
//! 1. the first global IPv4 address of the IPv4 default-route interface;
//! 2. the first global, permanent IPv6 address of the first non-loopback
//!    interface with a zero-length IPv6 route prefix, in bracket notation;
//! 3. the literal `localhost`.

use std::fs;
use std::io;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use tracing::debug;

mod listing;
mod routes;

pub use listing::{AddressFamily, AddressLister, IpCommandLister, parse_listing};
pub use routes::{ipv4_default_interface, ipv6_default_interface};

pub(crate) const ADDRESS_TARGET: &str = concat!(env!("CARGO_CRATE_NAME"), "::address");

/// Address used when no routed interface carries a usable address.
pub const FALLBACK_ADDRESS: &str = "localhost";

/// Source of the host address written into the default region URL.
pub trait AddressDetector: Send + Sync {
    /// Returns a host component suitable for a URL authority.
    fn detect(&self) -> String;
}

/// Detector reading the kernel routing tables and listing interface addresses.
pub struct NetworkAddressDetector<L> {
    ipv4_route_table: PathBuf,
    ipv6_route_table: PathBuf,
    lister: L,
}

impl<L> NetworkAddressDetector<L>
where
    L: AddressLister,
{
    /// Builds a detector over the given routing tables.
    #[must_use]
    pub fn new(
        ipv4_route_table: impl Into<PathBuf>,
        ipv6_route_table: impl Into<PathBuf>,
        lister: L,
    ) -> Self {
        Self {
            ipv4_route_table: ipv4_route_table.into(),
            ipv6_route_table: ipv6_route_table.into(),
            lister,
        }
    }

    fn ipv4_address(&self) -> Option<String> {
        let table = read_table(&self.ipv4_route_table)?;
        let interface = ipv4_default_interface(&table)?;
        let address = self.first_address(interface, AddressFamily::V4)?;
        Some(address.to_string())
    }

    fn ipv6_address(&self) -> Option<String> {
        let table = read_table(&self.ipv6_route_table)?;
        let interface = ipv6_default_interface(&table)?;
        let address = self.first_address(interface, AddressFamily::V6)?;
        Some(format!("[{address}]"))
    }

    fn first_address(&self, interface: &str, family: AddressFamily) -> Option<IpAddr> {
        let address = self.lister.addresses(interface, family).into_iter().next();
        if address.is_none() {
            debug!(
                target: ADDRESS_TARGET,
                interface,
                ?family,
                "default-route interface has no usable address"
            );
        }
        address
    }
}

impl<L> AddressDetector for NetworkAddressDetector<L>
where
    L: AddressLister,
{
    fn detect(&self) -> String {
        let address = self
            .ipv4_address()
            .or_else(|| self.ipv6_address())
            .unwrap_or_else(|| FALLBACK_ADDRESS.to_owned());
        debug!(target: ADDRESS_TARGET, %address, "primary address detected");
        address
    }
}

fn read_table(path: &Path) -> Option<String> {
    match fs::read_to_string(path) {
        Ok(table) => Some(table),
        Err(error) => {
            let state = if error.kind() == io::ErrorKind::NotFound {
                "missing"
            } else {
                "unreadable"
            };
            debug!(
                target: ADDRESS_TARGET,
                table = %path.display(),
                state,
                %error,
                "routing table skipped"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests;
