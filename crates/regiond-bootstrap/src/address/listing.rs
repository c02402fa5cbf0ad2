//! Per-interface address listing through the `ip` command.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;

use crate::command::{CommandRunner, CommandSpec};

use super::ADDRESS_TARGET;

/// Address family queried on an interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressFamily {
    /// Global-scope IPv4 addresses.
    V4,
    /// Global-scope, permanent IPv6 addresses.
    V6,
}

impl AddressFamily {
    const fn keyword(self) -> &'static str {
        match self {
            Self::V4 => "inet",
            Self::V6 => "inet6",
        }
    }
}

/// Source of the addresses configured on a network interface.
pub trait AddressLister: Send + Sync {
    /// Lists the interface's addresses of `family` in configuration order.
    ///
    /// Listing is best effort: any failure yields an empty list.
    fn addresses(&self, interface: &str, family: AddressFamily) -> Vec<IpAddr>;
}

/// Lister that shells out to `ip -o addr show`.
#[derive(Clone)]
pub struct IpCommandLister {
    program: PathBuf,
    runner: Arc<dyn CommandRunner>,
}

impl IpCommandLister {
    /// Builds a lister running `program` through `runner`.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            program: program.into(),
            runner,
        }
    }

    fn command(&self, interface: &str, family: AddressFamily) -> CommandSpec {
        let spec = CommandSpec::new(&self.program);
        match family {
            AddressFamily::V4 => {
                spec.args(["-o", "-4", "addr", "show", "dev", interface, "scope", "global"])
            }
            AddressFamily::V6 => spec.args([
                "-o",
                "-6",
                "addr",
                "show",
                "dev",
                interface,
                "scope",
                "global",
                "permanent",
            ]),
        }
    }
}

impl AddressLister for IpCommandLister {
    fn addresses(&self, interface: &str, family: AddressFamily) -> Vec<IpAddr> {
        match self.runner.run(&self.command(interface, family)) {
            Ok(output) if output.succeeded() => parse_listing(&output.stdout, family),
            Ok(output) => {
                debug!(
                    target: ADDRESS_TARGET,
                    interface,
                    ?family,
                    status = ?output.status,
                    stderr = %output.stderr.trim(),
                    "address listing exited unsuccessfully"
                );
                Vec::new()
            }
            Err(error) => {
                debug!(
                    target: ADDRESS_TARGET,
                    interface,
                    ?family,
                    %error,
                    "address listing could not run"
                );
                Vec::new()
            }
        }
    }
}

/// Extracts addresses from `ip addr show` output, dropping prefix lengths.
#[must_use]
pub fn parse_listing(output: &str, family: AddressFamily) -> Vec<IpAddr> {
    let keyword = family.keyword();
    output
        .lines()
        .filter_map(|line| {
            let mut tokens = line.split_whitespace();
            tokens.find(|token| *token == keyword)?;
            let cidr = tokens.next()?;
            let address = cidr.split_once('/').map_or(cidr, |(host, _)| host);
            match family {
                AddressFamily::V4 => address.parse::<Ipv4Addr>().ok().map(IpAddr::V4),
                AddressFamily::V6 => address.parse::<Ipv6Addr>().ok().map(IpAddr::V6),
            }
        })
        .collect()
}
