use std::collections::HashMap;
use std::fs;
use std::net::IpAddr;

use rstest::{fixture, rstest};
use tempfile::TempDir;

use super::*;

const IPV4_DEFAULT: &str = "\
Iface\tDestination\tGateway \tFlags\tRefCnt\tUse\tMetric\tMask\t\tMTU\tWindow\tIRTT
eth0\t00000000\t0100A8C0\t0003\t0\t0\t100\t00000000\t0\t0\t0
";

const IPV4_NO_DEFAULT: &str = "\
Iface\tDestination\tGateway \tFlags\tRefCnt\tUse\tMetric\tMask\t\tMTU\tWindow\tIRTT
eth0\t0000A8C0\t00000000\t0001\t0\t0\t100\t00FFFFFF\t0\t0\t0
";

const IPV6_DEFAULT: &str = "\
00000000000000000000000000000000 00 00000000000000000000000000000000 00 fe800000000000000000000000000001 00000400 00000001 00000000 00000003     eth1
";

#[derive(Default)]
struct StaticLister {
    addresses: HashMap<(&'static str, bool), Vec<IpAddr>>,
}

impl StaticLister {
    fn with(mut self, interface: &'static str, family: AddressFamily, address: &str) -> Self {
        let parsed = address.parse().expect("test address should parse");
        self.addresses
            .entry((interface, family == AddressFamily::V6))
            .or_default()
            .push(parsed);
        self
    }
}

impl AddressLister for StaticLister {
    fn addresses(&self, interface: &str, family: AddressFamily) -> Vec<IpAddr> {
        self.addresses
            .iter()
            .find(|((name, v6), _)| *name == interface && *v6 == (family == AddressFamily::V6))
            .map(|(_, addresses)| addresses.clone())
            .unwrap_or_default()
    }
}

struct Tables {
    dir: TempDir,
}

impl Tables {
    fn write(&self, ipv4: Option<&str>, ipv6: Option<&str>) {
        if let Some(table) = ipv4 {
            fs::write(self.ipv4(), table).expect("write ipv4 table");
        }
        if let Some(table) = ipv6 {
            fs::write(self.ipv6(), table).expect("write ipv6 table");
        }
    }

    fn ipv4(&self) -> PathBuf {
        self.dir.path().join("route")
    }

    fn ipv6(&self) -> PathBuf {
        self.dir.path().join("ipv6_route")
    }

    fn detector(&self, lister: StaticLister) -> NetworkAddressDetector<StaticLister> {
        NetworkAddressDetector::new(self.ipv4(), self.ipv6(), lister)
    }
}

#[fixture]
fn tables() -> Tables {
    Tables {
        dir: TempDir::new().expect("create temp dir"),
    }
}

fn dual_stack_lister() -> StaticLister {
    StaticLister::default()
        .with("eth0", AddressFamily::V4, "192.168.0.10")
        .with("eth0", AddressFamily::V4, "192.168.0.11")
        .with("eth1", AddressFamily::V6, "2001:db8::1")
}

#[rstest]
fn prefers_the_ipv4_default_route(tables: Tables) {
    tables.write(Some(IPV4_DEFAULT), Some(IPV6_DEFAULT));
    assert_eq!(tables.detector(dual_stack_lister()).detect(), "192.168.0.10");
}

#[rstest]
fn falls_back_to_bracketed_ipv6(tables: Tables) {
    tables.write(Some(IPV4_NO_DEFAULT), Some(IPV6_DEFAULT));
    assert_eq!(tables.detector(dual_stack_lister()).detect(), "[2001:db8::1]");
}

#[rstest]
fn falls_back_to_ipv6_when_ipv4_interface_has_no_address(tables: Tables) {
    tables.write(Some(IPV4_DEFAULT), Some(IPV6_DEFAULT));
    let lister = StaticLister::default().with("eth1", AddressFamily::V6, "2001:db8::7");
    assert_eq!(tables.detector(lister).detect(), "[2001:db8::7]");
}

#[rstest]
fn uses_localhost_when_nothing_is_routed(tables: Tables) {
    tables.write(Some(IPV4_NO_DEFAULT), Some(""));
    assert_eq!(tables.detector(dual_stack_lister()).detect(), FALLBACK_ADDRESS);
}

#[rstest]
fn missing_tables_fall_through_to_localhost(tables: Tables) {
    assert_eq!(tables.detector(dual_stack_lister()).detect(), "localhost");
}
