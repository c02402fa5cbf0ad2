//! Parsers for the kernel routing tables exposed under `/proc/net`.

const LOOPBACK_INTERFACE: &str = "lo";

/// Interface carrying the IPv4 default route.
///
/// The table has one header line followed by whitespace-separated columns
/// `Iface Destination Gateway Flags RefCnt Use Metric Mask MTU Window IRTT`.
/// The default route is the row whose destination and mask are both zero.
#[must_use]
pub fn ipv4_default_interface(table: &str) -> Option<&str> {
    table.lines().skip(1).find_map(|line| {
        let columns: Vec<&str> = line.split_whitespace().collect();
        match columns.as_slice() {
            [iface, destination, _, _, _, _, _, mask, ..]
                if is_zero_hex(destination) && is_zero_hex(mask) =>
            {
                Some(*iface)
            }
            _ => None,
        }
    })
}

/// Interface of the first IPv6 route with a zero prefix length that does not
/// use the loopback device.
///
/// The table has no header; each row holds ten whitespace-separated columns
/// with the prefix length in the second and the interface in the last.
#[must_use]
pub fn ipv6_default_interface(table: &str) -> Option<&str> {
    table.lines().find_map(|line| {
        let columns: Vec<&str> = line.split_whitespace().collect();
        match columns.as_slice() {
            [_, prefix_len, _, _, _, _, _, _, _, iface]
                if is_zero_hex(prefix_len) && *iface != LOOPBACK_INTERFACE =>
            {
                Some(*iface)
            }
            _ => None,
        }
    })
}

fn is_zero_hex(field: &str) -> bool {
    !field.is_empty() && u128::from_str_radix(field, 16).is_ok_and(|value| value == 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const IPV4_TABLE: &str = "\
Iface\tDestination\tGateway \tFlags\tRefCnt\tUse\tMetric\tMask\t\tMTU\tWindow\tIRTT
eth1\t0010A8C0\t00000000\t0001\t0\t0\t100\t00FFFFFF\t0\t0\t0
eth0\t00000000\t0100A8C0\t0003\t0\t0\t100\t00000000\t0\t0\t0
";

    const IPV6_TABLE: &str = "\
00000000000000000000000000000000 00 00000000000000000000000000000000 00 00000000000000000000000000000000 ffffffff 00000001 00000000 00200200       lo
20010db8000000000000000000000000 40 00000000000000000000000000000000 00 00000000000000000000000000000000 00000100 00000001 00000000 00000001     eth2
00000000000000000000000000000000 00 00000000000000000000000000000000 00 fe800000000000000000000000000001 00000400 00000001 00000000 00000003     eth2
";

    #[test]
    fn finds_ipv4_default_route_interface() {
        assert_eq!(ipv4_default_interface(IPV4_TABLE), Some("eth0"));
    }

    #[test]
    fn ignores_ipv4_routes_with_a_mask() {
        let table = "\
Iface\tDestination\tGateway \tFlags\tRefCnt\tUse\tMetric\tMask\t\tMTU\tWindow\tIRTT
eth1\t0010A8C0\t00000000\t0001\t0\t0\t100\t00FFFFFF\t0\t0\t0
";
        assert_eq!(ipv4_default_interface(table), None);
    }

    #[test]
    fn skips_the_ipv4_header_and_short_rows() {
        assert_eq!(ipv4_default_interface("Iface Destination\n"), None);
        assert_eq!(ipv4_default_interface("garbage\n00000000\n"), None);
    }

    #[test]
    fn finds_first_non_loopback_ipv6_default_interface() {
        assert_eq!(ipv6_default_interface(IPV6_TABLE), Some("eth2"));
    }

    #[test]
    fn loopback_only_ipv6_table_has_no_default() {
        let table = IPV6_TABLE.lines().next().unwrap_or_default();
        assert_eq!(ipv6_default_interface(table), None);
    }

    #[test]
    fn empty_tables_have_no_default() {
        assert_eq!(ipv4_default_interface(""), None);
        assert_eq!(ipv6_default_interface(""), None);
    }
}
