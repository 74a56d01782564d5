use anyhow::{bail, Context, Result};
use if_addrs::get_if_addrs;
use ipnet::Ipv4Net;
use std::net::{IpAddr, Ipv4Addr};

/// Expand a target specification into individual IPv4 addresses.
///
/// Accepts a single address (`192.168.1.10`) or a CIDR block
/// (`192.168.1.0/24`). CIDR expansion excludes the network and broadcast
/// addresses; /31 and /32 fall back to the base address itself.
pub fn parse_targets(spec: &str) -> Result<Vec<IpAddr>> {
    let spec = spec.trim();
    if spec.contains('/') {
        let net: Ipv4Net = spec
            .parse()
            .with_context(|| format!("invalid CIDR block: {spec}"))?;
        return Ok(expand_hosts(net).into_iter().map(IpAddr::V4).collect());
    }
    let ip: Ipv4Addr = spec
        .parse()
        .with_context(|| format!("invalid IPv4 address: {spec}"))?;
    Ok(vec![IpAddr::V4(ip)])
}

fn expand_hosts(net: Ipv4Net) -> Vec<Ipv4Addr> {
    let start = u32::from(net.network());
    let end = u32::from(net.broadcast());
    if end <= start + 1 {
        // /31 and /32 have no distinct host addresses
        return vec![net.addr()];
    }
    (start + 1..end).map(Ipv4Addr::from).collect()
}

/// Resolve a source-interface specification to a local bind address.
///
/// Accepts either a literal IP address or an interface name (`eth0`);
/// interface names prefer their IPv4 address when one exists.
pub fn resolve_source(spec: &str) -> Result<IpAddr> {
    if let Ok(ip) = spec.parse::<IpAddr>() {
        return Ok(ip);
    }

    let mut fallback = None;
    for iface in get_if_addrs().context("failed to enumerate network interfaces")? {
        if iface.name != spec {
            continue;
        }
        let ip = iface.ip();
        if ip.is_ipv4() {
            return Ok(ip);
        }
        fallback.get_or_insert(ip);
    }

    match fallback {
        Some(ip) => Ok(ip),
        None => bail!("no interface named {spec}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_address_expands_to_itself() {
        let ips = parse_targets("192.168.1.10").unwrap();
        assert_eq!(ips, vec![IpAddr::V4(Ipv4Addr::new(192, 168, 1, 10))]);
    }

    #[test]
    fn cidr_excludes_network_and_broadcast() {
        let ips = parse_targets("10.0.0.0/30").unwrap();
        assert_eq!(
            ips,
            vec![
                IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)),
                IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)),
            ]
        );
    }

    #[test]
    fn slash_32_scans_the_address_itself() {
        let ips = parse_targets("172.16.0.5/32").unwrap();
        assert_eq!(ips, vec![IpAddr::V4(Ipv4Addr::new(172, 16, 0, 5))]);
    }

    #[test]
    fn garbage_targets_error() {
        assert!(parse_targets("not-an-ip").is_err());
        assert!(parse_targets("10.0.0.0/99").is_err());
    }

    #[test]
    fn literal_source_address_passes_through() {
        let ip = resolve_source("127.0.0.1").unwrap();
        assert_eq!(ip, IpAddr::V4(Ipv4Addr::LOCALHOST));
    }

    #[test]
    fn unknown_interface_errors() {
        assert!(resolve_source("definitely-not-an-interface0").is_err());
    }
}
