//! Conversions between declared records and wire records

use crate::resource::firewall::FirewallRuleConfig;
use crate::resource::network::StaticIpPool;
use crate::resource::vapp::NetworkAttachment;
use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr};
use vcdflow_cloud::model::{
    FirewallRule, FirewallRuleProtocols, IpRange, NetworkConnection, NetworkConnectionSection,
};

/// Numeric port meaning "any port"
pub const ANY_PORT: i32 = -1;

pub fn expand_ip_ranges(pools: &[StaticIpPool]) -> Vec<IpRange> {
    pools
        .iter()
        .map(|p| IpRange {
            start_address: p.start_address.clone(),
            end_address: p.end_address.clone(),
        })
        .collect()
}

/// Protocol flags for a declared protocol.
///
/// Exactly one flag is set. Anything other than tcp/udp/icmp, including
/// multi-protocol spellings such as "tcp+udp", collapses to `any`.
pub fn protocol_flags(protocol: &str) -> FirewallRuleProtocols {
    match protocol {
        "tcp" => FirewallRuleProtocols {
            tcp: true,
            ..Default::default()
        },
        "udp" => FirewallRuleProtocols {
            udp: true,
            ..Default::default()
        },
        "icmp" => FirewallRuleProtocols {
            icmp: true,
            ..Default::default()
        },
        _ => FirewallRuleProtocols {
            any: true,
            ..Default::default()
        },
    }
}

/// Declared protocol name for remote flags (first set flag wins)
pub fn protocol_name(protocols: &FirewallRuleProtocols) -> &'static str {
    if protocols.tcp {
        return "tcp";
    }
    if protocols.udp {
        return "udp";
    }
    if protocols.icmp {
        return "icmp";
    }
    "any"
}

/// Integer value of a port field, [`ANY_PORT`] when it is not a literal
pub fn numeric_port(port: &str) -> i32 {
    port.parse::<i32>().unwrap_or(ANY_PORT)
}

pub fn port_string(port: i32) -> String {
    if port == ANY_PORT {
        return "any".to_string();
    }
    port.to_string()
}

/// Wire rule for one declared rule; enable/logging flags are fixed
pub fn expand_firewall_rule(rule: &FirewallRuleConfig) -> FirewallRule {
    FirewallRule {
        id: String::new(),
        is_enabled: true,
        match_on_translate: false,
        description: rule.description.clone(),
        policy: rule.policy.clone(),
        protocols: protocol_flags(&rule.protocol),
        port: numeric_port(&rule.destination_port),
        destination_port_range: rule.destination_port.clone(),
        destination_ip: rule.destination_ip.clone(),
        source_port: numeric_port(&rule.source_port),
        source_port_range: rule.source_port.clone(),
        source_ip: rule.source_ip.clone(),
        enable_logging: false,
    }
}

/// Declared rules appended after the rules already on the gateway
pub fn expand_firewall_rules(
    declared: &[FirewallRuleConfig],
    existing: &[FirewallRule],
) -> Vec<FirewallRule> {
    let mut rules = existing.to_vec();
    rules.extend(declared.iter().map(expand_firewall_rule));
    rules
}

/// Find the id of the remote rule that a declared rule produced.
///
/// Ids in `claimed` are skipped so identical declared rules bind to
/// distinct remote rules.
pub fn match_firewall_rule(
    declared: &FirewallRuleConfig,
    remote: &[FirewallRule],
    claimed: &HashSet<String>,
) -> Option<String> {
    let protocol = protocol_name(&protocol_flags(&declared.protocol));
    let destination_port = port_string(numeric_port(&declared.destination_port));
    let source_port = port_string(numeric_port(&declared.source_port));

    remote
        .iter()
        .filter(|r| !r.id.is_empty() && !claimed.contains(&r.id))
        .find(|r| {
            r.description == declared.description
                && r.policy == declared.policy
                && protocol_name(&r.protocols) == protocol
                && port_string(r.port) == destination_port
                && r.destination_ip.eq_ignore_ascii_case(&declared.destination_ip)
                && port_string(r.source_port) == source_port
                && r.source_ip.eq_ignore_ascii_case(&declared.source_ip)
        })
        .map(|r| r.id.clone())
}

/// Remote allocation mode → declared vocabulary; unknown modes map to ""
pub fn allocation_mode_to_declared(mode: &str) -> &'static str {
    match mode {
        "DHCP" => "dhcp",
        "NONE" => "none",
        "POOL" => "allocated",
        _ => "",
    }
}

/// Declared allocation mode → remote vocabulary; unknown values mean MANUAL
pub fn declared_to_allocation_mode(mode: &str) -> &'static str {
    match mode {
        "dhcp" => "DHCP",
        "none" => "NONE",
        "allocated" => "POOL",
        _ => "MANUAL",
    }
}

/// Allocation mode and address for one attachment.
///
/// An explicit `ip_allocation_mode` wins; otherwise `ip` may carry a mode
/// keyword ("dhcp", "allocated", "none") or a literal address. With
/// neither, the interface uses DHCP.
fn attachment_addressing(attachment: &NetworkAttachment) -> (&'static str, Option<String>) {
    let ip = attachment.ip.as_deref().unwrap_or("");
    let mode = attachment.ip_allocation_mode.as_deref().unwrap_or("");

    if !mode.is_empty() {
        let wire = declared_to_allocation_mode(mode);
        let address = (wire == "MANUAL" && !ip.is_empty()).then(|| ip.to_string());
        return (wire, address);
    }

    match ip {
        "" | "dhcp" => ("DHCP", None),
        "allocated" => ("POOL", None),
        "none" => ("NONE", None),
        literal => ("MANUAL", Some(literal.to_string())),
    }
}

pub fn expand_network_connections(attachments: &[NetworkAttachment]) -> NetworkConnectionSection {
    let primary = attachments
        .iter()
        .position(|a| a.is_primary)
        .unwrap_or(0) as u32;

    let network_connection = attachments
        .iter()
        .enumerate()
        .map(|(index, attachment)| {
            let (mode, ip_address) = attachment_addressing(attachment);
            NetworkConnection {
                network: attachment.orgnetwork.clone(),
                network_connection_index: index as u32,
                ip_address,
                is_connected: true,
                ip_address_allocation_mode: mode.to_string(),
                mac_address: None,
            }
        })
        .collect();

    NetworkConnectionSection {
        primary_network_connection_index: primary,
        network_connection,
    }
}

pub fn flatten_network_connections(section: &NetworkConnectionSection) -> Vec<NetworkAttachment> {
    section
        .network_connection
        .iter()
        .map(|c| NetworkAttachment {
            orgnetwork: c.network.clone(),
            ip: c.ip_address.clone(),
            ip_allocation_mode: Some(
                allocation_mode_to_declared(&c.ip_address_allocation_mode).to_string(),
            ),
            is_primary: c.network_connection_index == section.primary_network_connection_index,
        })
        .collect()
}

/// Whether every interface that should have an address reports one
pub fn has_acquired_addresses(attachments: &[NetworkAttachment]) -> bool {
    !attachments.is_empty()
        && attachments.iter().all(|a| {
            a.ip_allocation_mode.as_deref() == Some("none")
                || a.ip.as_deref().is_some_and(|ip| !ip.is_empty())
        })
}

/// Equality on parsed addresses ("::1" equals "0:0:0:0:0:0:0:1"); an
/// unparsable address never matches
pub fn ip_equal(a: &str, b: &str) -> bool {
    match (a.parse::<IpAddr>(), b.parse::<IpAddr>()) {
        (Ok(x), Ok(y)) => x == y,
        _ => false,
    }
}

pub fn is_ipv4(s: &str) -> bool {
    s.parse::<Ipv4Addr>().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(protocol: &str, dport: &str, sport: &str) -> FirewallRuleConfig {
        FirewallRuleConfig {
            id: None,
            description: "web".to_string(),
            policy: "allow".to_string(),
            protocol: protocol.to_string(),
            destination_port: dport.to_string(),
            destination_ip: "10.0.0.10".to_string(),
            source_port: sport.to_string(),
            source_ip: "Any".to_string(),
        }
    }

    fn flag_count(p: &FirewallRuleProtocols) -> usize {
        [p.tcp, p.udp, p.icmp, p.any].iter().filter(|f| **f).count()
    }

    #[test]
    fn test_protocol_single_flag_and_decode() {
        let cases = [
            ("tcp", "tcp"),
            ("udp", "udp"),
            ("icmp", "icmp"),
            ("any", "any"),
            ("tcp+udp", "any"),
            ("TCP", "any"),
            ("", "any"),
        ];
        for (declared, decoded) in cases {
            let flags = protocol_flags(declared);
            assert_eq!(flag_count(&flags), 1, "{declared}");
            assert_eq!(protocol_name(&flags), decoded, "{declared}");
        }
    }

    #[test]
    fn test_numeric_ports() {
        for port in ["0", "22", "443", "65535"] {
            let n = numeric_port(port);
            assert_eq!(n, port.parse::<i32>().unwrap());
            assert_eq!(port_string(n), port);
        }
        for port in ["any", "", "80-90", "http"] {
            assert_eq!(numeric_port(port), ANY_PORT);
            assert_eq!(port_string(numeric_port(port)), "any");
        }
    }

    #[test]
    fn test_expand_firewall_rule_static_flags() {
        let r = expand_firewall_rule(&rule("udp", "53", "any"));
        assert!(r.is_enabled);
        assert!(!r.enable_logging);
        assert!(!r.match_on_translate);
        assert!(r.protocols.udp);
        assert_eq!(r.port, 53);
        assert_eq!(r.destination_port_range, "53");
        assert_eq!(r.source_port, ANY_PORT);
        assert_eq!(r.source_port_range, "any");
    }

    #[test]
    fn test_expand_firewall_rules_appends() {
        let mut existing = expand_firewall_rule(&rule("tcp", "22", "any"));
        existing.id = "1".to_string();
        let rules = expand_firewall_rules(&[rule("tcp", "443", "any")], &[existing.clone()]);
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0], existing);
        assert_eq!(rules[1].port, 443);
        assert!(rules[1].id.is_empty());
    }

    #[test]
    fn test_match_firewall_rule() {
        let declared = rule("tcp", "443", "any");
        let mut a = expand_firewall_rule(&declared);
        a.id = "7".to_string();
        a.source_ip = "any".to_string(); // case differs from declared "Any"
        let mut b = a.clone();
        b.id = "8".to_string();
        let mut other = expand_firewall_rule(&rule("udp", "443", "any"));
        other.id = "9".to_string();
        let remote = vec![other, a, b];

        let mut claimed = HashSet::new();
        assert_eq!(
            match_firewall_rule(&declared, &remote, &claimed).as_deref(),
            Some("7")
        );
        claimed.insert("7".to_string());
        assert_eq!(
            match_firewall_rule(&declared, &remote, &claimed).as_deref(),
            Some("8")
        );
        claimed.insert("8".to_string());
        assert_eq!(match_firewall_rule(&declared, &remote, &claimed), None);
    }

    #[test]
    fn test_allocation_modes() {
        for (wire, declared) in [("DHCP", "dhcp"), ("NONE", "none"), ("POOL", "allocated")] {
            assert_eq!(allocation_mode_to_declared(wire), declared);
            assert_eq!(declared_to_allocation_mode(declared), wire);
        }
        // Not a round trip: MANUAL reads back as "".
        assert_eq!(allocation_mode_to_declared("MANUAL"), "");
        assert_eq!(allocation_mode_to_declared("dhcp"), "");
        assert_eq!(declared_to_allocation_mode(""), "MANUAL");
    }

    fn attachment(net: &str, ip: Option<&str>, mode: Option<&str>, primary: bool) -> NetworkAttachment {
        NetworkAttachment {
            orgnetwork: net.to_string(),
            ip: ip.map(str::to_string),
            ip_allocation_mode: mode.map(str::to_string),
            is_primary: primary,
        }
    }

    #[test]
    fn test_expand_network_connections() {
        let section = expand_network_connections(&[
            attachment("lan", None, None, false),
            attachment("dmz", Some("10.1.0.5"), None, true),
            attachment("mgmt", None, Some("allocated"), false),
            attachment("backup", Some("dhcp"), None, false),
        ]);

        assert_eq!(section.primary_network_connection_index, 1);
        let modes: Vec<_> = section
            .network_connection
            .iter()
            .map(|c| c.ip_address_allocation_mode.as_str())
            .collect();
        assert_eq!(modes, ["DHCP", "MANUAL", "POOL", "DHCP"]);
        assert_eq!(
            section.network_connection[1].ip_address.as_deref(),
            Some("10.1.0.5")
        );
        assert!(section.network_connection.iter().all(|c| c.is_connected));
    }

    #[test]
    fn test_flatten_network_connections() {
        let mut section = expand_network_connections(&[
            attachment("lan", None, Some("dhcp"), false),
            attachment("dmz", None, Some("allocated"), true),
        ]);
        section.network_connection[0].ip_address = Some("192.168.1.20".to_string());
        section.network_connection[1].ip_address = Some("10.1.0.7".to_string());

        let flat = flatten_network_connections(&section);
        assert_eq!(flat[0].ip_allocation_mode.as_deref(), Some("dhcp"));
        assert!(!flat[0].is_primary);
        assert_eq!(flat[1].ip_allocation_mode.as_deref(), Some("allocated"));
        assert!(flat[1].is_primary);
        assert!(has_acquired_addresses(&flat));
    }

    #[test]
    fn test_has_acquired_addresses() {
        assert!(!has_acquired_addresses(&[]));
        assert!(has_acquired_addresses(&[attachment("lan", None, Some("none"), true)]));
        assert!(!has_acquired_addresses(&[attachment("lan", None, Some("dhcp"), true)]));
        assert!(!has_acquired_addresses(&[attachment("lan", Some(""), Some("allocated"), true)]));
    }

    #[test]
    fn test_ip_helpers() {
        assert!(ip_equal("::1", "0:0:0:0:0:0:0:1"));
        assert!(ip_equal("10.0.0.1", "10.0.0.1"));
        assert!(!ip_equal("10.0.0.1", "10.0.0.2"));
        assert!(!ip_equal("dhcp", "dhcp"));

        assert!(is_ipv4("192.168.0.1"));
        assert!(!is_ipv4("::1"));
        assert!(!is_ipv4("300.1.1.1"));
        assert!(!is_ipv4("gateway"));
    }

    #[test]
    fn test_expand_ip_ranges() {
        let ranges = expand_ip_ranges(&[StaticIpPool {
            start_address: "10.0.0.100".to_string(),
            end_address: "10.0.0.150".to_string(),
        }]);
        assert_eq!(ranges.len(), 1);
        assert_eq!(ranges[0].start_address, "10.0.0.100");
        assert_eq!(ranges[0].end_address, "10.0.0.150");
    }
}
