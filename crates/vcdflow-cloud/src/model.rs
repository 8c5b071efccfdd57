//! Observed-state and request records exchanged with the control plane
//!
//! Field names follow the JSON representation of the vCloud API, so the
//! HTTP client can (de)serialize most of these directly.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Named link to a remote entity
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reference {
    pub name: String,
    pub href: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
}

impl Reference {
    pub fn new(name: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            href: href.into(),
            media_type: None,
        }
    }
}

/// vApp template located through a catalog item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VAppTemplate {
    pub name: String,
    pub href: String,
}

/// Organization VDC network as returned by lookups
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrgVdcNetwork {
    pub name: String,
    pub href: String,
}

/// vApp power/deployment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VAppStatus {
    FailedCreation,
    Unresolved,
    Resolved,
    Suspended,
    PoweredOn,
    PoweredOff,
    Mixed,
    Unknown,
}

impl VAppStatus {
    /// Map the numeric status code of the vCloud API
    pub fn from_code(code: i32) -> Self {
        match code {
            -1 => VAppStatus::FailedCreation,
            0 => VAppStatus::Unresolved,
            1 => VAppStatus::Resolved,
            3 => VAppStatus::Suspended,
            4 => VAppStatus::PoweredOn,
            8 => VAppStatus::PoweredOff,
            10 => VAppStatus::Mixed,
            _ => VAppStatus::Unknown,
        }
    }
}

impl std::fmt::Display for VAppStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            VAppStatus::FailedCreation => "FAILED_CREATION",
            VAppStatus::Unresolved => "UNRESOLVED",
            VAppStatus::Resolved => "RESOLVED",
            VAppStatus::Suspended => "SUSPENDED",
            VAppStatus::PoweredOn => "POWERED_ON",
            VAppStatus::PoweredOff => "POWERED_OFF",
            VAppStatus::Mixed => "MIXED",
            VAppStatus::Unknown => "UNKNOWN",
        };
        write!(f, "{}", s)
    }
}

/// Observed virtual application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VApp {
    pub name: String,
    pub href: String,
    pub status: VAppStatus,
    #[serde(default)]
    pub description: Option<String>,
}

/// Observed virtual machine inside a vApp
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vm {
    pub name: String,
    pub href: String,
    #[serde(default)]
    pub network_connection_section: NetworkConnectionSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConnectionSection {
    #[serde(default)]
    pub primary_network_connection_index: u32,
    #[serde(default)]
    pub network_connection: Vec<NetworkConnection>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConnection {
    pub network: String,
    pub network_connection_index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub is_connected: bool,
    /// Wire allocation mode: DHCP, NONE, POOL or MANUAL
    pub ip_address_allocation_mode: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac_address: Option<String>,
}

/// Parameters for composing a vApp from a template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComposeVAppRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub template: VAppTemplate,
    pub networks: Vec<OrgVdcNetwork>,
    /// None keeps the VDC default storage profile
    #[serde(default)]
    pub storage_profile: Option<Reference>,
}

/// Product section (OVF) properties keyed by property name
pub type OvfProperties = BTreeMap<String, String>;

/// Firewall rule protocol flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirewallRuleProtocols {
    #[serde(default)]
    pub tcp: bool,
    #[serde(default)]
    pub udp: bool,
    #[serde(default)]
    pub icmp: bool,
    #[serde(default)]
    pub any: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirewallRule {
    /// Assigned by the control plane; empty for rules not yet submitted
    #[serde(default)]
    pub id: String,
    pub is_enabled: bool,
    pub match_on_translate: bool,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub policy: String,
    pub protocols: FirewallRuleProtocols,
    /// Numeric destination port, -1 meaning any
    pub port: i32,
    #[serde(default)]
    pub destination_port_range: String,
    #[serde(default)]
    pub destination_ip: String,
    /// Numeric source port, -1 meaning any
    pub source_port: i32,
    #[serde(default)]
    pub source_port_range: String,
    #[serde(default)]
    pub source_ip: String,
    pub enable_logging: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirewallService {
    pub is_enabled: bool,
    #[serde(default)]
    pub default_action: String,
    #[serde(default)]
    pub log_default_action: bool,
    #[serde(default)]
    pub firewall_rule: Vec<FirewallRule>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IpRange {
    pub start_address: String,
    pub end_address: String,
}

/// DHCP pool served by an edge gateway on one network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DhcpPool {
    pub network: Reference,
    pub is_enabled: bool,
    pub default_lease_time: u32,
    pub max_lease_time: u32,
    pub low_ip_address: String,
    pub high_ip_address: String,
}

/// Observed edge gateway with the service configuration we manage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeGateway {
    pub name: String,
    pub href: String,
    #[serde(default)]
    pub firewall_service: FirewallService,
    #[serde(default)]
    pub dhcp_pools: Vec<DhcpPool>,
}

/// Parameters for creating an organization VDC network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrgVdcNetworkSpec {
    pub name: String,
    pub fence_mode: String,
    pub edge_gateway: Reference,
    pub gateway: String,
    pub netmask: String,
    pub dns1: String,
    pub dns2: String,
    #[serde(default)]
    pub dns_suffix: Option<String>,
    pub is_shared: bool,
    #[serde(default)]
    pub ip_ranges: Vec<IpRange>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vapp_status_codes() {
        assert_eq!(VAppStatus::from_code(8), VAppStatus::PoweredOff);
        assert_eq!(VAppStatus::from_code(4), VAppStatus::PoweredOn);
        assert_eq!(VAppStatus::from_code(-1), VAppStatus::FailedCreation);
        assert_eq!(VAppStatus::from_code(42), VAppStatus::Unknown);
        assert_eq!(VAppStatus::PoweredOff.to_string(), "POWERED_OFF");
    }

    #[test]
    fn test_firewall_rule_wire_names() {
        let json = serde_json::json!({
            "id": "3",
            "isEnabled": true,
            "matchOnTranslate": false,
            "description": "ssh",
            "policy": "allow",
            "protocols": { "tcp": true },
            "port": 22,
            "destinationPortRange": "22",
            "destinationIp": "10.0.0.5",
            "sourcePort": -1,
            "sourcePortRange": "any",
            "sourceIp": "any",
            "enableLogging": false
        });
        let rule: FirewallRule = serde_json::from_value(json).unwrap();
        assert!(rule.protocols.tcp);
        assert!(!rule.protocols.any);
        assert_eq!(rule.port, 22);
        assert_eq!(rule.source_port, -1);
    }
}
