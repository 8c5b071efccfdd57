//! Declared resource records and their reconcilers

pub mod firewall;
pub mod network;
pub mod vapp;

use crate::error::{ProviderError, Result};
pub use firewall::{FirewallRuleConfig, FirewallRulesReconciler, FirewallRulesResource};
pub use network::{DhcpPoolConfig, NetworkReconciler, NetworkResource, StaticIpPool};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
pub use vapp::{NetworkAttachment, VAppReconciler, VAppResource};

/// One declared resource, tagged by `type` in manifests and state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResourceSpec {
    Vapp(VAppResource),
    Network(NetworkResource),
    FirewallRules(FirewallRulesResource),
}

/// Attribute names that differ between a declared record and a tracked one
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceDiff {
    /// Attributes that cannot change in place
    pub replace: Vec<&'static str>,
    pub update: Vec<&'static str>,
}

impl ResourceDiff {
    pub fn is_empty(&self) -> bool {
        self.replace.is_empty() && self.update.is_empty()
    }

    pub fn requires_replacement(&self) -> bool {
        !self.replace.is_empty()
    }

    /// All changed attributes, replace-on-change ones first
    pub fn changes(&self) -> Vec<String> {
        self.replace
            .iter()
            .chain(self.update.iter())
            .map(|s| s.to_string())
            .collect()
    }

    pub(crate) fn check<T: PartialEq + ?Sized>(
        &mut self,
        attribute: &'static str,
        declared: &T,
        tracked: &T,
        replace: bool,
    ) {
        if declared != tracked {
            self.flag(attribute, replace);
        }
    }

    pub(crate) fn flag(&mut self, attribute: &'static str, replace: bool) {
        if replace {
            self.replace.push(attribute);
        } else {
            self.update.push(attribute);
        }
    }
}

impl ResourceSpec {
    pub fn resource_type(&self) -> &'static str {
        match self {
            ResourceSpec::Vapp(_) => "vapp",
            ResourceSpec::Network(_) => "network",
            ResourceSpec::FirewallRules(_) => "firewall_rules",
        }
    }

    /// Name part of the state key
    pub fn name(&self) -> &str {
        match self {
            ResourceSpec::Vapp(r) => &r.name,
            ResourceSpec::Network(r) => &r.name,
            ResourceSpec::FirewallRules(r) => &r.edge_gateway,
        }
    }

    /// State key: `type:name`
    pub fn key(&self) -> String {
        format!("{}:{}", self.resource_type(), self.name())
    }

    /// Tracked identifier, `None` until created or after the resource vanished
    pub fn id(&self) -> Option<&str> {
        match self {
            ResourceSpec::Vapp(r) => r.id.as_deref(),
            ResourceSpec::Network(r) => r.id.as_deref(),
            ResourceSpec::FirewallRules(r) => r.id.as_deref(),
        }
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        match self {
            ResourceSpec::Vapp(r) => r.validate(),
            ResourceSpec::Network(r) => r.validate(),
            ResourceSpec::FirewallRules(r) => r.validate(),
        }
    }

    /// Compare a declared record against the tracked one of the same key
    pub fn diff(&self, tracked: &ResourceSpec) -> ResourceDiff {
        match (self, tracked) {
            (ResourceSpec::Vapp(d), ResourceSpec::Vapp(t)) => d.diff(t),
            (ResourceSpec::Network(d), ResourceSpec::Network(t)) => d.diff(t),
            (ResourceSpec::FirewallRules(d), ResourceSpec::FirewallRules(t)) => d.diff(t),
            _ => ResourceDiff {
                replace: vec!["type"],
                update: Vec::new(),
            },
        }
    }

    /// Carry computed fields of the tracked record over to a declared one
    pub fn with_computed_from(mut self, tracked: &ResourceSpec) -> Self {
        match (&mut self, tracked) {
            (ResourceSpec::Vapp(d), ResourceSpec::Vapp(t)) => {
                d.id = t.id.clone();
                d.href = t.href.clone();
            }
            (ResourceSpec::Network(d), ResourceSpec::Network(t)) => {
                d.id = t.id.clone();
                d.href = t.href.clone();
            }
            (ResourceSpec::FirewallRules(d), ResourceSpec::FirewallRules(t)) => {
                d.id = t.id.clone();
                for (rule, tracked_rule) in d.rules.iter_mut().zip(&t.rules) {
                    rule.id = tracked_rule.id.clone();
                }
            }
            _ => {}
        }
        self
    }
}

/// Declared resources in manifest order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceSet {
    resources: Vec<ResourceSpec>,
}

impl ResourceSet {
    pub fn new(resources: Vec<ResourceSpec>) -> Self {
        Self { resources }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResourceSpec> {
        self.resources.iter()
    }

    pub fn get(&self, key: &str) -> Option<&ResourceSpec> {
        self.resources.iter().find(|r| r.key() == key)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Check every record and reject duplicate keys
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for resource in &self.resources {
            let key = resource.key();
            if !seen.insert(key.clone()) {
                return Err(ProviderError::DuplicateResource(key));
            }
            resource
                .validate()
                .map_err(|reason| ProviderError::InvalidResource { key, reason })?;
        }
        Ok(())
    }
}
