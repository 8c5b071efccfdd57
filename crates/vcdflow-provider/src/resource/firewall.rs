//! Edge gateway firewall rule set reconciler
//!
//! The rule set is tracked by the edge gateway's name. Declared rules are
//! appended to whatever the gateway already has; the control plane assigns
//! rule ids, which are learned back by matching rule contents.

use super::ResourceDiff;
use crate::structure::{expand_firewall_rules, match_firewall_rule};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};
use vcdflow_cloud::model::{EdgeGateway, FirewallRule};
use vcdflow_cloud::{CloudError, Reconciler, Result, RetryExecutor, RetryPolicy, VcdApi};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirewallRuleConfig {
    /// Assigned by the control plane
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub description: String,
    /// `allow` or `deny`
    pub policy: String,
    /// `tcp`, `udp`, `icmp`; anything else matches any protocol
    pub protocol: String,
    pub destination_port: String,
    pub destination_ip: String,
    pub source_port: String,
    pub source_ip: String,
}

impl FirewallRuleConfig {
    /// Same rule ignoring the computed id
    fn same_rule(&self, other: &FirewallRuleConfig) -> bool {
        self.description == other.description
            && self.policy == other.policy
            && self.protocol == other.protocol
            && self.destination_port == other.destination_port
            && self.destination_ip == other.destination_ip
            && self.source_port == other.source_port
            && self.source_ip == other.source_ip
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirewallRulesResource {
    pub edge_gateway: String,
    /// `allow` or `deny`
    pub default_action: String,
    #[serde(default)]
    pub rules: Vec<FirewallRuleConfig>,

    // computed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

const ACTIONS: [&str; 2] = ["allow", "deny"];

impl FirewallRulesResource {
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.edge_gateway.trim().is_empty() {
            return Err("edge_gateway must not be empty".to_string());
        }
        if !ACTIONS.contains(&self.default_action.as_str()) {
            return Err(format!(
                "default_action must be allow or deny: {}",
                self.default_action
            ));
        }
        if let Some(rule) = self
            .rules
            .iter()
            .find(|r| !ACTIONS.contains(&r.policy.as_str()))
        {
            return Err(format!(
                "rule {:?}: policy must be allow or deny: {}",
                rule.description, rule.policy
            ));
        }
        Ok(())
    }

    /// Every attribute is replace-on-change; rule ids are not compared
    pub fn diff(&self, tracked: &FirewallRulesResource) -> ResourceDiff {
        let mut diff = ResourceDiff::default();
        diff.check("edge_gateway", &self.edge_gateway, &tracked.edge_gateway, true);
        diff.check(
            "default_action",
            &self.default_action,
            &tracked.default_action,
            true,
        );
        let rules_match = self.rules.len() == tracked.rules.len()
            && self
                .rules
                .iter()
                .zip(&tracked.rules)
                .all(|(d, t)| d.same_rule(t));
        if !rules_match {
            diff.flag("rules", true);
        }
        diff
    }

    fn tracked_rule_ids(&self) -> HashSet<String> {
        self.rules.iter().filter_map(|r| r.id.clone()).collect()
    }
}

/// Learn ids for rules that have none and drop rules whose id vanished.
///
/// `excluded` ids are never bound to a declared rule.
fn sync_rule_ids(
    rules: Vec<FirewallRuleConfig>,
    remote: &[FirewallRule],
    excluded: &HashSet<String>,
) -> Vec<FirewallRuleConfig> {
    let remote_ids: HashSet<&str> = remote.iter().map(|r| r.id.as_str()).collect();
    let mut claimed: HashSet<String> = excluded.clone();
    claimed.extend(rules.iter().filter_map(|r| r.id.clone()));

    rules
        .into_iter()
        .filter_map(|mut rule| match rule.id.as_deref() {
            Some(id) if remote_ids.contains(id) => Some(rule),
            Some(id) => {
                warn!(rule_id = %id, description = %rule.description, "Firewall rule removed outside vcdflow");
                None
            }
            None => {
                rule.id = match_firewall_rule(&rule, remote, &claimed);
                if let Some(id) = &rule.id {
                    claimed.insert(id.clone());
                }
                Some(rule)
            }
        })
        .collect()
}

pub struct FirewallRulesReconciler {
    api: Arc<dyn VcdApi>,
    retry: RetryExecutor,
}

impl FirewallRulesReconciler {
    pub fn new(api: Arc<dyn VcdApi>, retry: RetryExecutor) -> Self {
        Self { api, retry }
    }

    async fn require_gateway(&self, name: &str) -> Result<EdgeGateway> {
        self.api
            .find_edge_gateway(name)
            .await?
            .ok_or_else(|| CloudError::not_found("edge gateway", name))
    }

    async fn submit_rules(
        &self,
        gateway: &EdgeGateway,
        default_action: &str,
        rules: &[FirewallRule],
    ) -> Result<()> {
        let api = self.api.as_ref();
        debug!(edge_gateway = %gateway.name, rules = rules.len(), "Submitting firewall rules");
        self.retry
            .run(api, RetryPolicy::BusyEntity, "update_firewall_rules", move || {
                api.update_firewall_rules(gateway, default_action, rules)
            })
            .await
    }
}

#[async_trait]
impl Reconciler for FirewallRulesReconciler {
    type Resource = FirewallRulesResource;

    fn resource_type(&self) -> &'static str {
        "firewall_rules"
    }

    async fn create(&self, planned: FirewallRulesResource) -> Result<FirewallRulesResource> {
        planned.validate().map_err(CloudError::InvalidConfig)?;

        let gateway = self.require_gateway(&planned.edge_gateway).await?;
        let existing = &gateway.firewall_service.firewall_rule;
        let preexisting: HashSet<String> = existing.iter().map(|r| r.id.clone()).collect();

        let rules = expand_firewall_rules(&planned.rules, existing);
        info!(
            edge_gateway = %planned.edge_gateway,
            added = planned.rules.len(),
            existing = existing.len(),
            "Configuring firewall rules"
        );
        self.submit_rules(&gateway, &planned.default_action, &rules)
            .await?;

        // bind ids before read so rules that were already there stay unclaimed
        let gateway = self.require_gateway(&planned.edge_gateway).await?;
        let mut planned = planned;
        planned.rules = sync_rule_ids(
            planned.rules,
            &gateway.firewall_service.firewall_rule,
            &preexisting,
        );
        planned.id = Some(planned.edge_gateway.clone());
        self.read(planned).await
    }

    async fn read(&self, mut state: FirewallRulesResource) -> Result<FirewallRulesResource> {
        let Some(id) = state.id.clone() else {
            return Ok(state);
        };

        let Some(gateway) = self.api.find_edge_gateway(&id).await? else {
            info!(edge_gateway = %id, "Edge gateway no longer exists, dropping rules from state");
            state.id = None;
            return Ok(state);
        };

        state.rules = sync_rule_ids(
            state.rules,
            &gateway.firewall_service.firewall_rule,
            &HashSet::new(),
        );
        Ok(state)
    }

    async fn update(
        &self,
        _prior: &FirewallRulesResource,
        planned: FirewallRulesResource,
    ) -> Result<FirewallRulesResource> {
        self.read(planned).await
    }

    async fn delete(&self, state: &FirewallRulesResource) -> Result<()> {
        let id = state.id.as_deref().unwrap_or(&state.edge_gateway);
        let gateway = self.require_gateway(id).await?;

        let tracked = state.tracked_rule_ids();
        let remaining: Vec<FirewallRule> = gateway
            .firewall_service
            .firewall_rule
            .iter()
            .filter(|r| !tracked.contains(&r.id))
            .cloned()
            .collect();

        info!(
            edge_gateway = %id,
            removed = gateway.firewall_service.firewall_rule.len() - remaining.len(),
            "Removing firewall rules"
        );
        self.submit_rules(&gateway, &gateway.firewall_service.default_action, &remaining)
            .await
    }
}
