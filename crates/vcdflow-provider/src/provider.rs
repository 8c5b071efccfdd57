//! vCloud Director provider: plans and applies declared resources

use crate::error::Result;
use crate::resource::{
    FirewallRulesReconciler, NetworkReconciler, ResourceSet, ResourceSpec, VAppReconciler,
};
use std::sync::Arc;
use tracing::{error, info};
use vcdflow_cloud::{
    Action, ActionType, ApplyResult, AuthStatus, CloudError, GlobalState, Plan, Reconciler,
    RetryExecutor, VcdApi,
};

/// Tracked resources keyed by `type:name`
pub type ProviderState = GlobalState<ResourceSpec>;

/// Human-readable resource type name
fn type_label(resource_type: &str) -> &'static str {
    match resource_type {
        "vapp" => "vApp",
        "network" => "ネットワーク",
        "firewall_rules" => "ファイアウォールルール",
        _ => "リソース",
    }
}

fn declared_resource(desired: &ResourceSet, key: &str) -> vcdflow_cloud::Result<ResourceSpec> {
    desired
        .get(key)
        .cloned()
        .ok_or_else(|| CloudError::not_found("declared resource", key))
}

fn tracked_resource(state: &ProviderState, key: &str) -> vcdflow_cloud::Result<ResourceSpec> {
    state
        .get_resource(key)
        .cloned()
        .ok_or_else(|| CloudError::not_found("tracked resource", key))
}

/// Drives the three reconcilers for a set of declared resources
pub struct VcdProvider {
    api: Arc<dyn VcdApi>,
    vapps: VAppReconciler,
    networks: NetworkReconciler,
    firewalls: FirewallRulesReconciler,
}

impl VcdProvider {
    pub fn new(api: Arc<dyn VcdApi>, retry: RetryExecutor) -> Self {
        Self {
            vapps: VAppReconciler::new(api.clone(), retry.clone()),
            networks: NetworkReconciler::new(api.clone(), retry.clone()),
            firewalls: FirewallRulesReconciler::new(api.clone(), retry),
            api,
        }
    }

    pub fn name(&self) -> &str {
        "vcloud-director"
    }

    pub fn display_name(&self) -> &str {
        "vCloud Director"
    }

    /// Verify the session still works by refreshing the VDC
    pub async fn check_auth(&self) -> AuthStatus {
        match self.api.refresh_vdc().await {
            Ok(()) => AuthStatus::ok(format!(
                "{} / {}",
                self.api.org().name,
                self.api.vdc().name
            )),
            Err(e) => AuthStatus::failed(e.to_string()),
        }
    }

    async fn create(&self, planned: ResourceSpec) -> vcdflow_cloud::Result<ResourceSpec> {
        Ok(match planned {
            ResourceSpec::Vapp(r) => ResourceSpec::Vapp(self.vapps.create(r).await?),
            ResourceSpec::Network(r) => ResourceSpec::Network(self.networks.create(r).await?),
            ResourceSpec::FirewallRules(r) => {
                ResourceSpec::FirewallRules(self.firewalls.create(r).await?)
            }
        })
    }

    async fn read(&self, state: ResourceSpec) -> vcdflow_cloud::Result<ResourceSpec> {
        Ok(match state {
            ResourceSpec::Vapp(r) => ResourceSpec::Vapp(self.vapps.read(r).await?),
            ResourceSpec::Network(r) => ResourceSpec::Network(self.networks.read(r).await?),
            ResourceSpec::FirewallRules(r) => {
                ResourceSpec::FirewallRules(self.firewalls.read(r).await?)
            }
        })
    }

    async fn update(
        &self,
        prior: &ResourceSpec,
        planned: ResourceSpec,
    ) -> vcdflow_cloud::Result<ResourceSpec> {
        Ok(match (prior, planned) {
            (ResourceSpec::Vapp(p), ResourceSpec::Vapp(r)) => {
                ResourceSpec::Vapp(self.vapps.update(p, r).await?)
            }
            (ResourceSpec::Network(p), ResourceSpec::Network(r)) => {
                ResourceSpec::Network(self.networks.update(p, r).await?)
            }
            (ResourceSpec::FirewallRules(p), ResourceSpec::FirewallRules(r)) => {
                ResourceSpec::FirewallRules(self.firewalls.update(p, r).await?)
            }
            (prior, planned) => {
                return Err(CloudError::InvalidConfig(format!(
                    "cannot update {} into {}",
                    prior.key(),
                    planned.key()
                )));
            }
        })
    }

    async fn delete(&self, state: &ResourceSpec) -> vcdflow_cloud::Result<()> {
        match state {
            ResourceSpec::Vapp(r) => self.vapps.delete(r).await,
            ResourceSpec::Network(r) => self.networks.delete(r).await,
            ResourceSpec::FirewallRules(r) => self.firewalls.delete(r).await,
        }
    }

    /// Read every tracked resource. Records whose identifier was cleared are
    /// removed from state; their keys are returned.
    pub async fn refresh(&self, state: &mut ProviderState) -> Result<Vec<String>> {
        let keys: Vec<String> = state.resources.keys().cloned().collect();
        let mut removed = Vec::new();

        for key in keys {
            let Some(tracked) = state.get_resource(&key).cloned() else {
                continue;
            };
            let refreshed = self.read(tracked).await?;
            if refreshed.id().is_none() {
                info!(resource = %key, "Resource vanished, removing from state");
                state.remove_resource(&key);
                removed.push(key);
            } else {
                state.set_resource(key, refreshed);
            }
        }

        Ok(removed)
    }

    /// Compare declared resources with tracked state
    pub fn plan(&self, desired: &ResourceSet, state: &ProviderState) -> Plan {
        let mut actions = Vec::new();

        for resource in desired.iter() {
            let key = resource.key();
            let rtype = resource.resource_type();
            let label = type_label(rtype);
            let name = resource.name();

            let tracked = state.get_resource(&key).filter(|t| t.id().is_some());
            let action = match tracked {
                None => Action::new(
                    ActionType::Create,
                    rtype,
                    &key,
                    format!("{} {} を作成", label, name),
                ),
                Some(tracked) => {
                    let diff = resource.diff(tracked);
                    if diff.requires_replacement() {
                        Action::new(
                            ActionType::Replace,
                            rtype,
                            &key,
                            format!("{} {} を再作成", label, name),
                        )
                        .with_changes(diff.changes())
                    } else if !diff.is_empty() {
                        Action::new(
                            ActionType::Update,
                            rtype,
                            &key,
                            format!("{} {} を更新", label, name),
                        )
                        .with_changes(diff.changes())
                    } else {
                        Action::new(
                            ActionType::NoOp,
                            rtype,
                            &key,
                            format!("{} {} は変更なし", label, name),
                        )
                    }
                }
            };
            actions.push(action);
        }

        for (key, tracked) in state.resources.iter() {
            if desired.get(key).is_none() {
                actions.push(Action::new(
                    ActionType::Delete,
                    tracked.resource_type(),
                    key,
                    format!("{} {} を削除", type_label(tracked.resource_type()), tracked.name()),
                ));
            }
        }

        Plan::new(actions)
    }

    /// Execute the plan one action at a time. A failed action is recorded and
    /// the remaining actions still run.
    pub async fn apply(
        &self,
        plan: &Plan,
        desired: &ResourceSet,
        state: &mut ProviderState,
    ) -> ApplyResult {
        let mut result = ApplyResult::new();
        let start = std::time::Instant::now();

        for action in &plan.actions {
            if action.action_type == ActionType::NoOp {
                continue;
            }
            info!(action = %action.action_type, resource = %action.resource_key, "Applying");

            match self.apply_action(action, desired, state).await {
                Ok(message) => result.add_success(action.id.clone(), message),
                Err(e) => {
                    error!(resource = %action.resource_key, error = %e, "Action failed");
                    result.add_failure(action.id.clone(), e.to_string());
                }
            }
        }

        result.duration_ms = start.elapsed().as_millis() as u64;
        result
    }

    async fn apply_action(
        &self,
        action: &Action,
        desired: &ResourceSet,
        state: &mut ProviderState,
    ) -> vcdflow_cloud::Result<String> {
        let key = action.resource_key.as_str();
        let label = type_label(&action.resource_type);

        match action.action_type {
            ActionType::Create => {
                let created = self.create(declared_resource(desired, key)?).await?;
                let name = created.name().to_string();
                state.set_resource(key.to_string(), created);
                Ok(format!("{} {} を作成しました", label, name))
            }
            ActionType::Update => {
                let prior = tracked_resource(state, key)?;
                let planned = declared_resource(desired, key)?.with_computed_from(&prior);
                let updated = self.update(&prior, planned).await?;
                let name = updated.name().to_string();
                state.set_resource(key.to_string(), updated);
                Ok(format!("{} {} を更新しました", label, name))
            }
            ActionType::Replace => {
                let prior = tracked_resource(state, key)?;
                self.delete(&prior).await?;
                state.remove_resource(key);
                let created = self.create(declared_resource(desired, key)?).await?;
                let name = created.name().to_string();
                state.set_resource(key.to_string(), created);
                Ok(format!("{} {} を再作成しました", label, name))
            }
            ActionType::Delete => {
                let prior = tracked_resource(state, key)?;
                self.delete(&prior).await?;
                state.remove_resource(key);
                Ok(format!("{} {} を削除しました", label, prior.name()))
            }
            ActionType::NoOp => Ok(String::new()),
        }
    }

    /// Delete every tracked resource in reverse key order, so vApps go
    /// before the networks they attach to
    pub async fn destroy_all(&self, state: &mut ProviderState) -> ApplyResult {
        let mut result = ApplyResult::new();
        let start = std::time::Instant::now();

        let tracked: Vec<(String, ResourceSpec)> = state
            .resources
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        for (key, resource) in tracked.into_iter().rev() {
            let action_id = format!("delete-{}", key);
            let label = type_label(resource.resource_type());
            match self.delete(&resource).await {
                Ok(()) => {
                    state.remove_resource(&key);
                    result.add_success(
                        action_id,
                        format!("{} {} を削除しました", label, resource.name()),
                    );
                }
                Err(e) => {
                    error!(resource = %key, error = %e, "Delete failed");
                    result.add_failure(action_id, e.to_string());
                }
            }
        }

        result.duration_ms = start.elapsed().as_millis() as u64;
        result
    }
}
