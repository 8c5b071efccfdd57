//! Virtual application reconciler
//!
//! A vApp is tracked by its name. Creation composes the vApp (from a
//! catalog template or empty), then converges the primary VM step by step:
//! rename, network configuration, OVF properties, power on and the guest
//! customization script. Each step is retried on its own and nothing is
//! rolled back when a later step fails; the next create resumes on the
//! vApp that already exists.

use super::ResourceDiff;
use crate::structure::{
    expand_network_connections, flatten_network_connections, has_acquired_addresses, ip_equal,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use vcdflow_cloud::model::{ComposeVAppRequest, VApp, VAppStatus};
use vcdflow_cloud::{CloudError, Reconciler, Result, RetryExecutor, RetryPolicy, VcdApi};

/// Attachment of the primary VM to an organization network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkAttachment {
    pub orgnetwork: String,
    /// Literal address, or one of the mode keywords `dhcp`, `allocated`, `none`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    /// `dhcp`, `allocated`, `none`; anything else means a manual address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_allocation_mode: Option<String>,
    #[serde(default)]
    pub is_primary: bool,
}

const IP_KEYWORDS: [&str; 3] = ["dhcp", "allocated", "none"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VAppResource {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_name: Option<String>,
    #[serde(default)]
    pub networks: Vec<NetworkAttachment>,
    /// Memory in MB
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpus: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_profile: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initscript: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    #[serde(default)]
    pub ovf: BTreeMap<String, String>,
    #[serde(default = "default_power_on")]
    pub power_on: bool,

    // computed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
}

fn default_power_on() -> bool {
    true
}

impl VAppResource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            template_name: None,
            catalog_name: None,
            networks: Vec::new(),
            memory: None,
            cpus: None,
            storage_profile: None,
            description: None,
            initscript: None,
            metadata: BTreeMap::new(),
            ovf: BTreeMap::new(),
            power_on: true,
            id: None,
            href: None,
        }
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name must not be empty".to_string());
        }
        if self.template_name.is_some() && self.catalog_name.is_none() {
            return Err("template_name requires catalog_name".to_string());
        }
        if self.memory == Some(0) {
            return Err("memory must be positive".to_string());
        }
        if self.cpus == Some(0) {
            return Err("cpus must be positive".to_string());
        }
        if self.networks.iter().filter(|n| n.is_primary).count() > 1 {
            return Err("at most one network can be primary".to_string());
        }
        Ok(())
    }

    pub fn diff(&self, tracked: &VAppResource) -> ResourceDiff {
        let mut diff = ResourceDiff::default();
        diff.check("name", &self.name, &tracked.name, true);
        diff.check("template_name", &self.template_name, &tracked.template_name, true);
        if !networks_match(&self.networks, &tracked.networks) {
            diff.flag("networks", true);
        }
        diff.check("initscript", &self.initscript, &tracked.initscript, true);
        diff.check("catalog_name", &self.catalog_name, &tracked.catalog_name, false);
        diff.check("memory", &self.memory, &tracked.memory, false);
        diff.check("cpus", &self.cpus, &tracked.cpus, false);
        diff.check(
            "storage_profile",
            &self.storage_profile,
            &tracked.storage_profile,
            false,
        );
        diff.check("description", &self.description, &tracked.description, false);
        diff.check("metadata", &self.metadata, &tracked.metadata, false);
        diff.check("ovf", &self.ovf, &tracked.ovf, false);
        diff.check("power_on", &self.power_on, &tracked.power_on, false);
        diff
    }

    /// Record with only the name set, as if nothing had been applied yet
    fn unconfigured(name: &str) -> Self {
        Self {
            power_on: false,
            ..Self::new(name)
        }
    }
}

fn primary_index(networks: &[NetworkAttachment]) -> usize {
    networks.iter().position(|n| n.is_primary).unwrap_or(0)
}

/// Declared attachments against observed ones. Unset `ip` and
/// `ip_allocation_mode` never differ; addresses compare as parsed IPs.
pub(crate) fn networks_match(declared: &[NetworkAttachment], observed: &[NetworkAttachment]) -> bool {
    if declared.len() != observed.len() {
        return false;
    }
    if !declared.is_empty() && primary_index(declared) != primary_index(observed) {
        return false;
    }
    declared.iter().zip(observed).all(|(d, o)| {
        if d.orgnetwork != o.orgnetwork {
            return false;
        }
        if let Some(mode) = d.ip_allocation_mode.as_deref() {
            if o.ip_allocation_mode.as_deref() != Some(mode) {
                return false;
            }
        }
        match d.ip.as_deref() {
            None => true,
            Some(ip) if IP_KEYWORDS.contains(&ip) => true,
            Some(ip) => o
                .ip
                .as_deref()
                .is_some_and(|observed| observed == ip || ip_equal(ip, observed)),
        }
    })
}

pub struct VAppReconciler {
    api: Arc<dyn VcdApi>,
    retry: RetryExecutor,
}

impl VAppReconciler {
    pub fn new(api: Arc<dyn VcdApi>, retry: RetryExecutor) -> Self {
        Self { api, retry }
    }

    async fn require_vapp(&self, name: &str) -> Result<VApp> {
        self.api
            .find_vapp(name)
            .await?
            .ok_or_else(|| CloudError::not_found("vApp", name))
    }

    /// Compose from the catalog template and converge the primary VM
    async fn create_from_template(
        &self,
        planned: &VAppResource,
        catalog: &str,
        template_name: &str,
    ) -> Result<()> {
        let api = self.api.as_ref();
        let name = planned.name.as_str();

        let template = api
            .find_vapp_template(catalog, template_name)
            .await?
            .ok_or_else(|| CloudError::not_found("vApp template", format!("{catalog}/{template_name}")))?;
        debug!(template = %template.href, "Resolved vApp template");

        let mut networks = Vec::with_capacity(planned.networks.len());
        for attachment in &planned.networks {
            let network = api
                .find_network(&attachment.orgnetwork)
                .await?
                .ok_or_else(|| CloudError::not_found("network", &attachment.orgnetwork))?;
            networks.push(network);
        }

        let storage_profile = match planned.storage_profile.as_deref().filter(|p| !p.is_empty()) {
            Some(profile) => Some(
                api.find_storage_profile(profile)
                    .await?
                    .ok_or_else(|| CloudError::not_found("storage profile", profile))?,
            ),
            None => None,
        };

        let vapp = match api.find_vapp(name).await? {
            Some(existing) => {
                info!(vapp = %name, "vApp already composed, resuming configuration");
                existing
            }
            None => {
                let request = ComposeVAppRequest {
                    name: name.to_string(),
                    description: planned.description.clone(),
                    template,
                    networks,
                    storage_profile,
                };
                let request = &request;
                info!(vapp = %name, "Composing vApp");
                self.retry
                    .run(api, RetryPolicy::BusyOrInternal, "compose_vapp", move || {
                        api.compose_vapp(request)
                    })
                    .await?;
                api.refresh_vdc().await?;
                self.require_vapp(name).await?
            }
        };
        let vapp = &vapp;

        self.retry
            .run(api, RetryPolicy::BusyEntity, "rename_vm", move || {
                api.rename_vm(vapp, name)
            })
            .await?;

        let section = expand_network_connections(&planned.networks);
        let section = &section;
        self.retry
            .run(api, RetryPolicy::BusyEntity, "change_network_config", move || {
                api.change_network_config(vapp, section)
            })
            .await?;

        if !planned.ovf.is_empty() {
            let ovf = &planned.ovf;
            self.retry
                .run(api, RetryPolicy::BusyEntity, "set_ovf", move || {
                    api.set_ovf(vapp, ovf)
                })
                .await?;
        }

        if planned.power_on {
            info!(vapp = %name, "Powering on");
            self.retry
                .run(api, RetryPolicy::BusyOrInternal, "power_on", move || {
                    api.power_on(vapp)
                })
                .await?;
        }

        if let Some(script) = planned.initscript.as_deref().filter(|s| !s.is_empty()) {
            info!(vapp = %name, "Running customization script");
            self.retry
                .run(
                    api,
                    RetryPolicy::BusyOrInternal,
                    "run_customization_script",
                    move || api.run_customization_script(vapp, name, script),
                )
                .await?;
        }

        Ok(())
    }

    async fn create_raw(&self, name: &str) -> Result<()> {
        let api = self.api.as_ref();
        if api.find_vapp(name).await?.is_some() {
            info!(vapp = %name, "vApp already composed");
            return Ok(());
        }
        info!(vapp = %name, "Composing empty vApp");
        self.retry
            .retry(RetryPolicy::BusyOrInternal, "compose_raw_vapp", move || async move {
                api.compose_raw_vapp(name).await?;
                api.refresh_vdc().await
            })
            .await
    }

    /// Poll the primary VM until its interfaces report addresses
    async fn observe_networks(&self, id: &str, vm_name: &str) -> Result<Vec<NetworkAttachment>> {
        let api = self.api.as_ref();
        self.retry
            .poll(
                "read_vapp_networks",
                "VM did not acquire IP address",
                move || async move {
                    api.refresh_vdc().await?;
                    let Some(vapp) = api.find_vapp(id).await? else {
                        return Ok(None);
                    };
                    let Some(vm) = api.find_vm(&vapp, vm_name).await? else {
                        return Ok(None);
                    };
                    let networks = flatten_network_connections(&vm.network_connection_section);
                    Ok(has_acquired_addresses(&networks).then_some(networks))
                },
            )
            .await
    }
}

#[async_trait]
impl Reconciler for VAppReconciler {
    type Resource = VAppResource;

    fn resource_type(&self) -> &'static str {
        "vapp"
    }

    async fn create(&self, planned: VAppResource) -> Result<VAppResource> {
        planned.validate().map_err(CloudError::InvalidConfig)?;
        let name = planned.name.clone();

        let prior = match (planned.template_name.as_deref(), planned.catalog_name.as_deref()) {
            (Some(template), Some(catalog)) => {
                self.create_from_template(&planned, catalog, template).await?;
                // networks, ovf, power state and storage profile are already converged
                VAppResource {
                    metadata: BTreeMap::new(),
                    memory: None,
                    cpus: None,
                    ..planned.clone()
                }
            }
            _ => {
                self.create_raw(&name).await?;
                VAppResource::unconfigured(&name)
            }
        };

        let mut planned = planned;
        planned.id = Some(name);
        self.update(&prior, planned).await
    }

    async fn read(&self, mut state: VAppResource) -> Result<VAppResource> {
        let Some(id) = state.id.clone() else {
            return Ok(state);
        };

        self.api.refresh_vdc().await?;
        let Some(vapp) = self.api.find_vapp(&id).await? else {
            info!(vapp = %id, "vApp no longer exists, dropping it from state");
            state.id = None;
            state.href = None;
            return Ok(state);
        };
        state.href = Some(vapp.href);

        if !state.networks.is_empty() {
            state.networks = self.observe_networks(&id, &state.name).await?;
        }
        Ok(state)
    }

    async fn update(&self, prior: &VAppResource, planned: VAppResource) -> Result<VAppResource> {
        let api = self.api.as_ref();
        let id = planned
            .id
            .clone()
            .or_else(|| prior.id.clone())
            .unwrap_or_else(|| planned.name.clone());

        api.refresh_vdc().await?;
        let vapp = self.require_vapp(&id).await?;
        let vapp = &vapp;
        let status = api.vapp_status(vapp).await?;
        debug!(vapp = %id, status = %status, "Updating vApp");

        if prior.metadata != planned.metadata {
            for key in prior.metadata.keys() {
                self.retry
                    .run(api, RetryPolicy::BusyEntity, "delete_metadata", move || {
                        api.delete_metadata(vapp, key)
                    })
                    .await?;
            }
            for (key, value) in &planned.metadata {
                self.retry
                    .run(api, RetryPolicy::BusyEntity, "add_metadata", move || {
                        api.add_metadata(vapp, key, value)
                    })
                    .await?;
            }
        }

        if !networks_match(&planned.networks, &prior.networks) {
            let section = expand_network_connections(&planned.networks);
            let section = &section;
            self.retry
                .run(api, RetryPolicy::BusyEntity, "change_network_config", move || {
                    api.change_network_config(vapp, section)
                })
                .await?;
        }

        if planned.storage_profile != prior.storage_profile {
            if let Some(profile) = planned.storage_profile.as_deref() {
                self.retry
                    .run(api, RetryPolicy::BusyEntity, "change_storage_profile", move || {
                        api.change_storage_profile(vapp, profile)
                    })
                    .await?;
            }
        }

        let compute_changed = planned.memory != prior.memory
            || planned.cpus != prior.cpus
            || planned.power_on != prior.power_on
            || planned.ovf != prior.ovf;

        if compute_changed {
            if status != VAppStatus::PoweredOff {
                let powered_off = self
                    .retry
                    .run(api, RetryPolicy::BusyOrInternal, "power_off", move || {
                        api.power_off(vapp)
                    })
                    .await;
                if let Err(e) = powered_off {
                    // an empty vApp cannot always be powered off
                    if planned.template_name.is_some() {
                        return Err(e);
                    }
                    warn!(vapp = %id, error = %e, "Power off failed, continuing");
                }
            }

            if planned.memory != prior.memory {
                if let Some(memory) = planned.memory {
                    self.retry
                        .run(api, RetryPolicy::BusyEntity, "change_memory_size", move || {
                            api.change_memory_size(vapp, memory)
                        })
                        .await?;
                }
            }

            if planned.cpus != prior.cpus {
                if let Some(cpus) = planned.cpus {
                    self.retry
                        .run(api, RetryPolicy::BusyEntity, "change_cpu_count", move || {
                            api.change_cpu_count(vapp, cpus)
                        })
                        .await?;
                }
            }

            if planned.power_on {
                self.retry
                    .run(api, RetryPolicy::BusyOrInternal, "power_on", move || {
                        api.power_on(vapp)
                    })
                    .await?;
            }

            if !planned.ovf.is_empty() {
                let ovf = &planned.ovf;
                self.retry
                    .run(api, RetryPolicy::BusyEntity, "set_ovf", move || {
                        api.set_ovf(vapp, ovf)
                    })
                    .await?;
            }
        }

        let mut planned = planned;
        planned.id = Some(id);
        self.read(planned).await
    }

    async fn delete(&self, state: &VAppResource) -> Result<()> {
        let api = self.api.as_ref();
        let id = state.id.as_deref().unwrap_or(&state.name);

        api.refresh_vdc().await?;
        let vapp = self.require_vapp(id).await?;
        let vapp = &vapp;

        let undeployed = self
            .retry
            .run(api, RetryPolicy::BusyOrInternal, "undeploy", move || {
                api.undeploy(vapp)
            })
            .await;
        if let Err(e) = undeployed {
            warn!(vapp = %id, error = %e, "Undeploy failed, deleting anyway");
        }

        info!(vapp = %id, "Deleting vApp");
        self.retry
            .run(api, RetryPolicy::BusyOrInternal, "delete_vapp", move || {
                api.delete_vapp(vapp)
            })
            .await
    }
}
