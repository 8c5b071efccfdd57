//! Organization VDC network reconciler

use super::ResourceDiff;
use crate::structure::{expand_ip_ranges, is_ipv4};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use vcdflow_cloud::model::{IpRange, OrgVdcNetworkSpec, Reference};
use vcdflow_cloud::{
    CloudError, DhcpPoolRequest, Reconciler, Result, RetryExecutor, RetryPolicy, VcdApi,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticIpPool {
    pub start_address: String,
    pub end_address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DhcpPoolConfig {
    pub start_address: String,
    pub end_address: String,
    #[serde(default = "default_lease_time")]
    pub default_lease_time: u32,
    #[serde(default = "max_lease_time")]
    pub max_lease_time: u32,
}

fn default_lease_time() -> u32 {
    3600
}

fn max_lease_time() -> u32 {
    7200
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkResource {
    pub name: String,
    #[serde(default = "default_fence_mode")]
    pub fence_mode: String,
    pub edge_gateway: String,
    #[serde(default = "default_netmask")]
    pub netmask: String,
    pub gateway: String,
    #[serde(default = "default_dns1")]
    pub dns1: String,
    #[serde(default = "default_dns2")]
    pub dns2: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns_suffix: Option<String>,
    #[serde(default)]
    pub shared: bool,
    #[serde(default)]
    pub dhcp_pool: Vec<DhcpPoolConfig>,
    #[serde(default)]
    pub static_ip_pool: Vec<StaticIpPool>,

    // computed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
}

fn default_fence_mode() -> String {
    "natRouted".to_string()
}

fn default_netmask() -> String {
    "255.255.255.0".to_string()
}

fn default_dns1() -> String {
    "8.8.8.8".to_string()
}

fn default_dns2() -> String {
    "8.8.4.4".to_string()
}

const FENCE_MODES: [&str; 3] = ["natRouted", "isolated", "bridged"];

impl NetworkResource {
    pub fn new(
        name: impl Into<String>,
        edge_gateway: impl Into<String>,
        gateway: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            fence_mode: default_fence_mode(),
            edge_gateway: edge_gateway.into(),
            netmask: default_netmask(),
            gateway: gateway.into(),
            dns1: default_dns1(),
            dns2: default_dns2(),
            dns_suffix: None,
            shared: false,
            dhcp_pool: Vec::new(),
            static_ip_pool: Vec::new(),
            id: None,
            href: None,
        }
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name must not be empty".to_string());
        }
        if self.edge_gateway.trim().is_empty() {
            return Err("edge_gateway must not be empty".to_string());
        }
        if !FENCE_MODES.contains(&self.fence_mode.as_str()) {
            return Err(format!(
                "fence_mode must be one of {}: {}",
                FENCE_MODES.join(", "),
                self.fence_mode
            ));
        }

        let mut addresses = vec![
            ("gateway", self.gateway.as_str()),
            ("netmask", self.netmask.as_str()),
            ("dns1", self.dns1.as_str()),
            ("dns2", self.dns2.as_str()),
        ];
        for pool in &self.static_ip_pool {
            addresses.push(("static_ip_pool.start_address", pool.start_address.as_str()));
            addresses.push(("static_ip_pool.end_address", pool.end_address.as_str()));
        }
        for pool in &self.dhcp_pool {
            addresses.push(("dhcp_pool.start_address", pool.start_address.as_str()));
            addresses.push(("dhcp_pool.end_address", pool.end_address.as_str()));
        }
        if let Some((field, value)) = addresses.iter().find(|(_, v)| !is_ipv4(v)) {
            return Err(format!("{field} is not an IPv4 address: {value}"));
        }

        if let Some(pool) = self
            .dhcp_pool
            .iter()
            .find(|p| p.default_lease_time > p.max_lease_time)
        {
            return Err(format!(
                "dhcp_pool {}-{}: default_lease_time exceeds max_lease_time",
                pool.start_address, pool.end_address
            ));
        }
        Ok(())
    }

    /// Every attribute is replace-on-change
    pub fn diff(&self, tracked: &NetworkResource) -> ResourceDiff {
        let mut diff = ResourceDiff::default();
        diff.check("name", &self.name, &tracked.name, true);
        diff.check("fence_mode", &self.fence_mode, &tracked.fence_mode, true);
        diff.check("edge_gateway", &self.edge_gateway, &tracked.edge_gateway, true);
        diff.check("netmask", &self.netmask, &tracked.netmask, true);
        diff.check("gateway", &self.gateway, &tracked.gateway, true);
        diff.check("dns1", &self.dns1, &tracked.dns1, true);
        diff.check("dns2", &self.dns2, &tracked.dns2, true);
        diff.check("dns_suffix", &self.dns_suffix, &tracked.dns_suffix, true);
        diff.check("shared", &self.shared, &tracked.shared, true);
        diff.check("dhcp_pool", &self.dhcp_pool, &tracked.dhcp_pool, true);
        diff.check("static_ip_pool", &self.static_ip_pool, &tracked.static_ip_pool, true);
        diff
    }

    fn spec(&self, edge_gateway: Reference) -> OrgVdcNetworkSpec {
        OrgVdcNetworkSpec {
            name: self.name.clone(),
            fence_mode: self.fence_mode.clone(),
            edge_gateway,
            gateway: self.gateway.clone(),
            netmask: self.netmask.clone(),
            dns1: self.dns1.clone(),
            dns2: self.dns2.clone(),
            dns_suffix: self.dns_suffix.clone().filter(|s| !s.is_empty()),
            is_shared: self.shared,
            ip_ranges: expand_ip_ranges(&self.static_ip_pool),
        }
    }

    fn dhcp_requests(&self) -> Vec<DhcpPoolRequest> {
        self.dhcp_pool
            .iter()
            .map(|p| DhcpPoolRequest {
                range: IpRange {
                    start_address: p.start_address.clone(),
                    end_address: p.end_address.clone(),
                },
                default_lease_time: p.default_lease_time,
                max_lease_time: p.max_lease_time,
            })
            .collect()
    }
}

pub struct NetworkReconciler {
    api: Arc<dyn VcdApi>,
    retry: RetryExecutor,
}

impl NetworkReconciler {
    pub fn new(api: Arc<dyn VcdApi>, retry: RetryExecutor) -> Self {
        Self { api, retry }
    }
}

#[async_trait]
impl Reconciler for NetworkReconciler {
    type Resource = NetworkResource;

    fn resource_type(&self) -> &'static str {
        "network"
    }

    async fn create(&self, planned: NetworkResource) -> Result<NetworkResource> {
        planned.validate().map_err(CloudError::InvalidConfig)?;
        let api = self.api.as_ref();
        let name = planned.name.as_str();
        let gateway_name = planned.edge_gateway.as_str();

        let gateway = api
            .find_edge_gateway(gateway_name)
            .await?
            .ok_or_else(|| CloudError::not_found("edge gateway", gateway_name))?;

        api.refresh_vdc().await?;
        let network = match api.find_network(name).await? {
            // left behind by an earlier create that failed at the DHCP step
            Some(network) => {
                info!(network = %name, "Network already exists, resuming");
                network
            }
            None => {
                let spec = planned.spec(Reference::new(&gateway.name, &gateway.href));
                let spec = &spec;
                info!(network = %name, edge_gateway = %gateway_name, "Creating network");
                self.retry
                    .run(api, RetryPolicy::BusyOrInternal, "create_network", move || {
                        api.create_network(spec)
                    })
                    .await?;

                api.refresh_vdc().await?;
                api.find_network(name)
                    .await?
                    .ok_or_else(|| CloudError::not_found("network", name))?
            }
        };

        if !planned.dhcp_pool.is_empty() {
            let pools = planned.dhcp_requests();
            let (pools, network) = (&pools, &network);
            info!(network = %name, pools = pools.len(), "Adding DHCP pools");
            self.retry
                .retry(RetryPolicy::BusyEntity, "add_dhcp_pool", move || async move {
                    // the gateway configuration changes under us, fetch it per attempt
                    let gateway = api
                        .find_edge_gateway(gateway_name)
                        .await?
                        .ok_or_else(|| CloudError::not_found("edge gateway", gateway_name))?;
                    let task = api.add_dhcp_pool(&gateway, network, pools).await?;
                    api.wait_task(&task).await
                })
                .await?;
        }

        let mut planned = planned;
        planned.id = Some(planned.name.clone());
        planned.href = Some(network.href);
        self.read(planned).await
    }

    async fn read(&self, mut state: NetworkResource) -> Result<NetworkResource> {
        let Some(id) = state.id.clone() else {
            return Ok(state);
        };

        self.api.refresh_vdc().await?;
        match self.api.find_network(&id).await? {
            Some(network) => state.href = Some(network.href),
            None => {
                info!(network = %id, "Network no longer exists, dropping it from state");
                state.id = None;
                state.href = None;
            }
        }
        Ok(state)
    }

    async fn update(&self, _prior: &NetworkResource, planned: NetworkResource) -> Result<NetworkResource> {
        self.read(planned).await
    }

    async fn delete(&self, state: &NetworkResource) -> Result<()> {
        let api = self.api.as_ref();
        let id = state.id.as_deref().unwrap_or(&state.name);

        api.refresh_vdc().await?;
        let network = api
            .find_network(id)
            .await?
            .ok_or_else(|| CloudError::not_found("network", id))?;
        let network = &network;

        info!(network = %id, "Deleting network");
        self.retry
            .run(api, RetryPolicy::BusyOrInternal, "delete_network", move || {
                api.delete_network(network)
            })
            .await
    }
}
