//! Remote control-plane seam
//!
//! Reconcilers only talk to the control plane through [`VcdApi`]. Lookups
//! return `Ok(None)` when the entity does not exist; mutations return the
//! [`Task`] to wait on. Implementations must produce classified errors
//! ([`CloudError::Api`](crate::CloudError::Api) /
//! [`CloudError::TaskFailed`](crate::CloudError::TaskFailed)) for faults
//! reported by the control plane.

use crate::error::Result;
use crate::model::{
    ComposeVAppRequest, EdgeGateway, FirewallRule, IpRange, NetworkConnectionSection,
    OrgVdcNetwork, OrgVdcNetworkSpec, OvfProperties, Reference, VApp, VAppStatus, VAppTemplate,
    Vm,
};
use crate::task::{Task, TaskWaiter};
use async_trait::async_trait;

/// DHCP pool parameters for [`VcdApi::add_dhcp_pool`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DhcpPoolRequest {
    pub range: IpRange,
    pub default_lease_time: u32,
    pub max_lease_time: u32,
}

#[async_trait]
pub trait VcdApi: TaskWaiter {
    /// Organization and VDC the session is bound to
    fn org(&self) -> &Reference;
    fn vdc(&self) -> &Reference;

    /// Fetch the VDC entity to confirm the session and the VDC are still
    /// valid. Nothing is cached: lookups always go through the query service.
    async fn refresh_vdc(&self) -> Result<()>;

    // ----- lookups -----

    async fn find_vapp_template(&self, catalog: &str, item: &str) -> Result<Option<VAppTemplate>>;
    async fn find_network(&self, name: &str) -> Result<Option<OrgVdcNetwork>>;
    async fn find_storage_profile(&self, name: &str) -> Result<Option<Reference>>;
    async fn find_vapp(&self, name: &str) -> Result<Option<VApp>>;
    async fn find_vm(&self, vapp: &VApp, name: &str) -> Result<Option<Vm>>;
    async fn vapp_status(&self, vapp: &VApp) -> Result<VAppStatus>;
    async fn find_edge_gateway(&self, name: &str) -> Result<Option<EdgeGateway>>;

    // ----- vApp composition -----

    async fn compose_vapp(&self, request: &ComposeVAppRequest) -> Result<Task>;
    /// Compose an empty vApp; the control plane answers synchronously
    async fn compose_raw_vapp(&self, name: &str) -> Result<()>;

    // ----- vApp / VM mutations -----

    /// Rename the primary VM of the vApp
    async fn rename_vm(&self, vapp: &VApp, name: &str) -> Result<Task>;
    async fn change_network_config(
        &self,
        vapp: &VApp,
        section: &NetworkConnectionSection,
    ) -> Result<Task>;
    async fn set_ovf(&self, vapp: &VApp, properties: &OvfProperties) -> Result<Task>;
    async fn power_on(&self, vapp: &VApp) -> Result<Task>;
    async fn power_off(&self, vapp: &VApp) -> Result<Task>;
    async fn undeploy(&self, vapp: &VApp) -> Result<Task>;
    async fn delete_vapp(&self, vapp: &VApp) -> Result<Task>;
    async fn run_customization_script(
        &self,
        vapp: &VApp,
        computer_name: &str,
        script: &str,
    ) -> Result<Task>;
    async fn add_metadata(&self, vapp: &VApp, key: &str, value: &str) -> Result<Task>;
    async fn delete_metadata(&self, vapp: &VApp, key: &str) -> Result<Task>;
    async fn change_storage_profile(&self, vapp: &VApp, profile: &str) -> Result<Task>;
    async fn change_memory_size(&self, vapp: &VApp, memory_mb: u32) -> Result<Task>;
    async fn change_cpu_count(&self, vapp: &VApp, cpus: u32) -> Result<Task>;

    // ----- networks and edge gateways -----

    async fn create_network(&self, spec: &OrgVdcNetworkSpec) -> Result<Task>;
    async fn delete_network(&self, network: &OrgVdcNetwork) -> Result<Task>;
    async fn add_dhcp_pool(
        &self,
        gateway: &EdgeGateway,
        network: &OrgVdcNetwork,
        pools: &[DhcpPoolRequest],
    ) -> Result<Task>;
    /// Replace the firewall rule list of the gateway
    async fn update_firewall_rules(
        &self,
        gateway: &EdgeGateway,
        default_action: &str,
        rules: &[FirewallRule],
    ) -> Result<Task>;
}
