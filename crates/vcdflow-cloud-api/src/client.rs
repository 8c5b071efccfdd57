//! [`VcdApi`] over the vCloud REST API

use crate::error::{ClientError, Result};
use crate::session::{VcdSession, check};
use crate::wire::{
    ComposeVAppParams, Created, EdgeGatewayBody, EdgeGatewayServiceConfiguration,
    GatewayDhcpService, GuestCustomizationSection, HardwareItem, InstantiationParams,
    LinkedEntity, MetadataValue, NetworkConfigSection, OrgVdcNetworkBody, ProductSectionList,
    QueryRecord, QueryResultRecords, SourcedItem, TaskBody, UndeployParams, VAppBody,
    VAppNetworkConfig, VAppNetworkConfiguration, VmBody,
};
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Url};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};
use vcdflow_cloud::model::{
    ComposeVAppRequest, DhcpPool, EdgeGateway, FirewallRule, FirewallService,
    NetworkConnectionSection, OrgVdcNetwork, OrgVdcNetworkSpec, OvfProperties, Reference, VApp,
    VAppStatus, VAppTemplate, Vm,
};
use vcdflow_cloud::{CloudError, DhcpPoolRequest, ProviderConfig, Task, TaskWaiter, VcdApi};

/// Interval between task status polls
pub const TASK_POLL_INTERVAL: Duration = Duration::from_secs(2);

const MB: &str = "byte * 2^20";

/// `href` with extra path segments appended (percent-encoded)
pub fn child_url(href: &str, segments: &[&str]) -> Result<String> {
    let invalid = |reason: String| ClientError::InvalidUrl {
        url: href.to_string(),
        reason,
    };
    let mut url = Url::parse(href).map_err(|e| invalid(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|_| invalid("cannot be a base".to_string()))?
        .pop_if_empty()
        .extend(segments);
    Ok(url.to_string())
}

/// Admin-API href of an entity, e.g. `/api/vdc/1` → `/api/admin/vdc/1`
pub fn admin_href(href: &str, kind: &str) -> String {
    href.replacen(
        &format!("/api/{}/", kind),
        &format!("/api/admin/{}/", kind),
        1,
    )
}

pub struct HttpVcdApi {
    session: VcdSession,
    poll_interval: Duration,
}

impl HttpVcdApi {
    pub fn new(session: VcdSession) -> Self {
        Self {
            session,
            poll_interval: TASK_POLL_INTERVAL,
        }
    }

    pub async fn connect(config: &ProviderConfig) -> Result<Self> {
        Ok(Self::new(VcdSession::connect(config).await?))
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn vdc_filter(&self, name: &str) -> String {
        format!("name=={};vdc=={}", name, self.session.vdc().href)
    }

    async fn query(&self, kind: &str, filter: String) -> Result<Option<QueryRecord>> {
        let url = format!("{}/query", self.session.base_url());
        let response = self
            .session
            .request(Method::GET, &url)
            .query(&[("type", kind), ("format", "records"), ("filter", filter.as_str())])
            .send()
            .await?;
        let records: QueryResultRecords = check(response).await?.json().await?;
        Ok(records.record.into_iter().next())
    }

    /// Send a mutation that answers with a task
    async fn submit(&self, request: RequestBuilder) -> Result<Task> {
        let response = check(request.send().await?).await?;
        let task: TaskBody = response.json().await?;
        debug!(operation = %task.operation_name, href = %task.href, "Task submitted");
        Ok(task.to_task())
    }

    /// Send a creation request that answers with the entity and its tasks
    async fn submit_creation(&self, request: RequestBuilder) -> Result<Task> {
        let response = check(request.send().await?).await?;
        let created: Created = response.json().await?;
        created.first_task().ok_or_else(|| {
            ClientError::UnexpectedResponse(format!("{} was created without a task", created.name))
        })
    }

    async fn vapp_body(&self, vapp: &VApp) -> Result<VAppBody> {
        self.session.get(&vapp.href).await
    }

    /// The first VM of the vApp
    async fn primary_vm(&self, vapp: &VApp) -> Result<VmBody> {
        self.vapp_body(vapp)
            .await?
            .children
            .vm
            .into_iter()
            .next()
            .ok_or_else(|| ClientError::NotFound {
                kind: "VM",
                name: vapp.name.clone(),
            })
    }

    async fn put_vm_section<B: Serialize>(
        &self,
        vapp: &VApp,
        section: &[&str],
        media_type: &str,
        body: &B,
    ) -> Result<Task> {
        let vm = self.primary_vm(vapp).await?;
        let url = child_url(&vm.href, section)?;
        self.submit(self.session.request_json(Method::PUT, &url, media_type, body))
            .await
    }

    async fn configure_services(
        &self,
        gateway: &EdgeGateway,
        configuration: &EdgeGatewayServiceConfiguration,
    ) -> Result<Task> {
        let url = child_url(&gateway.href, &["action", "configureServices"])?;
        self.submit(self.session.request_json(
            Method::POST,
            &url,
            "admin.edgeGatewayServiceConfiguration",
            configuration,
        ))
        .await
    }
}

#[async_trait]
impl TaskWaiter for HttpVcdApi {
    async fn wait_task(&self, task: &Task) -> vcdflow_cloud::Result<()> {
        loop {
            let body: TaskBody = self.session.get(&task.href).await?;
            if body.status.is_finished() {
                if body.status.is_success() {
                    debug!(operation = %body.operation_name, "Task finished");
                    return Ok(());
                }
                let fault = body.failure();
                warn!(operation = %task.operation, error = %fault, "Task failed");
                return Err(CloudError::TaskFailed(fault));
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

#[async_trait]
impl VcdApi for HttpVcdApi {
    fn org(&self) -> &Reference {
        self.session.org()
    }

    fn vdc(&self) -> &Reference {
        self.session.vdc()
    }

    async fn refresh_vdc(&self) -> vcdflow_cloud::Result<()> {
        let _: LinkedEntity = self.session.get(&self.session.vdc().href).await?;
        Ok(())
    }

    async fn find_vapp_template(
        &self,
        catalog: &str,
        item: &str,
    ) -> vcdflow_cloud::Result<Option<VAppTemplate>> {
        let filter = format!("catalogName=={};name=={}", catalog, item);
        Ok(self
            .query("vAppTemplate", filter)
            .await?
            .map(|r| VAppTemplate {
                name: r.name,
                href: r.href,
            }))
    }

    async fn find_network(&self, name: &str) -> vcdflow_cloud::Result<Option<OrgVdcNetwork>> {
        Ok(self
            .query("orgVdcNetwork", self.vdc_filter(name))
            .await?
            .map(|r| OrgVdcNetwork {
                name: r.name,
                href: r.href,
            }))
    }

    async fn find_storage_profile(&self, name: &str) -> vcdflow_cloud::Result<Option<Reference>> {
        Ok(self
            .query("orgVdcStorageProfile", self.vdc_filter(name))
            .await?
            .map(|r| Reference::new(r.name, r.href)))
    }

    async fn find_vapp(&self, name: &str) -> vcdflow_cloud::Result<Option<VApp>> {
        let Some(record) = self.query("vApp", self.vdc_filter(name)).await? else {
            return Ok(None);
        };
        let body: VAppBody = self.session.get(&record.href).await?;
        Ok(Some(body.to_vapp()))
    }

    async fn find_vm(&self, vapp: &VApp, name: &str) -> vcdflow_cloud::Result<Option<Vm>> {
        let body = self.vapp_body(vapp).await?;
        let Some(vm) = body.children.vm.into_iter().find(|vm| vm.name == name) else {
            return Ok(None);
        };
        let url = child_url(&vm.href, &["networkConnectionSection", ""])?;
        let section: NetworkConnectionSection = self.session.get(&url).await?;
        Ok(Some(Vm {
            name: vm.name,
            href: vm.href,
            network_connection_section: section,
        }))
    }

    async fn vapp_status(&self, vapp: &VApp) -> vcdflow_cloud::Result<VAppStatus> {
        Ok(self.vapp_body(vapp).await?.to_vapp().status)
    }

    async fn find_edge_gateway(&self, name: &str) -> vcdflow_cloud::Result<Option<EdgeGateway>> {
        let Some(record) = self.query("edgeGateway", self.vdc_filter(name)).await? else {
            return Ok(None);
        };
        let body: EdgeGatewayBody = self.session.get(&record.href).await?;
        let services = body.configuration.edge_gateway_service_configuration;
        Ok(Some(EdgeGateway {
            name: body.name,
            href: body.href,
            firewall_service: services.firewall_service.unwrap_or_default(),
            dhcp_pools: services
                .gateway_dhcp_service
                .map(|s| s.pool)
                .unwrap_or_default(),
        }))
    }

    async fn compose_vapp(&self, request: &ComposeVAppRequest) -> vcdflow_cloud::Result<Task> {
        let params = ComposeVAppParams {
            name: request.name.clone(),
            description: request.description.clone(),
            deploy: false,
            power_on: false,
            instantiation_params: InstantiationParams {
                network_config_section: NetworkConfigSection {
                    network_config: request
                        .networks
                        .iter()
                        .map(|n| VAppNetworkConfig {
                            network_name: n.name.clone(),
                            configuration: VAppNetworkConfiguration {
                                parent_network: Reference::new(&n.name, &n.href),
                                fence_mode: "bridged".to_string(),
                            },
                        })
                        .collect(),
                },
            },
            sourced_item: vec![SourcedItem {
                source: Reference::new(&request.template.name, &request.template.href),
                storage_profile: request.storage_profile.clone(),
            }],
        };
        let url = child_url(&self.session.vdc().href, &["action", "composeVApp"])?;
        Ok(self
            .submit_creation(self.session.request_json(
                Method::POST,
                &url,
                "vcloud.composeVAppParams",
                &params,
            ))
            .await?)
    }

    async fn compose_raw_vapp(&self, name: &str) -> vcdflow_cloud::Result<()> {
        let params = ComposeVAppParams {
            name: name.to_string(),
            description: None,
            deploy: false,
            power_on: false,
            instantiation_params: InstantiationParams::default(),
            sourced_item: Vec::new(),
        };
        let url = child_url(&self.session.vdc().href, &["action", "composeVApp"])?;
        let response = self
            .session
            .request_json(Method::POST, &url, "vcloud.composeVAppParams", &params)
            .send()
            .await
            .map_err(ClientError::from)?;
        check(response).await?;
        Ok(())
    }

    async fn rename_vm(&self, vapp: &VApp, name: &str) -> vcdflow_cloud::Result<Task> {
        let vm = self.primary_vm(vapp).await?;
        let url = child_url(&vm.href, &["action", "reconfigureVm"])?;
        let body = serde_json::json!({ "name": name });
        Ok(self
            .submit(self.session.request_json(Method::POST, &url, "vcloud.vm", &body))
            .await?)
    }

    async fn change_network_config(
        &self,
        vapp: &VApp,
        section: &NetworkConnectionSection,
    ) -> vcdflow_cloud::Result<Task> {
        Ok(self
            .put_vm_section(
                vapp,
                &["networkConnectionSection", ""],
                "vcloud.networkConnectionSection",
                section,
            )
            .await?)
    }

    async fn set_ovf(&self, vapp: &VApp, properties: &OvfProperties) -> vcdflow_cloud::Result<Task> {
        let url = child_url(&vapp.href, &["productSections", ""])?;
        let body = ProductSectionList::from_properties(properties);
        Ok(self
            .submit(self.session.request_json(
                Method::PUT,
                &url,
                "vcloud.productSections",
                &body,
            ))
            .await?)
    }

    async fn power_on(&self, vapp: &VApp) -> vcdflow_cloud::Result<Task> {
        let url = child_url(&vapp.href, &["power", "action", "powerOn"])?;
        Ok(self.submit(self.session.request(Method::POST, &url)).await?)
    }

    async fn power_off(&self, vapp: &VApp) -> vcdflow_cloud::Result<Task> {
        let url = child_url(&vapp.href, &["power", "action", "powerOff"])?;
        Ok(self.submit(self.session.request(Method::POST, &url)).await?)
    }

    async fn undeploy(&self, vapp: &VApp) -> vcdflow_cloud::Result<Task> {
        let url = child_url(&vapp.href, &["action", "undeploy"])?;
        let body = UndeployParams {
            undeploy_power_action: "powerOff",
        };
        Ok(self
            .submit(self.session.request_json(
                Method::POST,
                &url,
                "vcloud.undeployVAppParams",
                &body,
            ))
            .await?)
    }

    async fn delete_vapp(&self, vapp: &VApp) -> vcdflow_cloud::Result<Task> {
        Ok(self
            .submit(self.session.request(Method::DELETE, &vapp.href))
            .await?)
    }

    async fn run_customization_script(
        &self,
        vapp: &VApp,
        computer_name: &str,
        script: &str,
    ) -> vcdflow_cloud::Result<Task> {
        let body = GuestCustomizationSection {
            enabled: true,
            change_sid: false,
            computer_name: computer_name.to_string(),
            customization_script: script.to_string(),
        };
        Ok(self
            .put_vm_section(
                vapp,
                &["guestCustomizationSection", ""],
                "vcloud.guestCustomizationSection",
                &body,
            )
            .await?)
    }

    async fn add_metadata(&self, vapp: &VApp, key: &str, value: &str) -> vcdflow_cloud::Result<Task> {
        let url = child_url(&vapp.href, &["metadata", key])?;
        Ok(self
            .submit(self.session.request_json(
                Method::PUT,
                &url,
                "vcloud.metadata.value",
                &MetadataValue::string(value),
            ))
            .await?)
    }

    async fn delete_metadata(&self, vapp: &VApp, key: &str) -> vcdflow_cloud::Result<Task> {
        let url = child_url(&vapp.href, &["metadata", key])?;
        Ok(self.submit(self.session.request(Method::DELETE, &url)).await?)
    }

    async fn change_storage_profile(&self, vapp: &VApp, profile: &str) -> vcdflow_cloud::Result<Task> {
        let profile = self
            .find_storage_profile(profile)
            .await?
            .ok_or_else(|| CloudError::not_found("storage profile", profile))?;
        let vm = self.primary_vm(vapp).await?;
        let url = child_url(&vm.href, &["action", "reconfigureVm"])?;
        let body = serde_json::json!({
            "name": vm.name,
            "storageProfile": { "name": profile.name, "href": profile.href },
        });
        Ok(self
            .submit(self.session.request_json(Method::POST, &url, "vcloud.vm", &body))
            .await?)
    }

    async fn change_memory_size(&self, vapp: &VApp, memory_mb: u32) -> vcdflow_cloud::Result<Task> {
        let body = HardwareItem {
            allocation_units: MB,
            virtual_quantity: memory_mb,
        };
        Ok(self
            .put_vm_section(
                vapp,
                &["virtualHardwareSection", "memory"],
                "vcloud.rasdItem",
                &body,
            )
            .await?)
    }

    async fn change_cpu_count(&self, vapp: &VApp, cpus: u32) -> vcdflow_cloud::Result<Task> {
        let body = HardwareItem {
            allocation_units: "hertz * 10^6",
            virtual_quantity: cpus,
        };
        Ok(self
            .put_vm_section(
                vapp,
                &["virtualHardwareSection", "cpu"],
                "vcloud.rasdItem",
                &body,
            )
            .await?)
    }

    async fn create_network(&self, spec: &OrgVdcNetworkSpec) -> vcdflow_cloud::Result<Task> {
        let url = child_url(&admin_href(&self.session.vdc().href, "vdc"), &["networks"])?;
        Ok(self
            .submit_creation(self.session.request_json(
                Method::POST,
                &url,
                "vcloud.orgVdcNetwork",
                &OrgVdcNetworkBody::from(spec),
            ))
            .await?)
    }

    async fn delete_network(&self, network: &OrgVdcNetwork) -> vcdflow_cloud::Result<Task> {
        let url = admin_href(&network.href, "network");
        Ok(self.submit(self.session.request(Method::DELETE, &url)).await?)
    }

    async fn add_dhcp_pool(
        &self,
        gateway: &EdgeGateway,
        network: &OrgVdcNetwork,
        pools: &[DhcpPoolRequest],
    ) -> vcdflow_cloud::Result<Task> {
        let mut pool = gateway.dhcp_pools.clone();
        pool.extend(pools.iter().map(|p| DhcpPool {
            network: Reference::new(&network.name, &network.href),
            is_enabled: true,
            default_lease_time: p.default_lease_time,
            max_lease_time: p.max_lease_time,
            low_ip_address: p.range.start_address.clone(),
            high_ip_address: p.range.end_address.clone(),
        }));
        let configuration = EdgeGatewayServiceConfiguration {
            firewall_service: None,
            gateway_dhcp_service: Some(GatewayDhcpService {
                is_enabled: true,
                pool,
            }),
        };
        Ok(self.configure_services(gateway, &configuration).await?)
    }

    async fn update_firewall_rules(
        &self,
        gateway: &EdgeGateway,
        default_action: &str,
        rules: &[FirewallRule],
    ) -> vcdflow_cloud::Result<Task> {
        let configuration = EdgeGatewayServiceConfiguration {
            firewall_service: Some(FirewallService {
                is_enabled: true,
                default_action: default_action.to_string(),
                log_default_action: gateway.firewall_service.log_default_action,
                firewall_rule: rules.to_vec(),
            }),
            gateway_dhcp_service: None,
        };
        Ok(self.configure_services(gateway, &configuration).await?)
    }
}
