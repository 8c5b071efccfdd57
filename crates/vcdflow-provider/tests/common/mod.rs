//! In-memory vCloud Director used by the reconciler tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use vcdflow_cloud::model::{
    ComposeVAppRequest, DhcpPool, EdgeGateway, FirewallRule, FirewallService,
    NetworkConnectionSection, OrgVdcNetwork, OrgVdcNetworkSpec, OvfProperties, Reference, VApp,
    VAppStatus, VAppTemplate, Vm,
};
use vcdflow_cloud::{
    ApiFault, CloudError, DhcpPoolRequest, Result, RetryConfig, RetryExecutor, Task, TaskWaiter,
    VcdApi,
};

pub const BASE: &str = "https://vcd.test/api";

/// Short fixed-interval budget; tests run with paused time
pub fn executor() -> RetryExecutor {
    RetryExecutor::new(RetryConfig::constant(
        Duration::from_millis(100),
        Duration::from_secs(2),
    ))
}

#[derive(Debug, Clone)]
pub struct MockVApp {
    pub vapp: VApp,
    /// `None` for a vApp composed without a template
    pub vm: Option<Vm>,
    pub metadata: BTreeMap<String, String>,
    pub ovf: OvfProperties,
    pub memory: Option<u32>,
    pub cpus: Option<u32>,
    pub storage_profile: Option<String>,
    pub script: Option<String>,
    pub undeployed: bool,
}

#[derive(Default)]
struct Inner {
    calls: Vec<String>,
    templates: HashMap<(String, String), VAppTemplate>,
    networks: BTreeMap<String, OrgVdcNetwork>,
    network_specs: BTreeMap<String, OrgVdcNetworkSpec>,
    storage_profiles: BTreeMap<String, Reference>,
    vapps: BTreeMap<String, MockVApp>,
    gateways: BTreeMap<String, EdgeGateway>,
    submit_faults: HashMap<String, VecDeque<ApiFault>>,
    task_faults: HashMap<String, VecDeque<ApiFault>>,
    failed_tasks: HashMap<String, ApiFault>,
    next_task: u32,
    next_rule_id: u32,
    no_ip_assignment: bool,
    ip_delay: u32,
    vm_reads: u32,
}

impl Inner {
    fn vapp_mut(&mut self, name: &str) -> &mut MockVApp {
        self.vapps
            .get_mut(name)
            .unwrap_or_else(|| panic!("vApp {name} does not exist"))
    }

    fn assign_addresses(&self, section: &mut NetworkConnectionSection) {
        for connection in &mut section.network_connection {
            match connection.ip_address_allocation_mode.as_str() {
                "DHCP" | "POOL" if !self.no_ip_assignment => {
                    connection.ip_address = Some(format!(
                        "192.168.{}.10",
                        connection.network_connection_index
                    ));
                }
                "MANUAL" => {}
                _ => connection.ip_address = None,
            }
        }
    }
}

pub struct MockVcd {
    org: Reference,
    vdc: Reference,
    inner: Mutex<Inner>,
}

impl MockVcd {
    pub fn new() -> Self {
        Self {
            org: Reference::new("acme", format!("{BASE}/org/1")),
            vdc: Reference::new("acme-vdc", format!("{BASE}/vdc/1")),
            inner: Mutex::new(Inner {
                next_rule_id: 1,
                ..Default::default()
            }),
        }
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap()
    }

    fn record(&self, call: impl Into<String>) {
        self.lock().calls.push(call.into());
    }

    // ----- fixtures -----

    pub fn with_template(self, catalog: &str, item: &str) -> Self {
        self.lock().templates.insert(
            (catalog.to_string(), item.to_string()),
            VAppTemplate {
                name: item.to_string(),
                href: format!("{BASE}/vAppTemplate/{item}"),
            },
        );
        self
    }

    pub fn with_network(self, name: &str) -> Self {
        self.lock().networks.insert(
            name.to_string(),
            OrgVdcNetwork {
                name: name.to_string(),
                href: format!("{BASE}/network/{name}"),
            },
        );
        self
    }

    pub fn with_storage_profile(self, name: &str) -> Self {
        self.lock().storage_profiles.insert(
            name.to_string(),
            Reference::new(name, format!("{BASE}/vdcStorageProfile/{name}")),
        );
        self
    }

    pub fn with_edge_gateway(self, name: &str) -> Self {
        self.lock().gateways.insert(
            name.to_string(),
            EdgeGateway {
                name: name.to_string(),
                href: format!("{BASE}/admin/edgeGateway/{name}"),
                firewall_service: FirewallService {
                    is_enabled: true,
                    default_action: "drop".to_string(),
                    log_default_action: false,
                    firewall_rule: Vec::new(),
                },
                dhcp_pools: Vec::new(),
            },
        );
        self
    }

    /// Rule already present on the gateway; gets the next rule id
    pub fn with_firewall_rule(self, gateway: &str, rule: FirewallRule) -> Self {
        {
            let mut inner = self.lock();
            let id = inner.next_rule_id.to_string();
            inner.next_rule_id += 1;
            let gw = inner.gateways.get_mut(gateway).unwrap();
            gw.firewall_service.firewall_rule.push(FirewallRule { id, ..rule });
        }
        self
    }

    /// DHCP/POOL interfaces never get an address
    pub fn without_ip_assignment(self) -> Self {
        self.lock().no_ip_assignment = true;
        self
    }

    /// The first `reads` VM lookups report no addresses
    pub fn with_ip_delay(self, reads: u32) -> Self {
        self.lock().ip_delay = reads;
        self
    }

    /// Composes the vApp directly, as if an earlier run got that far
    pub fn with_existing_vapp(self, name: &str, vm_name: &str) -> Self {
        self.lock().vapps.insert(name.to_string(), new_vapp(name, Some(vm_name)));
        self
    }

    // ----- fault injection -----

    /// The next submission of `operation` fails with `fault`
    pub fn fail_submit(&self, operation: &str, fault: ApiFault) {
        self.lock()
            .submit_faults
            .entry(operation.to_string())
            .or_default()
            .push_back(fault);
    }

    /// The next task of `operation` is accepted but finishes with `fault`
    pub fn fail_task(&self, operation: &str, fault: ApiFault) {
        self.lock()
            .task_faults
            .entry(operation.to_string())
            .or_default()
            .push_back(fault);
    }

    // ----- out-of-band changes -----

    pub fn remove_vapp(&self, name: &str) {
        self.lock().vapps.remove(name);
    }

    pub fn remove_network(&self, name: &str) {
        self.lock().networks.remove(name);
    }

    pub fn remove_firewall_rule(&self, gateway: &str, id: &str) {
        let mut inner = self.lock();
        if let Some(gw) = inner.gateways.get_mut(gateway) {
            gw.firewall_service.firewall_rule.retain(|r| r.id != id);
        }
    }

    // ----- inspection -----

    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    /// Calls that change remote state, in order
    pub fn mutations(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| {
                !(c.starts_with("find_")
                    || c.starts_with("refresh_vdc")
                    || c.starts_with("vapp_status")
                    || c.starts_with("wait_task"))
            })
            .collect()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == call).count()
    }

    pub fn position(&self, call: &str) -> Option<usize> {
        self.calls().iter().position(|c| c == call)
    }

    pub fn vapp(&self, name: &str) -> Option<MockVApp> {
        self.lock().vapps.get(name).cloned()
    }

    pub fn gateway(&self, name: &str) -> Option<EdgeGateway> {
        self.lock().gateways.get(name).cloned()
    }

    pub fn network_spec(&self, name: &str) -> Option<OrgVdcNetworkSpec> {
        self.lock().network_specs.get(name).cloned()
    }

    pub fn has_network(&self, name: &str) -> bool {
        self.lock().networks.contains_key(name)
    }

    /// Record a mutation and hand back its task. The effect only applies
    /// when the task is going to succeed.
    fn submit(&self, operation: &str, call: String, effect: impl FnOnce(&mut Inner)) -> Result<Task> {
        let mut inner = self.lock();
        inner.calls.push(call);

        if let Some(fault) = inner
            .submit_faults
            .get_mut(operation)
            .and_then(VecDeque::pop_front)
        {
            return Err(CloudError::Api(fault));
        }

        inner.next_task += 1;
        let href = format!("{BASE}/task/{}", inner.next_task);
        match inner
            .task_faults
            .get_mut(operation)
            .and_then(VecDeque::pop_front)
        {
            Some(fault) => {
                inner.failed_tasks.insert(href.clone(), fault);
            }
            None => effect(&mut *inner),
        }
        Ok(Task::new(href, operation))
    }
}

fn new_vapp(name: &str, vm_name: Option<&str>) -> MockVApp {
    MockVApp {
        vapp: VApp {
            name: name.to_string(),
            href: format!("{BASE}/vApp/vapp-{name}"),
            status: if vm_name.is_some() {
                VAppStatus::PoweredOff
            } else {
                VAppStatus::Resolved
            },
            description: None,
        },
        vm: vm_name.map(|vm| Vm {
            name: vm.to_string(),
            href: format!("{BASE}/vApp/vm-{name}"),
            network_connection_section: NetworkConnectionSection::default(),
        }),
        metadata: BTreeMap::new(),
        ovf: OvfProperties::new(),
        memory: None,
        cpus: None,
        storage_profile: None,
        script: None,
        undeployed: false,
    }
}

#[async_trait]
impl TaskWaiter for MockVcd {
    async fn wait_task(&self, task: &Task) -> Result<()> {
        let mut inner = self.lock();
        inner.calls.push(format!("wait_task:{}", task.operation));
        match inner.failed_tasks.remove(&task.href) {
            Some(fault) => Err(CloudError::TaskFailed(fault)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl VcdApi for MockVcd {
    fn org(&self) -> &Reference {
        &self.org
    }

    fn vdc(&self) -> &Reference {
        &self.vdc
    }

    async fn refresh_vdc(&self) -> Result<()> {
        self.record("refresh_vdc");
        Ok(())
    }

    async fn find_vapp_template(&self, catalog: &str, item: &str) -> Result<Option<VAppTemplate>> {
        let mut inner = self.lock();
        inner.calls.push("find_vapp_template".to_string());
        Ok(inner
            .templates
            .get(&(catalog.to_string(), item.to_string()))
            .cloned())
    }

    async fn find_network(&self, name: &str) -> Result<Option<OrgVdcNetwork>> {
        let mut inner = self.lock();
        inner.calls.push(format!("find_network:{name}"));
        Ok(inner.networks.get(name).cloned())
    }

    async fn find_storage_profile(&self, name: &str) -> Result<Option<Reference>> {
        let mut inner = self.lock();
        inner.calls.push(format!("find_storage_profile:{name}"));
        Ok(inner.storage_profiles.get(name).cloned())
    }

    async fn find_vapp(&self, name: &str) -> Result<Option<VApp>> {
        let mut inner = self.lock();
        inner.calls.push(format!("find_vapp:{name}"));
        Ok(inner.vapps.get(name).map(|v| v.vapp.clone()))
    }

    async fn find_vm(&self, vapp: &VApp, name: &str) -> Result<Option<Vm>> {
        let mut inner = self.lock();
        inner.calls.push(format!("find_vm:{name}"));
        inner.vm_reads += 1;
        let hide_addresses = inner.vm_reads <= inner.ip_delay;

        let vm = inner
            .vapps
            .get(&vapp.name)
            .and_then(|v| v.vm.clone())
            .filter(|vm| vm.name == name);
        Ok(vm.map(|mut vm| {
            if hide_addresses {
                for connection in &mut vm.network_connection_section.network_connection {
                    if connection.ip_address_allocation_mode != "MANUAL" {
                        connection.ip_address = None;
                    }
                }
            }
            vm
        }))
    }

    async fn vapp_status(&self, vapp: &VApp) -> Result<VAppStatus> {
        let mut inner = self.lock();
        inner.calls.push("vapp_status".to_string());
        inner
            .vapps
            .get(&vapp.name)
            .map(|v| v.vapp.status)
            .ok_or_else(|| CloudError::not_found("vApp", &vapp.name))
    }

    async fn find_edge_gateway(&self, name: &str) -> Result<Option<EdgeGateway>> {
        let mut inner = self.lock();
        inner.calls.push(format!("find_edge_gateway:{name}"));
        Ok(inner.gateways.get(name).cloned())
    }

    async fn compose_vapp(&self, request: &ComposeVAppRequest) -> Result<Task> {
        let request = request.clone();
        self.submit("compose_vapp", "compose_vapp".to_string(), move |inner| {
            let mut vapp = new_vapp(&request.name, Some(&request.template.name));
            vapp.vapp.description = request.description.clone();
            vapp.storage_profile = request.storage_profile.map(|p| p.name);
            inner.vapps.insert(request.name.clone(), vapp);
        })
    }

    async fn compose_raw_vapp(&self, name: &str) -> Result<()> {
        let name = name.to_string();
        let task = self.submit("compose_raw_vapp", "compose_raw_vapp".to_string(), move |inner| {
            inner.vapps.insert(name.clone(), new_vapp(&name, None));
        })?;
        // raw composition answers synchronously
        match self.lock().failed_tasks.remove(&task.href) {
            Some(fault) => Err(CloudError::Api(fault)),
            None => Ok(()),
        }
    }

    async fn rename_vm(&self, vapp: &VApp, name: &str) -> Result<Task> {
        let (vapp_name, name) = (vapp.name.clone(), name.to_string());
        self.submit("rename_vm", "rename_vm".to_string(), move |inner| {
            if let Some(vm) = inner.vapp_mut(&vapp_name).vm.as_mut() {
                vm.name = name;
            }
        })
    }

    async fn change_network_config(
        &self,
        vapp: &VApp,
        section: &NetworkConnectionSection,
    ) -> Result<Task> {
        let (vapp_name, mut section) = (vapp.name.clone(), section.clone());
        self.submit(
            "change_network_config",
            "change_network_config".to_string(),
            move |inner| {
                inner.assign_addresses(&mut section);
                if let Some(vm) = inner.vapp_mut(&vapp_name).vm.as_mut() {
                    vm.network_connection_section = section;
                }
            },
        )
    }

    async fn set_ovf(&self, vapp: &VApp, properties: &OvfProperties) -> Result<Task> {
        let (vapp_name, properties) = (vapp.name.clone(), properties.clone());
        self.submit("set_ovf", "set_ovf".to_string(), move |inner| {
            inner.vapp_mut(&vapp_name).ovf = properties;
        })
    }

    async fn power_on(&self, vapp: &VApp) -> Result<Task> {
        let vapp_name = vapp.name.clone();
        self.submit("power_on", "power_on".to_string(), move |inner| {
            inner.vapp_mut(&vapp_name).vapp.status = VAppStatus::PoweredOn;
        })
    }

    async fn power_off(&self, vapp: &VApp) -> Result<Task> {
        let vapp_name = vapp.name.clone();
        let empty = self
            .lock()
            .vapps
            .get(&vapp_name)
            .is_some_and(|v| v.vm.is_none());
        if empty {
            self.record("power_off");
            return Err(CloudError::Api(ApiFault::new(
                400,
                "BAD_REQUEST",
                "The requested operation could not be executed since vApp is not running",
            )));
        }
        self.submit("power_off", "power_off".to_string(), move |inner| {
            inner.vapp_mut(&vapp_name).vapp.status = VAppStatus::PoweredOff;
        })
    }

    async fn undeploy(&self, vapp: &VApp) -> Result<Task> {
        let vapp_name = vapp.name.clone();
        self.submit("undeploy", "undeploy".to_string(), move |inner| {
            let v = inner.vapp_mut(&vapp_name);
            v.undeployed = true;
            v.vapp.status = VAppStatus::Resolved;
        })
    }

    async fn delete_vapp(&self, vapp: &VApp) -> Result<Task> {
        let vapp_name = vapp.name.clone();
        self.submit("delete_vapp", "delete_vapp".to_string(), move |inner| {
            inner.vapps.remove(&vapp_name);
        })
    }

    async fn run_customization_script(
        &self,
        vapp: &VApp,
        _computer_name: &str,
        script: &str,
    ) -> Result<Task> {
        let (vapp_name, script) = (vapp.name.clone(), script.to_string());
        self.submit(
            "run_customization_script",
            "run_customization_script".to_string(),
            move |inner| {
                inner.vapp_mut(&vapp_name).script = Some(script);
            },
        )
    }

    async fn add_metadata(&self, vapp: &VApp, key: &str, value: &str) -> Result<Task> {
        let (vapp_name, key, value) = (vapp.name.clone(), key.to_string(), value.to_string());
        self.submit("add_metadata", format!("add_metadata:{key}"), move |inner| {
            inner.vapp_mut(&vapp_name).metadata.insert(key, value);
        })
    }

    async fn delete_metadata(&self, vapp: &VApp, key: &str) -> Result<Task> {
        let (vapp_name, key) = (vapp.name.clone(), key.to_string());
        self.submit("delete_metadata", format!("delete_metadata:{key}"), move |inner| {
            inner.vapp_mut(&vapp_name).metadata.remove(&key);
        })
    }

    async fn change_storage_profile(&self, vapp: &VApp, profile: &str) -> Result<Task> {
        let (vapp_name, profile) = (vapp.name.clone(), profile.to_string());
        self.submit(
            "change_storage_profile",
            "change_storage_profile".to_string(),
            move |inner| {
                inner.vapp_mut(&vapp_name).storage_profile = Some(profile);
            },
        )
    }

    async fn change_memory_size(&self, vapp: &VApp, memory_mb: u32) -> Result<Task> {
        let vapp_name = vapp.name.clone();
        self.submit("change_memory_size", "change_memory_size".to_string(), move |inner| {
            inner.vapp_mut(&vapp_name).memory = Some(memory_mb);
        })
    }

    async fn change_cpu_count(&self, vapp: &VApp, cpus: u32) -> Result<Task> {
        let vapp_name = vapp.name.clone();
        self.submit("change_cpu_count", "change_cpu_count".to_string(), move |inner| {
            inner.vapp_mut(&vapp_name).cpus = Some(cpus);
        })
    }

    async fn create_network(&self, spec: &OrgVdcNetworkSpec) -> Result<Task> {
        let spec = spec.clone();
        self.submit("create_network", format!("create_network:{}", spec.name), move |inner| {
            inner.networks.insert(
                spec.name.clone(),
                OrgVdcNetwork {
                    name: spec.name.clone(),
                    href: format!("{BASE}/network/{}", spec.name),
                },
            );
            inner.network_specs.insert(spec.name.clone(), spec);
        })
    }

    async fn delete_network(&self, network: &OrgVdcNetwork) -> Result<Task> {
        let name = network.name.clone();
        self.submit("delete_network", format!("delete_network:{name}"), move |inner| {
            inner.networks.remove(&name);
            inner.network_specs.remove(&name);
        })
    }

    async fn add_dhcp_pool(
        &self,
        gateway: &EdgeGateway,
        network: &OrgVdcNetwork,
        pools: &[DhcpPoolRequest],
    ) -> Result<Task> {
        let (gateway_name, network, pools) = (gateway.name.clone(), network.clone(), pools.to_vec());
        self.submit("add_dhcp_pool", "add_dhcp_pool".to_string(), move |inner| {
            if let Some(gw) = inner.gateways.get_mut(&gateway_name) {
                for pool in pools {
                    gw.dhcp_pools.push(DhcpPool {
                        network: Reference::new(&network.name, &network.href),
                        is_enabled: true,
                        default_lease_time: pool.default_lease_time,
                        max_lease_time: pool.max_lease_time,
                        low_ip_address: pool.range.start_address,
                        high_ip_address: pool.range.end_address,
                    });
                }
            }
        })
    }

    async fn update_firewall_rules(
        &self,
        gateway: &EdgeGateway,
        default_action: &str,
        rules: &[FirewallRule],
    ) -> Result<Task> {
        let (gateway_name, default_action, rules) =
            (gateway.name.clone(), default_action.to_string(), rules.to_vec());
        self.submit(
            "update_firewall_rules",
            "update_firewall_rules".to_string(),
            move |inner| {
                let mut next = inner.next_rule_id;
                let rules: Vec<FirewallRule> = rules
                    .into_iter()
                    .map(|mut r| {
                        if r.id.is_empty() {
                            r.id = next.to_string();
                            next += 1;
                        }
                        r
                    })
                    .collect();
                inner.next_rule_id = next;
                if let Some(gw) = inner.gateways.get_mut(&gateway_name) {
                    gw.firewall_service.default_action = default_action;
                    gw.firewall_service.firewall_rule = rules;
                }
            },
        )
    }
}
