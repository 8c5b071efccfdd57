//! JSON representations of the vCloud REST API
//!
//! Only the fields vcdflow reads or writes are modelled; everything else in
//! a response body is ignored.

use serde::{Deserialize, Serialize};
use vcdflow_cloud::model::{
    DhcpPool, FirewallService, IpRange, OrgVdcNetworkSpec, Reference, VApp, VAppStatus,
};
use vcdflow_cloud::{ApiFault, Task, TaskStatus};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Link {
    pub rel: String,
    pub href: String,
    #[serde(default, rename = "type")]
    pub media_type: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// `{majorErrorCode, minorErrorCode, message}` error body
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub major_error_code: u16,
    #[serde(default)]
    pub minor_error_code: String,
    #[serde(default)]
    pub message: String,
}

impl ErrorBody {
    pub fn into_fault(self) -> ApiFault {
        ApiFault::new(self.major_error_code, self.minor_error_code, self.message)
    }
}

/// Fault for a non-success response. Bodies that are not an error document
/// keep the HTTP status with its reason phrase as minor code.
pub fn fault_from_body(status: reqwest::StatusCode, body: &str) -> ApiFault {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(error) => error.into_fault(),
        Err(_) => ApiFault::new(
            status.as_u16(),
            status
                .canonical_reason()
                .unwrap_or("UNKNOWN")
                .to_ascii_uppercase()
                .replace(' ', "_"),
            body.trim(),
        ),
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskBody {
    pub href: String,
    #[serde(default)]
    pub operation_name: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub error: Option<ErrorBody>,
}

impl TaskBody {
    pub fn to_task(&self) -> Task {
        Task {
            href: self.href.clone(),
            operation: self.operation_name.clone(),
            status: self.status,
        }
    }

    /// Fault of a task that finished without success
    pub fn failure(self) -> ApiFault {
        match self.error {
            Some(error) => error.into_fault(),
            None => ApiFault::new(
                500,
                format!("TASK_{}", self.status.to_string().to_ascii_uppercase()),
                format!("task {} finished as {}", self.operation_name, self.status),
            ),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Tasks {
    #[serde(default)]
    pub task: Vec<TaskBody>,
}

/// Any entity whose creation answers with the entity plus its tasks
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Created {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub tasks: Tasks,
}

impl Created {
    pub fn first_task(&self) -> Option<Task> {
        self.tasks.task.first().map(TaskBody::to_task)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrgList {
    #[serde(default)]
    pub org: Vec<Reference>,
}

/// Organization or VDC: only the links are needed
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkedEntity {
    pub name: String,
    pub href: String,
    #[serde(default)]
    pub link: Vec<Link>,
}

impl LinkedEntity {
    /// Child references of one media type, e.g. `vdc+json`
    pub fn children(&self, media_suffix: &str) -> Vec<Reference> {
        self.link
            .iter()
            .filter(|l| l.rel == "down")
            .filter(|l| {
                l.media_type
                    .as_deref()
                    .is_some_and(|t| t.ends_with(media_suffix))
            })
            .map(|l| Reference::new(l.name.clone().unwrap_or_default(), &l.href))
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueryRecord {
    pub name: String,
    pub href: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryResultRecords {
    #[serde(default)]
    pub record: Vec<QueryRecord>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VmBody {
    pub name: String,
    pub href: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VAppChildren {
    #[serde(default)]
    pub vm: Vec<VmBody>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VAppBody {
    pub name: String,
    pub href: String,
    /// Numeric vCloud status code
    pub status: i32,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub children: VAppChildren,
}

impl VAppBody {
    pub fn to_vapp(&self) -> VApp {
        VApp {
            name: self.name.clone(),
            href: self.href.clone(),
            status: VAppStatus::from_code(self.status),
            description: self.description.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayDhcpService {
    #[serde(default)]
    pub is_enabled: bool,
    #[serde(default)]
    pub pool: Vec<DhcpPool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeGatewayServiceConfiguration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub firewall_service: Option<FirewallService>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway_dhcp_service: Option<GatewayDhcpService>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfiguration {
    #[serde(default)]
    pub edge_gateway_service_configuration: EdgeGatewayServiceConfiguration,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeGatewayBody {
    pub name: String,
    pub href: String,
    #[serde(default)]
    pub configuration: GatewayConfiguration,
}

// ----- request bodies -----

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComposeVAppParams {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub deploy: bool,
    pub power_on: bool,
    pub instantiation_params: InstantiationParams,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sourced_item: Vec<SourcedItem>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstantiationParams {
    pub network_config_section: NetworkConfigSection,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfigSection {
    pub network_config: Vec<VAppNetworkConfig>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VAppNetworkConfig {
    pub network_name: String,
    pub configuration: VAppNetworkConfiguration,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VAppNetworkConfiguration {
    pub parent_network: Reference,
    pub fence_mode: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourcedItem {
    pub source: Reference,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_profile: Option<Reference>,
}

/// Org VDC network creation body
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrgVdcNetworkBody {
    pub name: String,
    pub configuration: OrgVdcNetworkConfiguration,
    pub edge_gateway: Reference,
    pub is_shared: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrgVdcNetworkConfiguration {
    pub ip_scopes: IpScopes,
    pub fence_mode: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IpScopes {
    pub ip_scope: Vec<IpScope>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IpScope {
    pub is_inherited: bool,
    pub gateway: String,
    pub netmask: String,
    pub dns1: String,
    pub dns2: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dns_suffix: Option<String>,
    pub ip_ranges: IpRanges,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IpRanges {
    pub ip_range: Vec<IpRange>,
}

impl From<&OrgVdcNetworkSpec> for OrgVdcNetworkBody {
    fn from(spec: &OrgVdcNetworkSpec) -> Self {
        Self {
            name: spec.name.clone(),
            configuration: OrgVdcNetworkConfiguration {
                ip_scopes: IpScopes {
                    ip_scope: vec![IpScope {
                        is_inherited: false,
                        gateway: spec.gateway.clone(),
                        netmask: spec.netmask.clone(),
                        dns1: spec.dns1.clone(),
                        dns2: spec.dns2.clone(),
                        dns_suffix: spec.dns_suffix.clone(),
                        ip_ranges: IpRanges {
                            ip_range: spec.ip_ranges.clone(),
                        },
                    }],
                },
                fence_mode: spec.fence_mode.clone(),
            },
            edge_gateway: spec.edge_gateway.clone(),
            is_shared: spec.is_shared,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSectionList {
    pub product_section: Vec<ProductSection>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductSection {
    pub property: Vec<ProductProperty>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductProperty {
    pub key: String,
    pub user_configurable: bool,
    #[serde(rename = "type")]
    pub kind: String,
    pub value: PropertyValue,
}

#[derive(Debug, Clone, Serialize)]
pub struct PropertyValue {
    pub value: String,
}

impl ProductSectionList {
    pub fn from_properties<'a>(properties: impl IntoIterator<Item = (&'a String, &'a String)>) -> Self {
        Self {
            product_section: vec![ProductSection {
                property: properties
                    .into_iter()
                    .map(|(key, value)| ProductProperty {
                        key: key.clone(),
                        user_configurable: true,
                        kind: "string".to_string(),
                        value: PropertyValue {
                            value: value.clone(),
                        },
                    })
                    .collect(),
            }],
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestCustomizationSection {
    pub enabled: bool,
    pub change_sid: bool,
    pub computer_name: String,
    pub customization_script: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataValue {
    pub typed_value: TypedValue,
}

#[derive(Debug, Clone, Serialize)]
pub struct TypedValue {
    #[serde(rename = "_type")]
    pub kind: &'static str,
    pub value: String,
}

impl MetadataValue {
    pub fn string(value: &str) -> Self {
        Self {
            typed_value: TypedValue {
                kind: "MetadataStringValue",
                value: value.to_string(),
            },
        }
    }
}

/// `virtualHardwareSection` item (memory in MB or CPU count)
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HardwareItem {
    pub allocation_units: &'static str,
    pub virtual_quantity: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UndeployParams {
    pub undeploy_power_action: &'static str,
}
