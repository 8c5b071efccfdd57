//! vCloud Director provider for vcdflow
//!
//! This crate maps declared resources onto the vCloud Director control
//! plane through the [`VcdApi`](vcdflow_cloud::VcdApi) seam.
//!
//! # Resources
//!
//! - `vapp`: virtual application composed from a catalog template (or empty)
//! - `network`: organization VDC network behind an edge gateway
//! - `firewall_rules`: rule set appended to an edge gateway's firewall
//!
//! # Example
//!
//! ```ignore
//! use vcdflow_provider::{ResourceSet, VcdProvider};
//!
//! let provider = VcdProvider::new(api, RetryExecutor::new(config.retry_config()));
//! provider.refresh(&mut state).await?;
//! let plan = provider.plan(&desired, &state);
//! let result = provider.apply(&plan, &desired, &mut state).await;
//! ```

pub mod error;
pub mod provider;
pub mod resource;
pub mod structure;

pub use error::{ProviderError, Result};
pub use provider::{ProviderState, VcdProvider};
pub use resource::{
    DhcpPoolConfig, FirewallRuleConfig, FirewallRulesReconciler, FirewallRulesResource,
    NetworkAttachment, NetworkReconciler, NetworkResource, ResourceDiff, ResourceSet,
    ResourceSpec, StaticIpPool, VAppReconciler, VAppResource,
};
