//! Resource reconciler trait definition

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Per-resource-type create/read/update/delete against the control plane
///
/// Every reconciler takes the declared record and returns it with the
/// computed fields (tracked `id`, `href`, ...) filled in. A resource that
/// vanished remotely comes back from [`read`](Reconciler::read) with its
/// identifier cleared instead of an error.
#[async_trait]
pub trait Reconciler: Send + Sync {
    type Resource: Clone + Send + Sync + 'static;

    /// Resource type name used in manifests and state keys (e.g. "vapp")
    fn resource_type(&self) -> &'static str;

    /// Create the resource and converge it to the declared record
    async fn create(&self, planned: Self::Resource) -> Result<Self::Resource>;

    /// Refresh computed fields from observed state
    async fn read(&self, state: Self::Resource) -> Result<Self::Resource>;

    /// Apply the attribute-scoped differences between `prior` and `planned`
    async fn update(&self, prior: &Self::Resource, planned: Self::Resource)
    -> Result<Self::Resource>;

    /// Destroy the resource tracked by `state`
    async fn delete(&self, state: &Self::Resource) -> Result<()>;
}

/// Authentication status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthStatus {
    /// Whether authentication is valid
    pub authenticated: bool,

    /// Organization / VDC the session resolved to
    pub account_info: Option<String>,

    /// Error message if not authenticated
    pub error: Option<String>,
}

impl AuthStatus {
    pub fn ok(account_info: impl Into<String>) -> Self {
        Self {
            authenticated: true,
            account_info: Some(account_info.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            authenticated: false,
            account_info: None,
            error: Some(error.into()),
        }
    }
}
