//! Provider connection settings

use crate::error::{CloudError, Result};
use crate::retry::RetryConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_MAX_RETRY_TIMEOUT: u64 = 60;

/// Settings consumed once at startup to open a session
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub user: String,
    pub password: String,
    /// Organization name
    pub org: String,
    /// VDC selector; the first VDC of the organization when unset
    #[serde(default)]
    pub vdc: Option<String>,
    /// API base URL, e.g. `https://vcd.example.com/api`
    pub url: String,
    /// Budget in seconds for each retried remote call
    #[serde(default = "default_max_retry_timeout")]
    pub max_retry_timeout: u64,
    /// Skip TLS certificate validation
    #[serde(default)]
    pub allow_unverified_ssl: bool,
}

fn default_max_retry_timeout() -> u64 {
    DEFAULT_MAX_RETRY_TIMEOUT
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("org", &self.org)
            .field("vdc", &self.vdc)
            .field("url", &self.url)
            .field("max_retry_timeout", &self.max_retry_timeout)
            .field("allow_unverified_ssl", &self.allow_unverified_ssl)
            .finish()
    }
}

impl ProviderConfig {
    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.user.trim().is_empty() {
            missing.push("user");
        }
        if self.password.is_empty() {
            missing.push("password");
        }
        if self.org.trim().is_empty() {
            missing.push("org");
        }
        if self.url.trim().is_empty() {
            missing.push("url");
        }
        if !missing.is_empty() {
            return Err(CloudError::InvalidConfig(format!(
                "missing provider settings: {}",
                missing.join(", ")
            )));
        }

        if !(self.url.starts_with("https://") || self.url.starts_with("http://")) {
            return Err(CloudError::InvalidConfig(format!(
                "url must be an absolute http(s) URL: {}",
                self.url
            )));
        }

        if self.max_retry_timeout == 0 {
            return Err(CloudError::InvalidConfig(
                "max_retry_timeout must be at least 1 second".to_string(),
            ));
        }

        Ok(())
    }

    /// Retry settings derived from `max_retry_timeout`
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::with_max_duration(Duration::from_secs(self.max_retry_timeout))
    }

    /// Login name in the `user@org` form expected by the sessions endpoint
    pub fn login(&self) -> String {
        format!("{}@{}", self.user, self.org)
    }
}
