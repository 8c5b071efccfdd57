//! HTTP client error types

use thiserror::Error;
use vcdflow_cloud::{ApiFault, CloudError};

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Error body returned by the control plane
    #[error("{0}")]
    Api(ApiFault),

    #[error("Authentication failed: {0}")]
    Unauthorized(String),

    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<ClientError> for CloudError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Api(fault) => CloudError::Api(fault),
            ClientError::Unauthorized(msg) => CloudError::AuthenticationFailed(msg),
            ClientError::NotFound { kind, name } => CloudError::NotFound { kind, name },
            ClientError::InvalidConfig(msg) => CloudError::InvalidConfig(msg),
            ClientError::Json(e) => CloudError::Json(e),
            other => CloudError::Transport(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
