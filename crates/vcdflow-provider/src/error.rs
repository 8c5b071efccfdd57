//! vCloud Director provider error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Invalid resource {key}: {reason}")]
    InvalidResource { key: String, reason: String },

    #[error("Duplicate resource: {0}")]
    DuplicateResource(String),

    #[error("Cloud error: {0}")]
    Cloud(#[from] vcdflow_cloud::CloudError),
}

pub type Result<T> = std::result::Result<T, ProviderError>;
