//! Cloud provider error types
//!
//! Every failure that crosses the remote-call boundary carries an
//! [`ErrorClass`], so the retry executor decides on a field instead of
//! inspecting error variants.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// How a failure should be treated by the retry executor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The remote entity is busy with another task (`400 / BUSY_ENTITY`)
    RetryableBusy,
    /// The control plane hit an internal error (`500 / INTERNAL_SERVER_ERROR`)
    RetryableInternal,
    /// Anything else: retrying will not help
    Terminal,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorClass::RetryableBusy => write!(f, "retryable-busy"),
            ErrorClass::RetryableInternal => write!(f, "retryable-internal"),
            ErrorClass::Terminal => write!(f, "terminal"),
        }
    }
}

pub const MINOR_BUSY_ENTITY: &str = "BUSY_ENTITY";
pub const MINOR_INTERNAL_SERVER_ERROR: &str = "INTERNAL_SERVER_ERROR";

/// Structured error reported by the control plane
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiFault {
    pub major_error_code: u16,
    pub minor_error_code: String,
    pub message: String,
    pub class: ErrorClass,
}

impl ApiFault {
    pub fn new(
        major_error_code: u16,
        minor_error_code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let minor_error_code = minor_error_code.into();
        let class = classify(major_error_code, &minor_error_code);
        Self {
            major_error_code,
            minor_error_code,
            message: message.into(),
            class,
        }
    }

    pub fn busy_entity(message: impl Into<String>) -> Self {
        Self::new(400, MINOR_BUSY_ENTITY, message)
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        Self::new(500, MINOR_INTERNAL_SERVER_ERROR, message)
    }

    pub fn is_retryable(&self) -> bool {
        self.class != ErrorClass::Terminal
    }
}

impl fmt::Display for ApiFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}: {}",
            self.major_error_code, self.minor_error_code, self.message
        )
    }
}

fn classify(major: u16, minor: &str) -> ErrorClass {
    match (major, minor) {
        (400, MINOR_BUSY_ENTITY) => ErrorClass::RetryableBusy,
        (500, MINOR_INTERNAL_SERVER_ERROR) => ErrorClass::RetryableInternal,
        _ => ErrorClass::Terminal,
    }
}

/// Cloud provider errors
#[derive(Error, Debug)]
pub enum CloudError {
    /// The control plane rejected a request
    #[error("API error: {0}")]
    Api(ApiFault),

    /// A submitted task finished in the error state
    #[error("Task failed: {0}")]
    TaskFailed(ApiFault),

    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Timeout: {operation} did not succeed within {budget:?} (last error: {last_error})")]
    Timeout {
        operation: String,
        budget: Duration,
        last_error: String,
    },

    #[error("State file error: {0}")]
    StateError(String),

    #[error("Lock acquisition failed: {0}")]
    LockError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CloudError {
    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        CloudError::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub fn classification(&self) -> ErrorClass {
        match self {
            CloudError::Api(fault) | CloudError::TaskFailed(fault) => fault.class,
            _ => ErrorClass::Terminal,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, CloudError::Timeout { .. })
    }
}

impl From<ApiFault> for CloudError {
    fn from(fault: ApiFault) -> Self {
        CloudError::Api(fault)
    }
}

pub type Result<T> = std::result::Result<T, CloudError>;
