//! vcdflow Cloud Infrastructure
//!
//! This crate holds the provider-independent core of vcdflow: the remote
//! API seam, the classified error taxonomy, the retry executor every
//! mutation goes through, and the local state file.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                   vcd CLI                        │
//! │            (plan / apply / destroy)              │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │               vcdflow-provider                   │
//! │  vApp / network / firewall reconcilers           │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │                vcdflow-cloud                     │
//! │  ┌──────────────────┐  ┌────────────────────┐   │
//! │  │  trait VcdApi    │  │  RetryExecutor     │   │
//! │  └──────────────────┘  └────────────────────┘   │
//! │  ┌──────────────────┐  ┌────────────────────┐   │
//! │  │  CloudError      │  │  State Mgmt        │   │
//! │  └──────────────────┘  └────────────────────┘   │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │   vcdflow-cloud-api (HTTP session + client)      │
//! └─────────────────────────────────────────────────┘
//! ```

pub mod action;
pub mod api;
pub mod config;
pub mod error;
pub mod model;
pub mod provider;
pub mod retry;
pub mod state;
pub mod task;

// Re-exports
pub use action::{Action, ActionResult, ActionType, ApplyResult, Plan, PlanSummary};
pub use api::{DhcpPoolRequest, VcdApi};
pub use config::ProviderConfig;
pub use error::{ApiFault, CloudError, ErrorClass, Result};
pub use provider::{AuthStatus, Reconciler};
pub use retry::{RetryConfig, RetryExecutor, RetryPolicy};
pub use state::{GlobalState, StateLock, StateManager};
pub use task::{Task, TaskStatus, TaskWaiter};
