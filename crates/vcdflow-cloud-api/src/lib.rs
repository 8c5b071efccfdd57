//! vCloud Director REST binding for vcdflow
//!
//! This crate implements the [`VcdApi`](vcdflow_cloud::VcdApi) seam over
//! HTTP, so the reconcilers in `vcdflow-provider` can drive a real
//! control plane.
//!
//! # Features
//!
//! - Session login (`POST /sessions`, basic auth `user@org`)
//! - Organization / VDC discovery through entity links
//! - Lookups through the query service
//! - Task polling; error bodies become classified [`ApiFault`](vcdflow_cloud::ApiFault)s
//!
//! # Example
//!
//! ```ignore
//! use vcdflow_cloud_api::HttpVcdApi;
//!
//! let api = HttpVcdApi::connect(&config).await?;
//! println!("{} / {}", api.org().name, api.vdc().name);
//! ```

pub mod client;
pub mod error;
pub mod session;
pub mod wire;

pub use client::HttpVcdApi;
pub use error::{ClientError, Result};
pub use session::{API_VERSION, VcdSession};
