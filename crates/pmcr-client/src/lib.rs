//! # PMCR Client
//!
//! HTTP access to PMCR nodes: [`HttpStageClient`] implements the four stage
//! contracts against a remote node, and [`PmcrClient`] drives its cycle API.

pub mod client;
pub mod stage;

pub use client::{HealthStatus, PmcrClient};
pub use stage::HttpStageClient;

/// Prelude module for common imports.
pub mod prelude {
    pub use crate::client::PmcrClient;
    pub use crate::stage::HttpStageClient;
    pub use pmcr_core::prelude::*;
}
