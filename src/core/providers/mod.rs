//! Provider infrastructure for external cloud services.
//!
//! # Available Providers
//!
//! - **azure**: Azure Speech regions and authentication helpers

pub mod azure;

pub use azure::{AzureRegion, CANDIDATE_REGIONS, mask_subscription_key};
