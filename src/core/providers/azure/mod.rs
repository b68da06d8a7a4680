//! Microsoft Azure Speech Services provider infrastructure.
//!
//! Shared by the synthesis client and the region prober:
//!
//! - **region**: regional endpoints and the ordered discovery candidate list
//! - **auth**: subscription key header helpers
//!
//! See: <https://learn.microsoft.com/en-us/azure/ai-services/speech-service/>

pub mod auth;
pub mod region;

pub use auth::{
    AZURE_SUBSCRIPTION_KEY_HEADER, build_subscription_key_header, mask_subscription_key,
};
pub use region::{AzureRegion, CANDIDATE_REGIONS};
