//! Capability checks used by region discovery.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::debug;

use crate::core::providers::azure::{
    AZURE_SUBSCRIPTION_KEY_HEADER, AzureRegion, build_subscription_key_header,
};

/// What a single probe learned about a key/region pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The region accepted the key.
    Accepted,
    /// The provider throttled the request (HTTP 429).
    RateLimited,
    /// The region answered with a non-success status.
    Rejected(u16),
    /// No usable answer: transport failure or timeout.
    Unreachable(String),
}

/// Cheap read-only call that tells whether `region` accepts `speech_key`.
#[async_trait]
pub trait RegionProber: Send + Sync {
    async fn probe(&self, speech_key: &str, region: &str) -> ProbeOutcome;
}

/// Probes Azure Speech by listing the voices of a region.
#[derive(Clone)]
pub struct AzureRegionProber {
    client: reqwest::Client,
    endpoint_base: Option<String>,
}

impl AzureRegionProber {
    /// Builds a prober whose HTTP client gives up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            endpoint_base: None,
        })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            endpoint_base: None,
        }
    }

    /// Routes probes to `{base}/{region}/cognitiveservices/voices/list`.
    pub fn with_endpoint_base(mut self, base: impl Into<String>) -> Self {
        self.endpoint_base = Some(base.into().trim_end_matches('/').to_string());
        self
    }

    fn probe_url(&self, region: &str) -> String {
        match &self.endpoint_base {
            Some(base) => format!("{base}/{region}/cognitiveservices/voices/list"),
            None => region
                .parse::<AzureRegion>()
                .unwrap_or_default()
                .voices_list_url(),
        }
    }
}

#[async_trait]
impl RegionProber for AzureRegionProber {
    async fn probe(&self, speech_key: &str, region: &str) -> ProbeOutcome {
        let url = self.probe_url(region);
        let response = self
            .client
            .get(&url)
            .header(
                AZURE_SUBSCRIPTION_KEY_HEADER,
                build_subscription_key_header(speech_key),
            )
            .send()
            .await;

        match response {
            Ok(response) => {
                let status = response.status();
                debug!("Probe {} answered {}", region, status);
                match status {
                    s if s.is_success() => ProbeOutcome::Accepted,
                    StatusCode::TOO_MANY_REQUESTS => ProbeOutcome::RateLimited,
                    s => ProbeOutcome::Rejected(s.as_u16()),
                }
            }
            Err(e) => {
                debug!("Probe {} failed: {}", region, e);
                ProbeOutcome::Unreachable(e.to_string())
            }
        }
    }
}
