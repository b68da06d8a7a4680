//! Microsoft Azure Speech Service region configuration.
//!
//! Every Speech resource is bound to exactly one region, and a subscription key
//! is only accepted by the endpoints of that region. Narration therefore needs
//! to know the region before the first synthesis call; when the user does not
//! supply it, [`CANDIDATE_REGIONS`] is the ordered list region discovery walks.
//!
//! # Example
//!
//! ```rust
//! use narrator::core::providers::azure::AzureRegion;
//!
//! let region = AzureRegion::WestEurope;
//!
//! assert_eq!(region.tts_hostname(), "westeurope.tts.speech.microsoft.com");
//! assert!(region.voices_list_url().contains("cognitiveservices/voices/list"));
//! ```
//!
//! See: <https://learn.microsoft.com/en-us/azure/ai-services/speech-service/regions>

use std::fmt;

/// Microsoft Azure Speech Service regions.
///
/// See: <https://learn.microsoft.com/en-us/azure/ai-services/speech-service/regions>
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum AzureRegion {
    /// East US (Virginia)
    #[default]
    EastUS,
    /// East US 2 (Virginia)
    EastUS2,
    /// West US (California)
    WestUS,
    /// West US 2 (Washington)
    WestUS2,
    /// West US 3 (Arizona)
    WestUS3,
    /// Central US (Iowa)
    CentralUS,
    /// North Central US (Illinois)
    NorthCentralUS,
    /// South Central US (Texas)
    SouthCentralUS,
    /// West Central US (Wyoming)
    WestCentralUS,
    /// Canada Central (Toronto)
    CanadaCentral,
    /// Brazil South (Sao Paulo)
    BrazilSouth,
    /// North Europe (Ireland)
    NorthEurope,
    /// West Europe (Netherlands)
    WestEurope,
    /// UK South (London)
    UKSouth,
    /// France Central (Paris)
    FranceCentral,
    /// Germany West Central (Frankfurt)
    GermanyWestCentral,
    /// Sweden Central (Gävle)
    SwedenCentral,
    /// Switzerland North (Zurich)
    SwitzerlandNorth,
    /// Norway East (Oslo)
    NorwayEast,
    /// East Asia (Hong Kong)
    EastAsia,
    /// Southeast Asia (Singapore)
    SoutheastAsia,
    /// Japan East (Tokyo)
    JapanEast,
    /// Japan West (Osaka)
    JapanWest,
    /// Korea Central (Seoul)
    KoreaCentral,
    /// Australia East (Sydney)
    AustraliaEast,
    /// Central India (Pune)
    IndiaCentral,
    /// UAE North (Dubai)
    UAENorth,
    /// South Africa North (Johannesburg)
    SouthAfricaNorth,
    /// Region not explicitly listed.
    ///
    /// Explicitly entered regions that are not in the candidate list end up here,
    /// so new regions work without code changes.
    Custom(String),
}

/// Canonical probe order used by region discovery.
///
/// The order favours the regions where Speech resources are most commonly
/// created, so a typical key is found within the first few probes.
pub const CANDIDATE_REGIONS: &[AzureRegion] = &[
    AzureRegion::EastUS,
    AzureRegion::WestEurope,
    AzureRegion::WestUS2,
    AzureRegion::EastUS2,
    AzureRegion::SoutheastAsia,
    AzureRegion::NorthEurope,
    AzureRegion::WestUS,
    AzureRegion::CentralUS,
    AzureRegion::UKSouth,
    AzureRegion::JapanEast,
    AzureRegion::AustraliaEast,
    AzureRegion::WestUS3,
    AzureRegion::NorthCentralUS,
    AzureRegion::SouthCentralUS,
    AzureRegion::WestCentralUS,
    AzureRegion::CanadaCentral,
    AzureRegion::FranceCentral,
    AzureRegion::GermanyWestCentral,
    AzureRegion::SwedenCentral,
    AzureRegion::SwitzerlandNorth,
    AzureRegion::NorwayEast,
    AzureRegion::EastAsia,
    AzureRegion::JapanWest,
    AzureRegion::KoreaCentral,
    AzureRegion::IndiaCentral,
    AzureRegion::BrazilSouth,
    AzureRegion::UAENorth,
    AzureRegion::SouthAfricaNorth,
];

impl AzureRegion {
    /// Get the region identifier string used in Azure URLs.
    ///
    /// ```rust
    /// use narrator::core::providers::azure::AzureRegion;
    ///
    /// assert_eq!(AzureRegion::EastUS.as_str(), "eastus");
    /// assert_eq!(AzureRegion::IndiaCentral.as_str(), "centralindia");
    /// ```
    #[inline]
    pub fn as_str(&self) -> &str {
        match self {
            Self::EastUS => "eastus",
            Self::EastUS2 => "eastus2",
            Self::WestUS => "westus",
            Self::WestUS2 => "westus2",
            Self::WestUS3 => "westus3",
            Self::CentralUS => "centralus",
            Self::NorthCentralUS => "northcentralus",
            Self::SouthCentralUS => "southcentralus",
            Self::WestCentralUS => "westcentralus",
            Self::CanadaCentral => "canadacentral",
            Self::BrazilSouth => "brazilsouth",
            Self::NorthEurope => "northeurope",
            Self::WestEurope => "westeurope",
            Self::UKSouth => "uksouth",
            Self::FranceCentral => "francecentral",
            Self::GermanyWestCentral => "germanywestcentral",
            Self::SwedenCentral => "swedencentral",
            Self::SwitzerlandNorth => "switzerlandnorth",
            Self::NorwayEast => "norwayeast",
            Self::EastAsia => "eastasia",
            Self::SoutheastAsia => "southeastasia",
            Self::JapanEast => "japaneast",
            Self::JapanWest => "japanwest",
            Self::KoreaCentral => "koreacentral",
            Self::AustraliaEast => "australiaeast",
            Self::IndiaCentral => "centralindia",
            Self::UAENorth => "uaenorth",
            Self::SouthAfricaNorth => "southafricanorth",
            Self::Custom(region) => region.as_str(),
        }
    }

    /// Get the TTS hostname for this region.
    ///
    /// Format: `<region>.tts.speech.microsoft.com`
    #[inline]
    pub fn tts_hostname(&self) -> String {
        format!("{}.tts.speech.microsoft.com", self.as_str())
    }

    /// REST endpoint used for synthesis.
    ///
    /// Format: `https://<region>.tts.speech.microsoft.com/cognitiveservices/v1`
    #[inline]
    pub fn tts_rest_url(&self) -> String {
        format!("https://{}/cognitiveservices/v1", self.tts_hostname())
    }

    /// Voices list endpoint for this region.
    ///
    /// This is the cheapest authenticated read the Speech service offers, which
    /// makes it the probe target for region discovery.
    ///
    /// Format: `https://<region>.tts.speech.microsoft.com/cognitiveservices/voices/list`
    #[inline]
    pub fn voices_list_url(&self) -> String {
        format!(
            "https://{}/cognitiveservices/voices/list",
            self.tts_hostname()
        )
    }
}

impl fmt::Display for AzureRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AzureRegion {
    type Err = std::convert::Infallible;

    /// Parse a region identifier.
    ///
    /// Matching ignores case and surrounding whitespace; unknown identifiers are
    /// wrapped in [`AzureRegion::Custom`] in their normalised (lowercase) form.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        let region = CANDIDATE_REGIONS
            .iter()
            .find(|candidate| candidate.as_str() == normalized)
            .cloned()
            .unwrap_or(Self::Custom(normalized));
        Ok(region)
    }
}
