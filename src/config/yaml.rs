use serde::Deserialize;
use std::path::PathBuf;

/// Complete YAML configuration structure
///
/// Every field is optional; missing values fall back to environment variables
/// and then to defaults.
///
/// # Example YAML structure
/// ```yaml
/// azure:
///   subscription_key: "your-speech-key"
///   region: "westeurope"
///
/// voice:
///   name: "en-US-JennyNeural"
///   rate: 1.0
///
/// audio:
///   format: "mp3"
///   sample_rate: 24000
///   synthesis_timeout_seconds: 60
///
/// store:
///   path: "/home/me/.narrator/store.json"
///
/// discovery:
///   probe_timeout_ms: 3500
///   probe_delay_ms: 140
///   cache_ttl_seconds: 604800
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub azure: Option<AzureYaml>,
    pub voice: Option<VoiceYaml>,
    pub audio: Option<AudioYaml>,
    pub store: Option<StoreYaml>,
    pub discovery: Option<DiscoveryYaml>,
}

/// Azure Speech credentials from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AzureYaml {
    /// Subscription key (Azure Portal → Speech resource → Keys and Endpoint)
    pub subscription_key: Option<String>,
    /// Region the Speech resource lives in; discovered automatically when absent
    pub region: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct VoiceYaml {
    pub name: Option<String>,
    pub rate: Option<f32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AudioYaml {
    pub format: Option<String>,
    pub sample_rate: Option<u32>,
    pub synthesis_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct StoreYaml {
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct DiscoveryYaml {
    pub probe_timeout_ms: Option<u64>,
    pub probe_delay_ms: Option<u64>,
    pub cache_ttl_seconds: Option<u64>,
}

impl YamlConfig {
    /// Load YAML configuration from a file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or contains invalid YAML.
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {e}", path.display()))?;
        let config: YamlConfig = serde_yaml::from_str(&contents)
            .map_err(|e| format!("Failed to parse config file {}: {e}", path.display()))?;
        Ok(config)
    }
}
