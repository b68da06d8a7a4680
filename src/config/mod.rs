//! Configuration for the narrator
//!
//! Settings come from environment variables (optionally via a `.env` file) or
//! from a YAML file merged with the environment.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `merge`: Merging YAML and environment configurations
//! - `validation`: Range and format checks
//! - `utils`: Parsing helpers
//!
//! # Example
//! ```rust,no_run
//! use narrator::config::NarratorConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Environment only
//! let config = NarratorConfig::from_env()?;
//!
//! // YAML file merged with the environment
//! let config = NarratorConfig::from_file(&PathBuf::from("narrator.yaml"))?;
//! println!("Voice: {}", config.voice);
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::time::Duration;

use crate::core::region::ResolverConfig;
use crate::core::store::Preferences;
use crate::core::tts::TTSConfig;

mod env;
mod merge;
mod utils;
mod validation;
mod yaml;

pub use yaml::YamlConfig;

pub const DEFAULT_VOICE: &str = "en-US-JennyNeural";
pub const DEFAULT_RATE: f32 = 1.0;
pub const DEFAULT_AUDIO_FORMAT: &str = "mp3";
pub const DEFAULT_SAMPLE_RATE: u32 = 24000;
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 3500;
pub const DEFAULT_PROBE_DELAY_MS: u64 = 140;
pub const DEFAULT_REGION_CACHE_TTL_SECONDS: u64 = 7 * 24 * 60 * 60;
pub const DEFAULT_SYNTHESIS_TIMEOUT_SECONDS: u64 = 60;

/// Narrator configuration
#[derive(Debug, Clone)]
pub struct NarratorConfig {
    // Azure Speech credentials
    pub azure_speech_subscription_key: Option<String>,
    pub azure_speech_region: Option<String>,

    // Voice defaults; stored preferences take precedence at runtime
    pub voice: String,
    pub rate: f32,

    // Audio output
    pub audio_format: String,
    pub sample_rate: u32,
    pub synthesis_timeout_seconds: u64,

    // Persistence (in-memory when unset)
    pub store_path: Option<PathBuf>,

    // Region discovery
    pub probe_timeout_ms: u64,
    pub probe_delay_ms: u64,
    pub region_cache_ttl_seconds: u64,
}

impl Default for NarratorConfig {
    fn default() -> Self {
        Self {
            azure_speech_subscription_key: None,
            azure_speech_region: None,
            voice: DEFAULT_VOICE.to_string(),
            rate: DEFAULT_RATE,
            audio_format: DEFAULT_AUDIO_FORMAT.to_string(),
            sample_rate: DEFAULT_SAMPLE_RATE,
            synthesis_timeout_seconds: DEFAULT_SYNTHESIS_TIMEOUT_SECONDS,
            store_path: None,
            probe_timeout_ms: DEFAULT_PROBE_TIMEOUT_MS,
            probe_delay_ms: DEFAULT_PROBE_DELAY_MS,
            region_cache_ttl_seconds: DEFAULT_REGION_CACHE_TTL_SECONDS,
        }
    }
}

impl NarratorConfig {
    /// Load configuration from a YAML file merged with environment variables.
    ///
    /// YAML values take precedence over the environment, which takes precedence
    /// over defaults. The `.env` file is not read here: the YAML file is the
    /// source of truth and only real environment variables fill its gaps.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed, a value has an
    /// invalid format, or validation fails.
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let yaml_config = yaml::YamlConfig::from_file(path)?;
        let config = merge::merge_config(Some(yaml_config))?;
        config.validate()?;
        Ok(config)
    }

    /// Runs every validation check against this configuration.
    pub fn validate(&self) -> Result<(), Box<dyn std::error::Error>> {
        validation::validate_rate(self.rate)?;
        validation::validate_voice(&self.voice)?;
        validation::validate_audio_format(&self.audio_format, self.sample_rate)?;
        validation::validate_discovery_timing(self.probe_timeout_ms, self.region_cache_ttl_seconds)?;
        Ok(())
    }

    /// Subscription key, if configured and not blank.
    pub fn speech_key(&self) -> Option<&str> {
        self.azure_speech_subscription_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }

    pub fn tts_config(&self) -> TTSConfig {
        TTSConfig {
            audio_format: Some(self.audio_format.clone()),
            sample_rate: Some(self.sample_rate),
            request_timeout: Some(self.synthesis_timeout_seconds),
        }
    }

    pub fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig {
            probe_timeout: Duration::from_millis(self.probe_timeout_ms),
            probe_delay: Duration::from_millis(self.probe_delay_ms),
            cache_ttl: Duration::from_secs(self.region_cache_ttl_seconds),
            ..ResolverConfig::default()
        }
    }

    pub fn default_preferences(&self) -> Preferences {
        Preferences {
            voice: self.voice.clone(),
            rate: self.rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = NarratorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.voice, "en-US-JennyNeural");
        assert!(config.speech_key().is_none());
    }

    #[test]
    fn test_derived_configs() {
        let config = NarratorConfig {
            azure_speech_subscription_key: Some("  key  ".into()),
            probe_timeout_ms: 1000,
            probe_delay_ms: 10,
            region_cache_ttl_seconds: 60,
            ..NarratorConfig::default()
        };
        assert_eq!(config.speech_key(), Some("key"));

        let resolver = config.resolver_config();
        assert_eq!(resolver.probe_timeout, Duration::from_secs(1));
        assert_eq!(resolver.probe_delay, Duration::from_millis(10));
        assert_eq!(resolver.cache_ttl, Duration::from_secs(60));
        assert_eq!(resolver.candidates.len(), 28);

        let tts = config.tts_config();
        assert_eq!(tts.audio_format.as_deref(), Some("mp3"));
        assert_eq!(tts.request_timeout, Some(60));
    }

    #[test]
    fn test_blank_key_is_none() {
        let config = NarratorConfig {
            azure_speech_subscription_key: Some("   ".into()),
            ..NarratorConfig::default()
        };
        assert!(config.speech_key().is_none());
    }
}
