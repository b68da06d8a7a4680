use std::env;
use std::path::PathBuf;

use super::NarratorConfig;
use super::utils::{non_empty, parse_number};
use super::yaml::YamlConfig;

/// Merge YAML configuration with environment variables
///
/// Priority order (highest to lowest):
/// 1. YAML configuration values
/// 2. Environment variables
/// 3. Default values
pub fn merge_config(
    yaml_config: Option<YamlConfig>,
) -> Result<NarratorConfig, Box<dyn std::error::Error>> {
    let yaml = yaml_config.unwrap_or_default();
    let defaults = NarratorConfig::default();

    // Helper macro for optional strings: YAML > ENV
    macro_rules! get_optional {
        ($env_var:expr, $yaml_value:expr) => {
            non_empty($yaml_value).or_else(|| non_empty(env::var($env_var).ok()))
        };
    }

    // Helper macro for numbers: YAML > ENV > Default
    macro_rules! get_number {
        ($env_var:expr, $yaml_value:expr, $default:expr) => {
            match $yaml_value {
                Some(value) => value,
                None => match non_empty(env::var($env_var).ok()) {
                    Some(raw) => parse_number($env_var, &raw)?,
                    None => $default,
                },
            }
        };
    }

    let azure = yaml.azure.unwrap_or_default();
    let voice_yaml = yaml.voice.unwrap_or_default();
    let audio = yaml.audio.unwrap_or_default();
    let discovery = yaml.discovery.unwrap_or_default();

    let azure_speech_subscription_key =
        get_optional!("AZURE_SPEECH_SUBSCRIPTION_KEY", azure.subscription_key);
    let azure_speech_region = get_optional!("AZURE_SPEECH_REGION", azure.region);

    let voice = get_optional!("NARRATOR_VOICE", voice_yaml.name).unwrap_or(defaults.voice);
    let rate = get_number!("NARRATOR_RATE", voice_yaml.rate, defaults.rate);

    let audio_format =
        get_optional!("NARRATOR_AUDIO_FORMAT", audio.format).unwrap_or(defaults.audio_format);
    let sample_rate = get_number!("NARRATOR_SAMPLE_RATE", audio.sample_rate, defaults.sample_rate);
    let synthesis_timeout_seconds = get_number!(
        "NARRATOR_SYNTHESIS_TIMEOUT_SECONDS",
        audio.synthesis_timeout_seconds,
        defaults.synthesis_timeout_seconds
    );

    let store_path = yaml
        .store
        .and_then(|s| s.path)
        .or_else(|| non_empty(env::var("NARRATOR_STORE_PATH").ok()).map(PathBuf::from));

    let probe_timeout_ms = get_number!(
        "NARRATOR_PROBE_TIMEOUT_MS",
        discovery.probe_timeout_ms,
        defaults.probe_timeout_ms
    );
    let probe_delay_ms = get_number!(
        "NARRATOR_PROBE_DELAY_MS",
        discovery.probe_delay_ms,
        defaults.probe_delay_ms
    );
    let region_cache_ttl_seconds = get_number!(
        "NARRATOR_REGION_CACHE_TTL_SECONDS",
        discovery.cache_ttl_seconds,
        defaults.region_cache_ttl_seconds
    );

    Ok(NarratorConfig {
        azure_speech_subscription_key,
        azure_speech_region,
        voice,
        rate,
        audio_format,
        sample_rate,
        synthesis_timeout_seconds,
        store_path,
        probe_timeout_ms,
        probe_delay_ms,
        region_cache_ttl_seconds,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::yaml::{AzureYaml, DiscoveryYaml, VoiceYaml};
    use serial_test::serial;

    fn cleanup_env_vars() {
        unsafe {
            env::remove_var("AZURE_SPEECH_SUBSCRIPTION_KEY");
            env::remove_var("AZURE_SPEECH_REGION");
            env::remove_var("NARRATOR_VOICE");
            env::remove_var("NARRATOR_RATE");
            env::remove_var("NARRATOR_PROBE_TIMEOUT_MS");
            env::remove_var("NARRATOR_STORE_PATH");
        }
    }

    #[test]
    #[serial]
    fn test_merge_yaml_over_env() {
        cleanup_env_vars();
        unsafe {
            env::set_var("AZURE_SPEECH_REGION", "eastus");
            env::set_var("NARRATOR_VOICE", "en-US-GuyNeural");
            env::set_var("NARRATOR_PROBE_TIMEOUT_MS", "900");
        }

        let yaml = YamlConfig {
            azure: Some(AzureYaml {
                subscription_key: Some("yaml-key".into()),
                region: Some("westeurope".into()),
            }),
            voice: Some(VoiceYaml {
                name: None,
                rate: Some(1.1),
            }),
            ..Default::default()
        };

        let config = merge_config(Some(yaml)).unwrap();
        assert_eq!(config.speech_key(), Some("yaml-key"));
        assert_eq!(config.azure_speech_region.as_deref(), Some("westeurope"));
        assert_eq!(config.voice, "en-US-GuyNeural");
        assert_eq!(config.rate, 1.1);
        assert_eq!(config.probe_timeout_ms, 900);

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_merge_defaults_without_sources() {
        cleanup_env_vars();
        let config = merge_config(None).unwrap();
        assert_eq!(config.voice, "en-US-JennyNeural");
        assert_eq!(config.sample_rate, 24000);
        assert!(config.store_path.is_none());
    }

    #[test]
    #[serial]
    fn test_merge_invalid_env_number() {
        cleanup_env_vars();
        unsafe {
            env::set_var("NARRATOR_RATE", "quick");
        }
        let yaml = YamlConfig {
            discovery: Some(DiscoveryYaml::default()),
            ..Default::default()
        };
        assert!(merge_config(Some(yaml)).is_err());
        cleanup_env_vars();
    }
}
