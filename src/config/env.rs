use std::env;
use std::path::PathBuf;

use super::NarratorConfig;
use super::utils::{non_empty, parse_number};

/// Reads `name` and parses it, falling back to `default` when unset.
fn env_number<T>(name: &str, default: T) -> Result<T, Box<dyn std::error::Error>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match non_empty(env::var(name).ok()) {
        Some(value) => parse_number(name, &value),
        None => Ok(default),
    }
}

impl NarratorConfig {
    /// Load configuration from environment variables
    ///
    /// Also loads a `.env` file from the working directory if present.
    ///
    /// # Errors
    /// Returns an error if a numeric variable is malformed or validation fails.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        // Load .env file if it exists
        let _ = dotenvy::dotenv();

        let defaults = NarratorConfig::default();

        // Azure credentials
        let azure_speech_subscription_key = non_empty(env::var("AZURE_SPEECH_SUBSCRIPTION_KEY").ok());
        let azure_speech_region = non_empty(env::var("AZURE_SPEECH_REGION").ok());

        // Voice
        let voice = non_empty(env::var("NARRATOR_VOICE").ok()).unwrap_or(defaults.voice);
        let rate = env_number("NARRATOR_RATE", defaults.rate)?;

        // Audio
        let audio_format =
            non_empty(env::var("NARRATOR_AUDIO_FORMAT").ok()).unwrap_or(defaults.audio_format);
        let sample_rate = env_number("NARRATOR_SAMPLE_RATE", defaults.sample_rate)?;
        let synthesis_timeout_seconds = env_number(
            "NARRATOR_SYNTHESIS_TIMEOUT_SECONDS",
            defaults.synthesis_timeout_seconds,
        )?;

        // Store
        let store_path = non_empty(env::var("NARRATOR_STORE_PATH").ok()).map(PathBuf::from);

        // Discovery
        let probe_timeout_ms = env_number("NARRATOR_PROBE_TIMEOUT_MS", defaults.probe_timeout_ms)?;
        let probe_delay_ms = env_number("NARRATOR_PROBE_DELAY_MS", defaults.probe_delay_ms)?;
        let region_cache_ttl_seconds = env_number(
            "NARRATOR_REGION_CACHE_TTL_SECONDS",
            defaults.region_cache_ttl_seconds,
        )?;

        let config = NarratorConfig {
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
        };
        config.validate()?;
        Ok(config)
    }
}
