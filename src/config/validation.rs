use crate::core::playback::{MAX_RATE, MIN_RATE};

/// Validate the default speaking rate
pub fn validate_rate(rate: f32) -> Result<(), Box<dyn std::error::Error>> {
    if !rate.is_finite() || !(MIN_RATE..=MAX_RATE).contains(&rate) {
        return Err(format!("NARRATOR_RATE must be between {MIN_RATE} and {MAX_RATE}, got {rate}").into());
    }
    Ok(())
}

pub fn validate_voice(voice: &str) -> Result<(), Box<dyn std::error::Error>> {
    if voice.trim().is_empty() {
        return Err("NARRATOR_VOICE must not be empty".into());
    }
    Ok(())
}

/// Validate the output format and sample rate combination
///
/// Azure offers every supported container at 16, 24 and 48 kHz only.
pub fn validate_audio_format(format: &str, sample_rate: u32) -> Result<(), Box<dyn std::error::Error>> {
    match format.to_lowercase().as_str() {
        "mp3" | "pcm" | "linear16" | "wav" | "opus" | "ogg" => {}
        other => {
            return Err(format!(
                "Unsupported NARRATOR_AUDIO_FORMAT '{other}'. Use mp3, pcm or opus"
            )
            .into());
        }
    }
    if !matches!(sample_rate, 16000 | 24000 | 48000) {
        return Err(format!(
            "Unsupported NARRATOR_SAMPLE_RATE {sample_rate}. Use 16000, 24000 or 48000"
        )
        .into());
    }
    Ok(())
}

pub fn validate_discovery_timing(
    probe_timeout_ms: u64,
    region_cache_ttl_seconds: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    if probe_timeout_ms == 0 {
        return Err("NARRATOR_PROBE_TIMEOUT_MS must be greater than zero".into());
    }
    if region_cache_ttl_seconds == 0 {
        return Err("NARRATOR_REGION_CACHE_TTL_SECONDS must be greater than zero".into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rate_bounds() {
        assert!(validate_rate(0.5).is_ok());
        assert!(validate_rate(2.0).is_ok());
        assert!(validate_rate(0.49).is_err());
        assert!(validate_rate(2.5).is_err());
        assert!(validate_rate(f32::NAN).is_err());
    }

    #[test]
    fn test_validate_audio_format() {
        assert!(validate_audio_format("MP3", 24000).is_ok());
        assert!(validate_audio_format("opus", 16000).is_ok());
        assert!(validate_audio_format("flac", 24000).is_err());
        assert!(validate_audio_format("mp3", 22050).is_err());
    }

    #[test]
    fn test_validate_voice_and_timing() {
        assert!(validate_voice("en-US-JennyNeural").is_ok());
        assert!(validate_voice("  ").is_err());
        assert!(validate_discovery_timing(3500, 60).is_ok());
        assert!(validate_discovery_timing(0, 60).is_err());
        assert!(validate_discovery_timing(3500, 0).is_err());
    }
}
