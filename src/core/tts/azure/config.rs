//! Configuration types for the Azure Text-to-Speech REST API.
//!
//! - Audio output format selection (`X-Microsoft-OutputFormat`)
//! - SSML generation with prosody-based rate control

use crate::core::providers::azure::AzureRegion;
use crate::core::tts::base::TTSConfig;
use serde::{Deserialize, Serialize};

/// HTTP header name for Azure TTS output format.
pub const AZURE_OUTPUT_FORMAT_HEADER: &str = "X-Microsoft-OutputFormat";

/// Voice used when none is configured.
pub const DEFAULT_AZURE_VOICE: &str = "en-US-JennyNeural";

// =============================================================================
// Audio Encoding
// =============================================================================

/// Azure Text-to-Speech output formats the narrator requests.
///
/// Narration hands whole clips to the host audio primitive, so only
/// self-describing streaming formats are offered, plus raw PCM for sinks that
/// want samples directly.
///
/// ```rust
/// use narrator::core::tts::azure::AzureAudioEncoding;
///
/// let format = AzureAudioEncoding::Audio24Khz96KbitrateMonoMp3;
/// assert_eq!(format.as_str(), "audio-24khz-96kbitrate-mono-mp3");
/// assert_eq!(format.sample_rate(), 24000);
/// assert_eq!(format.file_extension(), "mp3");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AzureAudioEncoding {
    /// 16kHz, 16-bit PCM mono
    Raw16Khz16BitMonoPcm,
    /// 24kHz, 16-bit PCM mono
    Raw24Khz16BitMonoPcm,
    /// 48kHz, 16-bit PCM mono
    Raw48Khz16BitMonoPcm,
    /// 16kHz, 64kbps MP3 mono
    Audio16Khz64KbitrateMonoMp3,
    /// 24kHz, 96kbps MP3 mono
    #[default]
    Audio24Khz96KbitrateMonoMp3,
    /// 48kHz, 192kbps MP3 mono
    Audio48Khz192KbitrateMonoMp3,
    /// 16kHz, 16-bit, 32kbps Opus mono (Ogg container)
    Ogg16Khz16BitMonoOpus,
    /// 24kHz, 16-bit, 48kbps Opus mono (Ogg container)
    Ogg24Khz16BitMonoOpus,
}

impl AzureAudioEncoding {
    /// Returns the Azure API format string for the `X-Microsoft-OutputFormat` header.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Raw16Khz16BitMonoPcm => "raw-16khz-16bit-mono-pcm",
            Self::Raw24Khz16BitMonoPcm => "raw-24khz-16bit-mono-pcm",
            Self::Raw48Khz16BitMonoPcm => "raw-48khz-16bit-mono-pcm",
            Self::Audio16Khz64KbitrateMonoMp3 => "audio-16khz-64kbitrate-mono-mp3",
            Self::Audio24Khz96KbitrateMonoMp3 => "audio-24khz-96kbitrate-mono-mp3",
            Self::Audio48Khz192KbitrateMonoMp3 => "audio-48khz-192kbitrate-mono-mp3",
            Self::Ogg16Khz16BitMonoOpus => "ogg-16khz-16bit-mono-opus",
            Self::Ogg24Khz16BitMonoOpus => "ogg-24khz-16bit-mono-opus",
        }
    }

    /// Returns the sample rate in Hz for this audio format.
    #[inline]
    pub fn sample_rate(&self) -> u32 {
        match self {
            Self::Raw16Khz16BitMonoPcm
            | Self::Audio16Khz64KbitrateMonoMp3
            | Self::Ogg16Khz16BitMonoOpus => 16000,
            Self::Raw24Khz16BitMonoPcm
            | Self::Audio24Khz96KbitrateMonoMp3
            | Self::Ogg24Khz16BitMonoOpus => 24000,
            Self::Raw48Khz16BitMonoPcm | Self::Audio48Khz192KbitrateMonoMp3 => 48000,
        }
    }

    /// Returns true if this is a raw PCM format (uncompressed audio).
    #[inline]
    pub fn is_pcm(&self) -> bool {
        matches!(
            self,
            Self::Raw16Khz16BitMonoPcm | Self::Raw24Khz16BitMonoPcm | Self::Raw48Khz16BitMonoPcm
        )
    }

    /// Nominal bit rate, used to estimate how long a clip plays.
    pub fn bits_per_second(&self) -> u32 {
        match self {
            Self::Raw16Khz16BitMonoPcm | Self::Raw24Khz16BitMonoPcm | Self::Raw48Khz16BitMonoPcm => {
                self.sample_rate() * 16
            }
            Self::Audio16Khz64KbitrateMonoMp3 => 64_000,
            Self::Audio24Khz96KbitrateMonoMp3 => 96_000,
            Self::Audio48Khz192KbitrateMonoMp3 => 192_000,
            Self::Ogg16Khz16BitMonoOpus => 32_000,
            Self::Ogg24Khz16BitMonoOpus => 48_000,
        }
    }

    /// File extension a sink should use when writing a clip in this format.
    pub fn file_extension(&self) -> &'static str {
        if self.is_pcm() {
            "pcm"
        } else if matches!(
            self,
            Self::Ogg16Khz16BitMonoOpus | Self::Ogg24Khz16BitMonoOpus
        ) {
            "ogg"
        } else {
            "mp3"
        }
    }

    /// Maps a format string and sample rate to the closest Azure encoding.
    ///
    /// - "linear16", "pcm", "wav" → raw PCM
    /// - "mp3" → MP3
    /// - "opus", "ogg" → Ogg/Opus
    /// - anything else → the default (24kHz MP3)
    ///
    /// ```rust
    /// use narrator::core::tts::azure::AzureAudioEncoding;
    ///
    /// assert_eq!(
    ///     AzureAudioEncoding::from_format_string("pcm", 24000),
    ///     AzureAudioEncoding::Raw24Khz16BitMonoPcm
    /// );
    /// assert_eq!(
    ///     AzureAudioEncoding::from_format_string("MP3", 48000),
    ///     AzureAudioEncoding::Audio48Khz192KbitrateMonoMp3
    /// );
    /// ```
    pub fn from_format_string(format: &str, sample_rate: u32) -> Self {
        match format.to_lowercase().as_str() {
            "linear16" | "pcm" | "wav" => match sample_rate {
                0..=16000 => Self::Raw16Khz16BitMonoPcm,
                16001..=24000 => Self::Raw24Khz16BitMonoPcm,
                _ => Self::Raw48Khz16BitMonoPcm,
            },
            "mp3" => match sample_rate {
                0..=16000 => Self::Audio16Khz64KbitrateMonoMp3,
                16001..=24000 => Self::Audio24Khz96KbitrateMonoMp3,
                _ => Self::Audio48Khz192KbitrateMonoMp3,
            },
            "opus" | "ogg" => match sample_rate {
                0..=16000 => Self::Ogg16Khz16BitMonoOpus,
                _ => Self::Ogg24Khz16BitMonoOpus,
            },
            _ => Self::default(),
        }
    }
}

// =============================================================================
// SSML Generation
// =============================================================================

/// Escapes special XML characters in text for use in SSML.
///
/// ```rust
/// use narrator::core::tts::azure::escape_xml;
///
/// assert_eq!(escape_xml("Tom & Jerry"), "Tom &amp; Jerry");
/// ```
pub fn escape_xml(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&apos;"),
            _ => result.push(c),
        }
    }
    result
}

/// Extracts the BCP-47 language code from an Azure voice name.
///
/// Voice names follow `{lang}-{REGION}-{Name}Neural`; anything else falls back
/// to `en-US`.
pub fn language_code_for_voice(voice_name: &str) -> String {
    const DEFAULT_LANGUAGE: &str = "en-US";

    let mut parts = voice_name.split('-');
    match (parts.next(), parts.next()) {
        (Some(lang), Some(region))
            if !lang.is_empty()
                && region.len() == 2
                && region.chars().all(|c| c.is_ascii_uppercase()) =>
        {
            format!("{lang}-{region}")
        }
        _ => DEFAULT_LANGUAGE.to_string(),
    }
}

/// Builds an SSML document for Azure TTS.
///
/// A `<prosody>` element is added only when the rate differs from normal
/// speed; the multiplier is expressed as a percentage.
///
/// ```rust
/// use narrator::core::tts::azure::build_ssml;
///
/// let ssml = build_ssml("Fast speech", "en-US-JennyNeural", Some(1.5));
/// assert!(ssml.contains("xml:lang='en-US'"));
/// assert!(ssml.contains("rate=\"150%\""));
/// ```
pub fn build_ssml(text: &str, voice_name: &str, speaking_rate: Option<f32>) -> String {
    let escaped_text = escape_xml(text);
    let language = language_code_for_voice(voice_name);

    let inner_content = match speaking_rate {
        Some(rate) if (rate - 1.0).abs() > 0.01 => {
            let rate_percent = (rate * 100.0).round() as i32;
            format!("<prosody rate=\"{rate_percent}%\">{escaped_text}</prosody>")
        }
        _ => escaped_text,
    };

    format!(
        r#"<speak version='1.0' xmlns='http://www.w3.org/2001/10/synthesis' xml:lang='{language}'>
    <voice name='{voice_name}'>
        {inner_content}
    </voice>
</speak>"#,
    )
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Settings of the Azure synthesis client that do not vary per request.
#[derive(Debug, Clone)]
pub struct AzureTTSConfig {
    /// Output audio format.
    pub output_format: AzureAudioEncoding,
    /// HTTP request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Endpoint base replacing `https://<region>.tts.speech.microsoft.com`.
    ///
    /// When set, requests go to `{endpoint_base}/{region}/cognitiveservices/v1`.
    /// Used for sovereign clouds, proxies and tests.
    pub endpoint_base: Option<String>,
}

impl Default for AzureTTSConfig {
    fn default() -> Self {
        Self::from_base(&TTSConfig::default())
    }
}

impl AzureTTSConfig {
    /// Creates an `AzureTTSConfig` from the shared client configuration.
    pub fn from_base(base: &TTSConfig) -> Self {
        let sample_rate = base.sample_rate.unwrap_or(24000);
        let output_format = base
            .audio_format
            .as_deref()
            .map(|f| AzureAudioEncoding::from_format_string(f, sample_rate))
            .unwrap_or_default();

        Self {
            output_format,
            request_timeout_secs: base.request_timeout.unwrap_or(60),
            endpoint_base: None,
        }
    }

    /// Synthesis URL for `region`, honouring `endpoint_base`.
    pub fn synthesis_url(&self, region: &str) -> String {
        match &self.endpoint_base {
            Some(base) => format!(
                "{}/{}/cognitiveservices/v1",
                base.trim_end_matches('/'),
                region
            ),
            None => region
                .parse::<AzureRegion>()
                .unwrap_or_default()
                .tts_rest_url(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_xml_all_special_characters() {
        assert_eq!(
            escape_xml(r#"<a href="x">'&'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;&apos;&amp;&apos;&lt;/a&gt;"
        );
    }

    #[test]
    fn test_language_code_for_voice() {
        assert_eq!(language_code_for_voice("de-DE-KatjaNeural"), "de-DE");
        assert_eq!(language_code_for_voice("en-GB-SoniaNeural"), "en-GB");
        assert_eq!(language_code_for_voice("custom"), "en-US");
        assert_eq!(language_code_for_voice("zh-hans-Voice"), "en-US");
        assert_eq!(language_code_for_voice(""), "en-US");
    }

    #[test]
    fn test_build_ssml_normal_rate_has_no_prosody() {
        let ssml = build_ssml("Hello", "en-US-JennyNeural", Some(1.0));
        assert!(!ssml.contains("prosody"));
        assert!(ssml.contains("<voice name='en-US-JennyNeural'>"));
    }

    #[test]
    fn test_build_ssml_slow_rate() {
        let ssml = build_ssml("Slow", "en-US-JennyNeural", Some(0.75));
        assert!(ssml.contains("<prosody rate=\"75%\">Slow</prosody>"));
    }

    #[test]
    fn test_build_ssml_escapes_text() {
        let ssml = build_ssml("1 < 2 & 3", "en-US-JennyNeural", None);
        assert!(ssml.contains("1 &lt; 2 &amp; 3"));
    }

    #[test]
    fn test_from_format_string_fallback() {
        assert_eq!(
            AzureAudioEncoding::from_format_string("flac", 24000),
            AzureAudioEncoding::Audio24Khz96KbitrateMonoMp3
        );
        assert_eq!(
            AzureAudioEncoding::from_format_string("opus", 16000),
            AzureAudioEncoding::Ogg16Khz16BitMonoOpus
        );
    }

    #[test]
    fn test_file_extension() {
        assert_eq!(AzureAudioEncoding::Raw24Khz16BitMonoPcm.file_extension(), "pcm");
        assert_eq!(AzureAudioEncoding::Ogg24Khz16BitMonoOpus.file_extension(), "ogg");
        assert_eq!(
            AzureAudioEncoding::Audio16Khz64KbitrateMonoMp3.file_extension(),
            "mp3"
        );
    }

    #[test]
    fn test_bits_per_second() {
        assert_eq!(AzureAudioEncoding::Raw24Khz16BitMonoPcm.bits_per_second(), 384_000);
        assert_eq!(AzureAudioEncoding::default().bits_per_second(), 96_000);
    }

    #[test]
    fn test_synthesis_url() {
        let config = AzureTTSConfig::default();
        assert_eq!(
            config.synthesis_url("westeurope"),
            "https://westeurope.tts.speech.microsoft.com/cognitiveservices/v1"
        );

        let proxied = AzureTTSConfig {
            endpoint_base: Some("http://127.0.0.1:9000/".to_string()),
            ..Default::default()
        };
        assert_eq!(
            proxied.synthesis_url("eastus"),
            "http://127.0.0.1:9000/eastus/cognitiveservices/v1"
        );
    }

    #[test]
    fn test_from_base_maps_format() {
        let base = TTSConfig {
            audio_format: Some("pcm".to_string()),
            sample_rate: Some(16000),
            request_timeout: Some(15),
        };
        let config = AzureTTSConfig::from_base(&base);
        assert_eq!(config.output_format, AzureAudioEncoding::Raw16Khz16BitMonoPcm);
        assert_eq!(config.request_timeout_secs, 15);
    }
}
