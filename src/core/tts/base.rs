//! # Synthesis Client Abstraction
//!
//! The playback engine consumes speech synthesis as a black box: text, voice,
//! rate and credentials go in, one complete audio payload comes out. This module
//! defines that seam ([`SynthesisClient`]), the request it receives, and the
//! error taxonomy every implementation maps provider failures onto.
//!
//! ## Usage Example
//!
//! ```rust,ignore
//! use narrator::core::tts::{SynthesisClient, SynthesisRequest};
//!
//! async fn speak_once(client: &dyn SynthesisClient) -> Result<(), narrator::core::tts::TTSError> {
//!     let request = SynthesisRequest {
//!         text: "Hello, world!".to_string(),
//!         voice: "en-US-JennyNeural".to_string(),
//!         rate: 1.0,
//!         speech_key: "your-key".to_string(),
//!         region: "westeurope".to_string(),
//!     };
//!     let audio = client.synthesize(&request).await?;
//!     println!("{} bytes of audio", audio.len());
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use bytes::Bytes;
use xxhash_rust::xxh3::xxh3_128;

/// TTS-specific error types
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TTSError {
    #[error("Audio generation failed: {0}")]
    AudioGenerationFailed(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The provider refused the credential (HTTP 401/403).
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The provider throttled the request (HTTP 429).
    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("Timeout error: {0}")]
    TimeoutError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Result type for TTS operations
pub type TTSResult<T> = Result<T, TTSError>;

/// Everything the provider needs to produce audio for one paragraph.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisRequest {
    /// Narration text, already stripped of presentation artifacts.
    pub text: String,
    /// Provider voice name, e.g. `en-US-JennyNeural`.
    pub voice: String,
    /// Speaking rate multiplier (1.0 is normal speed).
    pub rate: f32,
    /// Subscription key.
    pub speech_key: String,
    /// Region identifier the key is bound to.
    pub region: String,
}

impl SynthesisRequest {
    /// Stable hash of every field that changes the produced audio.
    ///
    /// The look-ahead buffer stores this next to the payload so audio produced
    /// under an older voice, rate or region is never played back.
    pub fn fingerprint(&self) -> u128 {
        let mut s = String::with_capacity(self.text.len() + 64);
        s.push_str(&self.voice);
        s.push('|');
        s.push_str(&format!("{:.3}", self.rate));
        s.push('|');
        s.push_str(&self.region);
        s.push('|');
        s.push_str(&self.text);
        xxh3_128(s.as_bytes())
    }
}

/// Provider capability consumed by the playback engine.
///
/// Implementations return the whole clip for a request; they do not retry.
#[async_trait]
pub trait SynthesisClient: Send + Sync {
    /// Synthesize `request.text` and return the encoded audio.
    async fn synthesize(&self, request: &SynthesisRequest) -> TTSResult<Bytes>;

    /// Short provider identifier used in logs.
    fn name(&self) -> &str {
        "unknown"
    }
}

/// Configuration shared by HTTP synthesis clients.
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
pub struct TTSConfig {
    /// Audio format preference ("mp3", "pcm", "opus")
    pub audio_format: Option<String>,
    /// Sample rate preference
    pub sample_rate: Option<u32>,
    /// Request timeout in seconds
    pub request_timeout: Option<u64>,
}

impl Default for TTSConfig {
    fn default() -> Self {
        Self {
            audio_format: Some("mp3".to_string()),
            sample_rate: Some(24000),
            request_timeout: Some(60),
        }
    }
}
