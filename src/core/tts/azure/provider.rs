//! Azure Text-to-Speech synthesis client.
//!
//! Builds one HTTP POST per paragraph against the Azure Text-to-Speech REST API:
//! - URL: `https://{region}.tts.speech.microsoft.com/cognitiveservices/v1`
//! - Authentication: `Ocp-Apim-Subscription-Key` header
//! - Content-Type: `application/ssml+xml`
//! - Output format: `X-Microsoft-OutputFormat` header
//!
//! The whole response body is returned as a single clip. HTTP statuses are
//! mapped onto [`TTSError`] so the playback controller can tell a revoked key or
//! throttling apart from a transient transport failure.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::StatusCode;
use tracing::{debug, error};

use super::config::{AZURE_OUTPUT_FORMAT_HEADER, AzureTTSConfig, build_ssml};
use crate::core::providers::azure::{
    AZURE_SUBSCRIPTION_KEY_HEADER, build_subscription_key_header, mask_subscription_key,
};
use crate::core::tts::base::{SynthesisClient, SynthesisRequest, TTSError, TTSResult};

/// User-Agent header value for Azure TTS requests.
const USER_AGENT: &str = "narrator";

/// Azure Text-to-Speech implementation of [`SynthesisClient`].
#[derive(Clone)]
pub struct AzureSynthesisClient {
    client: reqwest::Client,
    config: AzureTTSConfig,
}

impl AzureSynthesisClient {
    /// Creates a client with its own connection pool.
    pub fn new(config: AzureTTSConfig) -> TTSResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| TTSError::InternalError(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    /// Creates a client that reuses an existing `reqwest::Client`.
    pub fn with_client(client: reqwest::Client, config: AzureTTSConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &AzureTTSConfig {
        &self.config
    }

    fn build_http_request(&self, request: &SynthesisRequest) -> reqwest::RequestBuilder {
        let url = self.config.synthesis_url(&request.region);
        let ssml_body = build_ssml(&request.text, &request.voice, Some(request.rate));

        self.client
            .post(&url)
            .header(
                AZURE_SUBSCRIPTION_KEY_HEADER,
                build_subscription_key_header(&request.speech_key),
            )
            .header("Content-Type", "application/ssml+xml")
            .header(AZURE_OUTPUT_FORMAT_HEADER, self.config.output_format.as_str())
            .header("User-Agent", USER_AGENT)
            .body(ssml_body)
    }
}

/// Maps a non-success status to the matching error variant.
fn error_for_status(status: StatusCode, body: &str) -> TTSError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            TTSError::Unauthorized(format!("API error ({status}): {body}"))
        }
        StatusCode::TOO_MANY_REQUESTS => {
            TTSError::RateLimited(format!("API error ({status}): {body}"))
        }
        StatusCode::BAD_REQUEST => {
            TTSError::InvalidConfiguration(format!("API error ({status}): {body}"))
        }
        _ => TTSError::ProviderError(format!("API error ({status}): {body}")),
    }
}

#[async_trait]
impl SynthesisClient for AzureSynthesisClient {
    async fn synthesize(&self, request: &SynthesisRequest) -> TTSResult<Bytes> {
        if request.speech_key.trim().is_empty() {
            return Err(TTSError::InvalidConfiguration(
                "Azure subscription key is empty".to_string(),
            ));
        }
        if request.region.trim().is_empty() {
            return Err(TTSError::InvalidConfiguration(
                "Azure region is empty".to_string(),
            ));
        }

        debug!(
            region = %request.region,
            voice = %request.voice,
            rate = request.rate,
            key = %mask_subscription_key(&request.speech_key),
            chars = request.text.len(),
            "Azure synthesis request"
        );

        let response = self.build_http_request(request).send().await.map_err(|e| {
            if e.is_timeout() {
                TTSError::TimeoutError(format!("Request timed out: {e}"))
            } else {
                TTSError::NetworkError(format!("Request failed: {e}"))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!("TTS API error ({}): {}", status, error_body);
            return Err(error_for_status(status, &error_body));
        }

        let audio = response.bytes().await.map_err(|e| {
            TTSError::AudioGenerationFailed(format!("Failed to read audio: {e}"))
        })?;

        if audio.is_empty() {
            return Err(TTSError::AudioGenerationFailed(
                "Provider returned an empty audio body".to_string(),
            ));
        }

        debug!("Azure synthesis returned {} bytes", audio.len());
        Ok(audio)
    }

    fn name(&self) -> &str {
        "azure"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> SynthesisRequest {
        SynthesisRequest {
            text: "It was a dark & stormy night.".to_string(),
            voice: "en-US-JennyNeural".to_string(),
            rate: 1.2,
            speech_key: " test-key ".to_string(),
            region: "westeurope".to_string(),
        }
    }

    #[test]
    fn test_build_http_request_headers_and_url() {
        let client = AzureSynthesisClient::new(AzureTTSConfig::default()).unwrap();
        let built = client.build_http_request(&request()).build().unwrap();

        assert_eq!(
            built.url().as_str(),
            "https://westeurope.tts.speech.microsoft.com/cognitiveservices/v1"
        );
        assert_eq!(built.method(), reqwest::Method::POST);

        let headers = built.headers();
        assert_eq!(
            headers.get(AZURE_SUBSCRIPTION_KEY_HEADER).unwrap(),
            "test-key"
        );
        assert_eq!(
            headers.get("Content-Type").unwrap(),
            "application/ssml+xml"
        );
        assert_eq!(
            headers.get(AZURE_OUTPUT_FORMAT_HEADER).unwrap(),
            "audio-24khz-96kbitrate-mono-mp3"
        );

        let body = std::str::from_utf8(built.body().unwrap().as_bytes().unwrap()).unwrap();
        assert!(body.contains("dark &amp; stormy"));
        assert!(body.contains("rate=\"120%\""));
    }

    #[test]
    fn test_error_for_status_mapping() {
        assert!(matches!(
            error_for_status(StatusCode::UNAUTHORIZED, ""),
            TTSError::Unauthorized(_)
        ));
        assert!(matches!(
            error_for_status(StatusCode::FORBIDDEN, ""),
            TTSError::Unauthorized(_)
        ));
        assert!(matches!(
            error_for_status(StatusCode::TOO_MANY_REQUESTS, ""),
            TTSError::RateLimited(_)
        ));
        assert!(matches!(
            error_for_status(StatusCode::BAD_REQUEST, ""),
            TTSError::InvalidConfiguration(_)
        ));
        assert!(matches!(
            error_for_status(StatusCode::BAD_GATEWAY, ""),
            TTSError::ProviderError(_)
        ));
    }

    #[tokio::test]
    async fn test_synthesize_rejects_empty_key() {
        let client = AzureSynthesisClient::new(AzureTTSConfig::default()).unwrap();
        let request = SynthesisRequest {
            speech_key: "   ".to_string(),
            ..request()
        };
        let result = client.synthesize(&request).await;
        assert!(matches!(result, Err(TTSError::InvalidConfiguration(_))));
    }
}
