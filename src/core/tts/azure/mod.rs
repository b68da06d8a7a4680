//! Microsoft Azure Text-to-Speech provider.
//!
//! - **config**: output format selection and SSML generation
//! - **provider**: [`AzureSynthesisClient`], the REST implementation of
//!   [`SynthesisClient`](crate::core::tts::SynthesisClient)
//!
//! # Azure TTS API Reference
//!
//! - TTS endpoint: `https://{region}.tts.speech.microsoft.com/cognitiveservices/v1`
//! - Required headers: `Ocp-Apim-Subscription-Key`, `Content-Type: application/ssml+xml`,
//!   `X-Microsoft-OutputFormat`
//! - Documentation: <https://learn.microsoft.com/en-us/azure/ai-services/speech-service/rest-text-to-speech>

mod config;
mod provider;

pub use config::{
    AZURE_OUTPUT_FORMAT_HEADER, AzureAudioEncoding, AzureTTSConfig, DEFAULT_AZURE_VOICE,
    build_ssml, escape_xml, language_code_for_voice,
};
pub use provider::AzureSynthesisClient;
