//! Speech synthesis: the [`SynthesisClient`] seam and its Azure implementation.

pub mod azure;
mod base;

pub use azure::{AzureAudioEncoding, AzureSynthesisClient, AzureTTSConfig};
pub use base::{SynthesisClient, SynthesisRequest, TTSConfig, TTSError, TTSResult};
