//! Error types for playback commands

use crate::core::region::ProbeReason;

/// Errors returned synchronously by controller commands.
///
/// Failures that happen while narrating in the background are reported as
/// [`super::PlaybackEvent::Failed`] instead.
#[derive(Debug, thiserror::Error)]
pub enum PlaybackError {
    #[error("Missing subscription key")]
    MissingKey,
    #[error("Document has no paragraphs")]
    EmptyDocument,
    #[error("Paragraph {requested} is out of range (1..={count})")]
    InvalidPosition { requested: usize, count: usize },
    #[error("Rate {0} is outside the supported range")]
    InvalidRate(f32),
    #[error("Voice name must not be empty")]
    InvalidVoice,
    #[error("No usable region for this key ({0})")]
    RegionUnavailable(ProbeReason),
    #[error("Playback has not been started")]
    NotStarted,
    #[error("Start was cancelled before a region was found")]
    Cancelled,
}

/// Result type for playback commands
pub type PlaybackResult<T> = Result<T, PlaybackError>;
