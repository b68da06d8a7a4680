//! Playback state owned by the controller.

use serde::Serialize;
use std::fmt;

use crate::core::providers::azure::mask_subscription_key;

/// Slowest accepted speaking rate.
pub const MIN_RATE: f32 = 0.5;
/// Fastest accepted speaking rate.
pub const MAX_RATE: f32 = 2.0;

/// One narratable unit of the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Paragraph {
    pub index: usize,
    pub id: String,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackStatus {
    #[default]
    Idle,
    Playing,
    Paused,
}

impl PlaybackStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Playing => "playing",
            Self::Paused => "paused",
        }
    }
}

impl fmt::Display for PlaybackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Live session state.
///
/// `current_index` always addresses a loaded paragraph unless the document is
/// empty, in which case it is 0 and the status is [`PlaybackStatus::Idle`].
#[derive(Clone, PartialEq)]
pub struct PlaybackState {
    pub status: PlaybackStatus,
    pub current_index: usize,
    pub current_id: Option<String>,
    pub voice: String,
    pub rate: f32,
    pub speech_key: String,
    pub region: Option<String>,
}

impl PlaybackState {
    pub fn new(voice: impl Into<String>, rate: f32) -> Self {
        Self {
            status: PlaybackStatus::Idle,
            current_index: 0,
            current_id: None,
            voice: voice.into(),
            rate,
            speech_key: String::new(),
            region: None,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.status == PlaybackStatus::Playing
    }

    /// Key and region, when both are known.
    pub fn credentials(&self) -> Option<(String, String)> {
        match &self.region {
            Some(region) if !self.speech_key.is_empty() => {
                Some((self.speech_key.clone(), region.clone()))
            }
            _ => None,
        }
    }
}

impl fmt::Debug for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackState")
            .field("status", &self.status)
            .field("current_index", &self.current_index)
            .field("current_id", &self.current_id)
            .field("voice", &self.voice)
            .field("rate", &self.rate)
            .field("speech_key", &mask_subscription_key(&self.speech_key))
            .field("region", &self.region)
            .finish()
    }
}
