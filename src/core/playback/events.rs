//! Notifications published by the controller.

use serde::Serialize;

use super::state::PlaybackStatus;

/// Classification of a background narration failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The bound region still accepts the key; the network or service hiccuped.
    Connectivity,
    /// The bound region no longer accepts the key.
    StaleConfiguration,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlaybackEvent {
    StatusChanged {
        status: PlaybackStatus,
    },
    /// Position moved without speaking (navigation while paused).
    PositionChanged {
        index: usize,
        id: Option<String>,
    },
    /// Audio for this paragraph is about to play.
    ParagraphStarted {
        index: usize,
        id: String,
    },
    Failed {
        kind: FailureKind,
        message: String,
    },
    /// The last paragraph finished playing.
    Finished,
}
