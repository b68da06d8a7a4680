//! # Playback
//!
//! Continuous paragraph narration: the [`PlaybackController`] state machine,
//! its single-slot look-ahead [`BufferManager`], and the seams to the host
//! ([`ParagraphSource`], [`AudioSink`]).

pub mod buffer;
pub mod controller;
pub mod errors;
pub mod events;
pub mod sink;
pub mod source;
pub mod state;

pub use buffer::{BufferEntry, BufferManager, SynthesisMode};
pub use controller::PlaybackController;
pub use errors::{PlaybackError, PlaybackResult};
pub use events::{FailureKind, PlaybackEvent};
pub use sink::{AudioSink, AudioSinkError, FileAudioSink, NullAudioSink};
pub use source::{ParagraphSource, TextParagraphSource, narration_text, split_paragraphs};
pub use state::{MAX_RATE, MIN_RATE, Paragraph, PlaybackState, PlaybackStatus};
