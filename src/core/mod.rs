pub mod playback;
pub mod providers;
pub mod region;
pub mod store;
pub mod tts;

// Re-export commonly used types for convenience
pub use playback::{
    AudioSink, BufferManager, FailureKind, Paragraph, ParagraphSource, PlaybackController,
    PlaybackError, PlaybackEvent, PlaybackResult, PlaybackState, PlaybackStatus,
    TextParagraphSource,
};
pub use region::{
    AzureRegionProber, Diagnosis, ProbeOutcome, ProbeReason, RegionProbeResult, RegionProber,
    RegionResolver, ResolverConfig,
};
pub use store::{
    Bookmark, FileResourceStore, MemoryResourceStore, Preferences, ResourceStore, SessionStore,
    StoreError, StoredCredentials,
};
pub use tts::{
    AzureSynthesisClient, SynthesisClient, SynthesisRequest, TTSConfig, TTSError, TTSResult,
};
