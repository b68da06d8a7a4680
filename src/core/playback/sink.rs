//! Audio output seam.
//!
//! Decoding and mixing belong to the host; the controller only needs to hand
//! over a clip, learn when it finished, and interrupt it.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::Notify;
use tracing::{debug, info};

#[derive(Debug, thiserror::Error)]
pub enum AudioSinkError {
    #[error("Playback failed: {0}")]
    PlaybackFailed(String),
    #[error("Audio output error: {0}")]
    Io(#[from] std::io::Error),
}

/// Host audio primitive.
#[async_trait]
pub trait AudioSink: Send + Sync {
    /// Plays `audio` and resolves once it finished naturally.
    async fn play(&self, audio: Bytes) -> Result<(), AudioSinkError>;

    /// Interrupts the clip currently playing, if any.
    fn stop(&self);
}

/// Discards audio and completes immediately.
#[derive(Debug, Default)]
pub struct NullAudioSink;

#[async_trait]
impl AudioSink for NullAudioSink {
    async fn play(&self, _audio: Bytes) -> Result<(), AudioSinkError> {
        Ok(())
    }

    fn stop(&self) {}
}

/// Writes every clip to a directory, then waits for the clip's approximate
/// duration so navigation commands have something to interrupt.
pub struct FileAudioSink {
    dir: PathBuf,
    extension: String,
    bits_per_second: Option<u32>,
    counter: AtomicU64,
    interrupt: Notify,
}

impl FileAudioSink {
    pub fn new(dir: impl Into<PathBuf>, extension: impl Into<String>) -> std::io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            extension: extension.into(),
            bits_per_second: None,
            counter: AtomicU64::new(0),
            interrupt: Notify::new(),
        })
    }

    /// Paces playback as if the clip were encoded at `bits_per_second`.
    pub fn with_bitrate(mut self, bits_per_second: u32) -> Self {
        self.bits_per_second = Some(bits_per_second).filter(|b| *b > 0);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn clip_duration(&self, len: usize) -> Duration {
        match self.bits_per_second {
            Some(bps) => Duration::from_secs_f64(len as f64 * 8.0 / f64::from(bps)),
            None => Duration::ZERO,
        }
    }
}

#[async_trait]
impl AudioSink for FileAudioSink {
    async fn play(&self, audio: Bytes) -> Result<(), AudioSinkError> {
        let seq = self.counter.fetch_add(1, Ordering::Relaxed);
        let path = self.dir.join(format!("clip-{seq:04}.{}", self.extension));
        tokio::fs::write(&path, &audio).await?;
        info!("Playing {} ({} bytes)", path.display(), audio.len());

        let duration = self.clip_duration(audio.len());
        if !duration.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep(duration) => {}
                _ = self.interrupt.notified() => debug!("Clip {} interrupted", seq),
            }
        }
        Ok(())
    }

    fn stop(&self) {
        self.interrupt.notify_waiters();
    }
}
