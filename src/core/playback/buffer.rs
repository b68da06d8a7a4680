//! Single-slot look-ahead buffer.
//!
//! Holds at most one synthesized clip for the paragraph expected to play next.
//! Every entry and every pending look-ahead carries the generation it was
//! started under; [`BufferManager::clear`] bumps the generation so work that
//! was already in flight can never land in the slot afterwards.

use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::core::tts::{SynthesisClient, SynthesisRequest, TTSResult};

/// How [`BufferManager::synthesize`] delivers its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthesisMode {
    /// Wait for the audio and hand it to the caller.
    Blocking,
    /// Synthesize in the background and keep the result for [`BufferManager::take`].
    LookAhead,
}

/// A synthesized clip waiting to be played.
#[derive(Debug, Clone)]
pub struct BufferEntry {
    pub index: usize,
    pub audio: Bytes,
    fingerprint: u128,
    generation: u64,
}

struct PendingLookAhead {
    index: usize,
    fingerprint: u128,
    ticket: u64,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct BufferSlot {
    generation: u64,
    next_ticket: u64,
    entry: Option<BufferEntry>,
    pending: Option<PendingLookAhead>,
}

pub struct BufferManager {
    client: Arc<dyn SynthesisClient>,
    slot: Arc<Mutex<BufferSlot>>,
}

impl BufferManager {
    pub fn new(client: Arc<dyn SynthesisClient>) -> Self {
        Self {
            client,
            slot: Arc::new(Mutex::new(BufferSlot::default())),
        }
    }

    /// Synthesizes audio for paragraph `index`.
    ///
    /// `Blocking` returns `Some(audio)`. `LookAhead` schedules background work
    /// and returns `None` immediately; errors from that work are dropped.
    pub async fn synthesize(
        &self,
        index: usize,
        request: SynthesisRequest,
        mode: SynthesisMode,
    ) -> TTSResult<Option<Bytes>> {
        match mode {
            SynthesisMode::Blocking => self.fetch(index, &request).await.map(Some),
            SynthesisMode::LookAhead => {
                self.prefetch(index, request);
                Ok(None)
            }
        }
    }

    /// Synthesizes `request` and waits for the audio. The slot is untouched.
    async fn fetch(&self, index: usize, request: &SynthesisRequest) -> TTSResult<Bytes> {
        debug!("Blocking synthesis for paragraph {}", index);
        self.client.synthesize(request).await
    }

    /// Starts a background synthesis for `index` unless the same request is
    /// already buffered or pending. Supersedes any other pending look-ahead.
    fn prefetch(&self, index: usize, request: SynthesisRequest) {
        let fingerprint = request.fingerprint();
        let mut slot = self.slot.lock();
        let generation = slot.generation;

        if slot
            .entry
            .as_ref()
            .is_some_and(|e| e.index == index && e.fingerprint == fingerprint)
        {
            debug!("Paragraph {} already buffered", index);
            return;
        }
        if let Some(pending) = &slot.pending {
            if pending.index == index
                && pending.fingerprint == fingerprint
                && !pending.handle.is_finished()
            {
                debug!("Paragraph {} already being prefetched", index);
                return;
            }
        }
        if let Some(previous) = slot.pending.take() {
            debug!("Look-ahead for paragraph {} superseded", previous.index);
            previous.handle.abort();
        }

        slot.next_ticket += 1;
        let ticket = slot.next_ticket;
        let client = self.client.clone();
        let shared = self.slot.clone();
        let handle = tokio::spawn(async move {
            let result = client.synthesize(&request).await;
            let mut slot = shared.lock();
            let current = slot.generation == generation
                && slot.pending.as_ref().is_some_and(|p| p.ticket == ticket);
            if !current {
                debug!("Dropping stale look-ahead for paragraph {}", index);
                return;
            }
            slot.pending = None;
            match result {
                Ok(audio) => {
                    debug!("Buffered paragraph {} ({} bytes)", index, audio.len());
                    slot.entry = Some(BufferEntry {
                        index,
                        audio,
                        fingerprint,
                        generation,
                    });
                }
                Err(e) => debug!("Look-ahead for paragraph {} failed: {}", index, e),
            }
        });

        slot.pending = Some(PendingLookAhead {
            index,
            fingerprint,
            ticket,
            handle,
        });
    }

    /// Removes and returns the buffered clip if it was produced for `index`
    /// under the request identified by `fingerprint`. A mismatching entry is
    /// discarded.
    pub fn take(&self, index: usize, fingerprint: u128) -> Option<Bytes> {
        let mut slot = self.slot.lock();
        let generation = slot.generation;
        let entry = slot.entry.take()?;
        if entry.index == index && entry.fingerprint == fingerprint && entry.generation == generation
        {
            debug!("Buffer hit for paragraph {}", index);
            Some(entry.audio)
        } else {
            debug!(
                "Discarding stale buffer entry for paragraph {} (wanted {})",
                entry.index, index
            );
            None
        }
    }

    /// Drops the buffered clip and cancels pending look-ahead work.
    pub fn clear(&self) {
        let mut slot = self.slot.lock();
        slot.generation += 1;
        slot.entry = None;
        if let Some(pending) = slot.pending.take() {
            debug!("Cancelling look-ahead for paragraph {}", pending.index);
            pending.handle.abort();
        }
    }

    /// Index of the buffered clip, if any.
    pub fn buffered_index(&self) -> Option<usize> {
        self.slot.lock().entry.as_ref().map(|e| e.index)
    }

    /// Index of the look-ahead still in flight, if any.
    pub fn pending_index(&self) -> Option<usize> {
        self.slot
            .lock()
            .pending
            .as_ref()
            .filter(|p| !p.handle.is_finished())
            .map(|p| p.index)
    }
}

impl Drop for BufferManager {
    fn drop(&mut self) {
        if let Some(pending) = self.slot.lock().pending.take() {
            pending.handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;

    use crate::core::tts::TTSError;

    /// Echoes the text back as audio; optionally waits for a release signal.
    struct EchoClient {
        calls: AtomicUsize,
        gate: Option<Arc<Notify>>,
        fail: bool,
    }

    impl EchoClient {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                gate: None,
                fail: false,
            })
        }

        fn gated(gate: Arc<Notify>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                gate: Some(gate),
                fail: false,
            })
        }
    }

    #[async_trait]
    impl SynthesisClient for EchoClient {
        async fn synthesize(&self, request: &SynthesisRequest) -> TTSResult<Bytes> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if self.fail {
                return Err(TTSError::ProviderError("boom".into()));
            }
            Ok(Bytes::from(request.text.clone()))
        }
    }

    fn request(text: &str) -> SynthesisRequest {
        SynthesisRequest {
            text: text.to_string(),
            voice: "en-US-JennyNeural".to_string(),
            rate: 1.0,
            speech_key: "key".to_string(),
            region: "eastus".to_string(),
        }
    }

    async fn settle(buffer: &BufferManager) {
        for _ in 0..100 {
            if buffer.pending_index().is_none() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    #[tokio::test]
    async fn test_blocking_returns_audio() {
        let client = EchoClient::new();
        let buffer = BufferManager::new(client.clone());
        let audio = buffer
            .synthesize(0, request("one"), SynthesisMode::Blocking)
            .await
            .unwrap();
        assert_eq!(audio, Some(Bytes::from("one")));
        assert_eq!(buffer.buffered_index(), None);
    }

    #[tokio::test]
    async fn test_look_ahead_then_take() {
        let client = EchoClient::new();
        let buffer = BufferManager::new(client.clone());
        let req = request("two");
        let fingerprint = req.fingerprint();

        let scheduled = buffer
            .synthesize(1, req, SynthesisMode::LookAhead)
            .await
            .unwrap();
        assert!(scheduled.is_none());
        settle(&buffer).await;

        assert_eq!(buffer.buffered_index(), Some(1));
        assert_eq!(buffer.take(1, fingerprint), Some(Bytes::from("two")));
        assert_eq!(buffer.take(1, fingerprint), None);
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_take_rejects_other_index_or_fingerprint() {
        let buffer = BufferManager::new(EchoClient::new());
        let req = request("three");
        let fingerprint = req.fingerprint();
        buffer.prefetch(2, req);
        settle(&buffer).await;

        assert_eq!(buffer.take(3, fingerprint), None);
        assert_eq!(buffer.buffered_index(), None);

        let req = request("three");
        buffer.prefetch(2, req);
        settle(&buffer).await;
        let mut faster = request("three");
        faster.rate = 1.5;
        assert_eq!(buffer.take(2, faster.fingerprint()), None);
    }

    #[tokio::test]
    async fn test_clear_discards_in_flight_result() {
        let gate = Arc::new(Notify::new());
        let client = EchoClient::gated(gate.clone());
        let buffer = BufferManager::new(client.clone());
        let req = request("four");
        let fingerprint = req.fingerprint();

        buffer.prefetch(4, req);
        tokio::task::yield_now().await;
        buffer.clear();
        gate.notify_waiters();
        tokio::time::sleep(Duration::from_millis(5)).await;

        assert_eq!(buffer.buffered_index(), None);
        assert_eq!(buffer.take(4, fingerprint), None);
    }

    #[tokio::test]
    async fn test_duplicate_prefetch_is_ignored() {
        let client = EchoClient::new();
        let buffer = BufferManager::new(client.clone());
        buffer.prefetch(5, request("five"));
        buffer.prefetch(5, request("five"));
        settle(&buffer).await;
        buffer.prefetch(5, request("five"));
        settle(&buffer).await;

        assert_eq!(client.calls.load(Ordering::SeqCst), 1);
        assert_eq!(buffer.buffered_index(), Some(5));
    }

    #[tokio::test]
    async fn test_newer_prefetch_supersedes_pending() {
        let gate = Arc::new(Notify::new());
        let client = EchoClient::gated(gate.clone());
        let buffer = BufferManager::new(client.clone());

        buffer.prefetch(1, request("old"));
        buffer.prefetch(7, request("new"));
        assert_eq!(buffer.pending_index(), Some(7));

        gate.notify_one();
        settle(&buffer).await;
        assert_eq!(buffer.buffered_index(), Some(7));
    }

    #[tokio::test]
    async fn test_failed_look_ahead_leaves_slot_empty() {
        let client = Arc::new(EchoClient {
            calls: AtomicUsize::new(0),
            gate: None,
            fail: true,
        });
        let buffer = BufferManager::new(client);
        buffer.prefetch(0, request("zero"));
        settle(&buffer).await;
        assert_eq!(buffer.buffered_index(), None);
        assert_eq!(buffer.pending_index(), None);
    }
}
