//! # Playback Controller
//!
//! The narration state machine. It owns the [`PlaybackState`], runs a single
//! speak task that walks the paragraphs, and serializes every user command.
//!
//! Each command that moves the position or changes what the audio should
//! sound like first tears the speak task down (cancel, stop the sink, wait for
//! the task to exit) and clears the look-ahead buffer. Only then is the state
//! changed and, when narration was active, a fresh speak task started. A
//! superseded task therefore never touches the state or the sink again.
//!
//! ```rust,ignore
//! let controller = PlaybackController::new(source, synthesizer, sink, resolver, session, defaults);
//! let mut events = controller.subscribe();
//! controller.start("subscription-key", None, "en-US-JennyNeural").await?;
//! controller.jump_to(4).await?;
//! controller.pause().await;
//! ```

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::buffer::{BufferManager, SynthesisMode};
use super::errors::{PlaybackError, PlaybackResult};
use super::events::{FailureKind, PlaybackEvent};
use super::sink::AudioSink;
use super::source::ParagraphSource;
use super::state::{MAX_RATE, MIN_RATE, Paragraph, PlaybackState, PlaybackStatus};
use crate::core::region::{Diagnosis, RegionResolver};
use crate::core::store::{Bookmark, Preferences, SessionStore};
use crate::core::tts::{SynthesisClient, SynthesisRequest};

const EVENT_CAPACITY: usize = 64;

struct SpeakTask {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// State and collaborators shared with the speak task.
struct ControllerInner {
    state: Mutex<PlaybackState>,
    paragraphs: RwLock<Arc<Vec<Paragraph>>>,
    source: Arc<dyn ParagraphSource>,
    sink: Arc<dyn AudioSink>,
    buffer: BufferManager,
    resolver: RegionResolver,
    session: SessionStore,
    events: broadcast::Sender<PlaybackEvent>,
}

pub struct PlaybackController {
    inner: Arc<ControllerInner>,
    commands: tokio::sync::Mutex<()>,
    worker: Mutex<Option<SpeakTask>>,
    /// Cancels the region discovery of a pending `start`.
    discovery: Mutex<Option<CancellationToken>>,
}

impl PlaybackController {
    /// Loads the paragraphs from `source` and restores the stored bookmark and
    /// preferences. `defaults` applies when no preferences were stored.
    pub fn new(
        source: Arc<dyn ParagraphSource>,
        synthesizer: Arc<dyn SynthesisClient>,
        sink: Arc<dyn AudioSink>,
        resolver: RegionResolver,
        session: SessionStore,
        defaults: Preferences,
    ) -> Self {
        let preferences = session.preferences().unwrap_or(defaults);
        let mut state = PlaybackState::new(preferences.voice, preferences.rate);

        let paragraphs = source.paragraphs();
        if let Some(first) = paragraphs.first() {
            state.current_id = Some(first.id.clone());
        }
        if let Some(bookmark) = session.bookmark()
            && let Some(index) = locate(
                &paragraphs,
                bookmark.paragraph_id.as_deref(),
                bookmark.paragraph_index,
            )
        {
            info!("Restored bookmark at paragraph {}", index);
            state.current_index = index;
            state.current_id = Some(paragraphs[index].id.clone());
            state.status = PlaybackStatus::Paused;
        }

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(ControllerInner {
                state: Mutex::new(state),
                paragraphs: RwLock::new(Arc::new(paragraphs)),
                source,
                sink,
                buffer: BufferManager::new(synthesizer),
                resolver,
                session,
                events,
            }),
            commands: tokio::sync::Mutex::new(()),
            worker: Mutex::new(None),
            discovery: Mutex::new(None),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.inner.events.subscribe()
    }

    pub fn snapshot(&self) -> PlaybackState {
        self.inner.state.lock().clone()
    }

    pub fn status(&self) -> PlaybackStatus {
        self.inner.state.lock().status
    }

    pub fn paragraphs(&self) -> Arc<Vec<Paragraph>> {
        self.inner.paragraphs()
    }

    pub fn paragraph_count(&self) -> usize {
        self.inner.paragraphs.read().len()
    }

    pub fn buffer(&self) -> &BufferManager {
        &self.inner.buffer
    }

    /// Starts narrating from the current position.
    ///
    /// The region is resolved unless this key already has one in the current
    /// session; an explicit `region` always wins and is stored locked.
    /// Other commands are not blocked while the region is discovered, and
    /// `pause` or `stop` abandon the start with [`PlaybackError::Cancelled`].
    pub async fn start(
        &self,
        speech_key: &str,
        region: Option<&str>,
        voice: &str,
    ) -> PlaybackResult<()> {
        let speech_key = speech_key.trim();
        if speech_key.is_empty() {
            return Err(PlaybackError::MissingKey);
        }
        let mut guard = self.commands.lock().await;
        if self.inner.paragraphs().is_empty() {
            return Err(PlaybackError::EmptyDocument);
        }

        let explicit = region.map(str::trim).filter(|r| !r.is_empty());
        let known = {
            let state = self.inner.state.lock();
            if state.speech_key == speech_key {
                state.region.clone()
            } else {
                None
            }
        };

        let region = match (explicit, known) {
            (None, Some(region)) => region,
            (explicit, _) => {
                // Discovery can walk every candidate; other commands run meanwhile.
                let discovery = self.begin_discovery();
                drop(guard);
                let result = tokio::select! {
                    biased;
                    _ = discovery.cancelled() => None,
                    result = self.inner.resolver.resolve(speech_key, explicit) => Some(result),
                };
                guard = self.commands.lock().await;

                let result = match result {
                    Some(result) if !discovery.is_cancelled() => result,
                    _ => {
                        info!("Start cancelled during region discovery");
                        return Err(PlaybackError::Cancelled);
                    }
                };
                self.discovery.lock().take();

                match result.region {
                    Some(region) => {
                        info!("Using region {} ({})", region, result.reason);
                        region
                    }
                    None => {
                        warn!("Region resolution failed: {}", result.reason);
                        self.halt().await;
                        self.inner.transition(PlaybackStatus::Paused, |s| s.is_playing());
                        return Err(PlaybackError::RegionUnavailable(result.reason));
                    }
                }
            }
        };

        if self.inner.paragraphs().is_empty() {
            return Err(PlaybackError::EmptyDocument);
        }
        self.halt().await;

        let index = {
            let mut state = self.inner.state.lock();
            state.speech_key = speech_key.to_string();
            state.region = Some(region);
            if !voice.trim().is_empty() {
                state.voice = voice.trim().to_string();
            }
            state.current_index
        };
        self.inner.save_preferences();
        self.inner.transition(PlaybackStatus::Playing, |_| true);
        self.spawn_speaker(index);
        drop(guard);
        Ok(())
    }

    /// Stops audio and remembers the position. Safe to call in any state.
    pub async fn pause(&self) {
        self.cancel_discovery();
        let _guard = self.commands.lock().await;
        self.halt().await;
        self.inner.persist_position();
        self.inner
            .transition(PlaybackStatus::Paused, PlaybackState::is_playing);
    }

    /// Continues from the paused position without resolving the region again.
    pub async fn resume(&self) -> PlaybackResult<()> {
        let _guard = self.commands.lock().await;
        let paragraphs = self.inner.paragraphs();
        if paragraphs.is_empty() {
            return Err(PlaybackError::EmptyDocument);
        }
        {
            let state = self.inner.state.lock();
            if state.is_playing() {
                return Ok(());
            }
            if state.credentials().is_none() {
                return Err(PlaybackError::NotStarted);
            }
        }

        // The buffer may already hold the paused paragraph.
        self.stop_worker().await;

        let index = {
            let state = self.inner.state.lock();
            locate(&paragraphs, state.current_id.as_deref(), state.current_index).unwrap_or(0)
        };
        self.inner.set_position(&paragraphs, index);
        self.inner.transition(PlaybackStatus::Playing, |_| true);
        self.spawn_speaker(index);
        Ok(())
    }

    /// Moves to the following paragraph, wrapping to the first.
    pub async fn next(&self) -> PlaybackResult<()> {
        self.move_to(|current, count| Ok((current + 1) % count))
            .await
    }

    /// Moves to the preceding paragraph, wrapping to the last.
    pub async fn prev(&self) -> PlaybackResult<()> {
        self.move_to(|current, count| Ok((current + count - 1) % count))
            .await
    }

    /// Moves to paragraph `n`, counted from 1.
    pub async fn jump_to(&self, n: usize) -> PlaybackResult<()> {
        self.move_to(|_, count| {
            if (1..=count).contains(&n) {
                Ok(n - 1)
            } else {
                Err(PlaybackError::InvalidPosition {
                    requested: n,
                    count,
                })
            }
        })
        .await
    }

    /// Back to the first paragraph; keeps narrating if it was.
    pub async fn restart(&self) -> PlaybackResult<()> {
        self.move_to(|_, _| Ok(0)).await
    }

    pub async fn set_rate(&self, rate: f32) -> PlaybackResult<()> {
        if !rate.is_finite() || !(MIN_RATE..=MAX_RATE).contains(&rate) {
            return Err(PlaybackError::InvalidRate(rate));
        }
        let _guard = self.commands.lock().await;
        self.inner.state.lock().rate = rate;
        debug!("Rate set to {}", rate);
        self.inner.save_preferences();
        self.refresh_audio().await;
        Ok(())
    }

    pub async fn set_voice(&self, voice: &str) -> PlaybackResult<()> {
        let voice = voice.trim();
        if voice.is_empty() {
            return Err(PlaybackError::InvalidVoice);
        }
        let _guard = self.commands.lock().await;
        self.inner.state.lock().voice = voice.to_string();
        debug!("Voice set to {}", voice);
        self.inner.save_preferences();
        self.refresh_audio().await;
        Ok(())
    }

    /// Halts narration, forgets the bookmark and returns to the first paragraph.
    pub async fn stop(&self) {
        self.cancel_discovery();
        let _guard = self.commands.lock().await;
        self.halt().await;
        let paragraphs = self.inner.paragraphs();
        self.inner.set_position(&paragraphs, 0);
        self.inner.session.clear_bookmark();
        self.inner.transition(PlaybackStatus::Idle, |_| true);
    }

    /// Re-reads the document, keeping the position on the same paragraph id
    /// when it still exists.
    pub async fn reload_paragraphs(&self) {
        let _guard = self.commands.lock().await;
        let was_playing = self.inner.state.lock().is_playing();
        self.halt().await;

        let paragraphs = Arc::new(self.inner.source.paragraphs());
        *self.inner.paragraphs.write() = paragraphs.clone();
        info!("Reloaded {} paragraphs", paragraphs.len());

        if paragraphs.is_empty() {
            {
                let mut state = self.inner.state.lock();
                state.current_index = 0;
                state.current_id = None;
            }
            self.inner.transition(PlaybackStatus::Idle, |_| true);
            return;
        }

        let index = {
            let state = self.inner.state.lock();
            locate(&paragraphs, state.current_id.as_deref(), state.current_index)
                .unwrap_or(paragraphs.len() - 1)
        };
        self.inner.set_position(&paragraphs, index);
        self.inner.persist_position();
        if was_playing {
            self.spawn_speaker(index);
        } else {
            self.inner.emit_position();
        }
    }

    async fn move_to(
        &self,
        target: impl Fn(usize, usize) -> PlaybackResult<usize>,
    ) -> PlaybackResult<()> {
        let _guard = self.commands.lock().await;
        let paragraphs = self.inner.paragraphs();
        if paragraphs.is_empty() {
            return Err(PlaybackError::EmptyDocument);
        }
        let current = self.inner.state.lock().current_index;
        target(current, paragraphs.len())?;

        // The speak task can finish the document before it is halted.
        self.halt().await;
        let (current, was_playing) = {
            let state = self.inner.state.lock();
            (state.current_index, state.is_playing())
        };
        let index = target(current, paragraphs.len())?;
        self.inner.set_position(&paragraphs, index);
        self.inner.persist_position();
        debug!("Moved from paragraph {} to {}", current, index);

        if was_playing {
            self.spawn_speaker(index);
        } else {
            self.inner.emit_position();
        }
        Ok(())
    }

    /// Makes a voice or rate change audible without moving.
    async fn refresh_audio(&self) {
        let paragraphs = self.inner.paragraphs();
        self.halt().await;
        let (was_playing, index) = {
            let state = self.inner.state.lock();
            (state.is_playing(), state.current_index)
        };
        if paragraphs.is_empty() {
            return;
        }
        if was_playing {
            self.spawn_speaker(index);
        } else if let Some((target, request)) = self.inner.next_request(&paragraphs, index) {
            self.inner.look_ahead(target, request).await;
        }
    }

    /// Cancels the speak task, stops the sink and waits for the task to exit.
    async fn stop_worker(&self) {
        let task = self.worker.lock().take();
        match task {
            Some(task) => {
                task.token.cancel();
                self.inner.sink.stop();
                if let Err(e) = task.handle.await
                    && e.is_panic()
                {
                    error!("Speak task panicked: {}", e);
                }
            }
            None => self.inner.sink.stop(),
        }
    }

    fn begin_discovery(&self) -> CancellationToken {
        let token = CancellationToken::new();
        if let Some(previous) = self.discovery.lock().replace(token.clone()) {
            previous.cancel();
        }
        token
    }

    fn cancel_discovery(&self) {
        if let Some(token) = self.discovery.lock().take() {
            token.cancel();
        }
    }

    async fn halt(&self) {
        self.stop_worker().await;
        self.inner.buffer.clear();
    }

    fn spawn_speaker(&self, from: usize) {
        let token = CancellationToken::new();
        let handle = tokio::spawn(speak_loop(self.inner.clone(), from, token.clone()));
        *self.worker.lock() = Some(SpeakTask { token, handle });
    }
}

impl Drop for PlaybackController {
    fn drop(&mut self) {
        self.cancel_discovery();
        if let Some(task) = self.worker.lock().take() {
            task.token.cancel();
            task.handle.abort();
        }
    }
}

impl ControllerInner {
    fn paragraphs(&self) -> Arc<Vec<Paragraph>> {
        self.paragraphs.read().clone()
    }

    fn emit(&self, event: PlaybackEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn emit_position(&self) {
        let (index, id) = {
            let state = self.state.lock();
            (state.current_index, state.current_id.clone())
        };
        self.emit(PlaybackEvent::PositionChanged { index, id });
    }

    /// Sets `status` when `when` holds for the current state; emits on change.
    fn transition(&self, status: PlaybackStatus, when: impl FnOnce(&PlaybackState) -> bool) {
        let changed = {
            let mut state = self.state.lock();
            if state.status != status && when(&state) {
                debug!("Status {} -> {}", state.status, status);
                state.status = status;
                true
            } else {
                false
            }
        };
        if changed {
            self.emit(PlaybackEvent::StatusChanged { status });
        }
    }

    fn set_position(&self, paragraphs: &[Paragraph], index: usize) {
        let mut state = self.state.lock();
        state.current_index = index;
        state.current_id = paragraphs.get(index).map(|p| p.id.clone());
    }

    fn persist_position(&self) {
        let bookmark = {
            let state = self.state.lock();
            if state.current_id.is_none() {
                return;
            }
            Bookmark {
                paragraph_id: state.current_id.clone(),
                paragraph_index: state.current_index,
            }
        };
        self.session.save_bookmark(&bookmark);
    }

    fn save_preferences(&self) {
        let preferences = {
            let state = self.state.lock();
            Preferences {
                voice: state.voice.clone(),
                rate: state.rate,
            }
        };
        self.session.save_preferences(&preferences);
    }

    fn request_for(&self, text: String) -> Option<SynthesisRequest> {
        let state = self.state.lock();
        let (speech_key, region) = state.credentials()?;
        Some(SynthesisRequest {
            text,
            voice: state.voice.clone(),
            rate: state.rate,
            speech_key,
            region,
        })
    }

    /// Request for the first paragraph at or after `from` that has something to say.
    fn next_request(&self, paragraphs: &[Paragraph], from: usize) -> Option<(usize, SynthesisRequest)> {
        let (index, text) = paragraphs.iter().skip(from).find_map(|p| {
            let text = self.source.plain_text(p);
            (!text.is_empty()).then_some((p.index, text))
        })?;
        self.request_for(text).map(|request| (index, request))
    }

    async fn look_ahead(&self, index: usize, request: SynthesisRequest) {
        if let Err(e) = self
            .buffer
            .synthesize(index, request, SynthesisMode::LookAhead)
            .await
        {
            debug!("Look-ahead for paragraph {} not scheduled: {}", index, e);
        }
    }

    /// End of document: back to the top, bookmark cleared.
    fn finish(&self, paragraphs: &[Paragraph]) {
        info!("Finished narrating {} paragraphs", paragraphs.len());
        self.set_position(paragraphs, 0);
        self.session.clear_bookmark();
        self.transition(PlaybackStatus::Idle, |_| true);
        self.emit(PlaybackEvent::Finished);
    }

    /// Classifies a mid-playback failure with a re-probe, then pauses.
    async fn fail(&self, token: &CancellationToken, cause: String) {
        warn!("Narration failed: {}", cause);
        let credentials = self.state.lock().credentials();

        let (kind, message) = match credentials {
            Some((speech_key, region)) => {
                let diagnosis = tokio::select! {
                    biased;
                    _ = token.cancelled() => return,
                    diagnosis = self.resolver.diagnose(&speech_key, &region) => diagnosis,
                };
                match diagnosis {
                    Diagnosis::Transient => (
                        FailureKind::Connectivity,
                        format!("Connection problem while narrating: {cause}"),
                    ),
                    Diagnosis::StaleRegion {
                        region,
                        locked: true,
                    } => (
                        FailureKind::StaleConfiguration,
                        format!(
                            "Region {region} no longer accepts this key; clear or re-enter the region"
                        ),
                    ),
                    Diagnosis::StaleRegion {
                        region,
                        locked: false,
                    } => {
                        self.state.lock().region = None;
                        (
                            FailureKind::StaleConfiguration,
                            format!(
                                "Region {region} no longer accepts this key; it will be discovered again on the next start"
                            ),
                        )
                    }
                }
            }
            None => (FailureKind::StaleConfiguration, cause),
        };

        if token.is_cancelled() {
            return;
        }
        self.persist_position();
        self.transition(PlaybackStatus::Paused, |_| true);
        self.emit(PlaybackEvent::Failed { kind, message });
    }
}

/// Speaks paragraphs from `from` until the end, a failure or cancellation.
async fn speak_loop(inner: Arc<ControllerInner>, from: usize, token: CancellationToken) {
    let paragraphs = inner.paragraphs();
    let mut index = from;

    loop {
        if token.is_cancelled() || !inner.state.lock().is_playing() {
            return;
        }
        let Some(paragraph) = paragraphs.get(index) else {
            inner.finish(&paragraphs);
            return;
        };

        let text = inner.source.plain_text(paragraph);
        if text.is_empty() {
            debug!("Skipping silent paragraph {}", index);
            index += 1;
            continue;
        }

        inner.set_position(&paragraphs, index);
        inner.persist_position();
        inner.emit(PlaybackEvent::ParagraphStarted {
            index,
            id: paragraph.id.clone(),
        });

        let Some(request) = inner.request_for(text) else {
            inner.fail(&token, "No region resolved for this key".to_string()).await;
            return;
        };

        let audio = match inner.buffer.take(index, request.fingerprint()) {
            Some(audio) => audio,
            None => {
                let result = tokio::select! {
                    biased;
                    _ = token.cancelled() => return,
                    result = inner.buffer.synthesize(index, request, SynthesisMode::Blocking) => result,
                };
                match result {
                    Ok(Some(audio)) => audio,
                    Ok(None) => {
                        inner
                            .fail(&token, format!("No audio produced for paragraph {index}"))
                            .await;
                        return;
                    }
                    Err(e) => {
                        inner.fail(&token, e.to_string()).await;
                        return;
                    }
                }
            }
        };

        if let Some((next, request)) = inner.next_request(&paragraphs, index + 1) {
            inner.look_ahead(next, request).await;
        }

        let played = tokio::select! {
            biased;
            _ = token.cancelled() => return,
            played = inner.sink.play(audio) => played,
        };
        if let Err(e) = played {
            inner.fail(&token, e.to_string()).await;
            return;
        }
        index += 1;
    }
}

/// Position of the paragraph with `id`, else `index` when it is in range.
fn locate(paragraphs: &[Paragraph], id: Option<&str>, index: usize) -> Option<usize> {
    id.and_then(|id| paragraphs.iter().position(|p| p.id == id))
        .or_else(|| (index < paragraphs.len()).then_some(index))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paragraphs(n: usize) -> Vec<Paragraph> {
        (0..n)
            .map(|index| Paragraph {
                index,
                id: format!("p-{index}"),
                text: format!("Paragraph {index}."),
            })
            .collect()
    }

    #[test]
    fn test_locate_prefers_id() {
        let list = paragraphs(4);
        assert_eq!(locate(&list, Some("p-2"), 0), Some(2));
        assert_eq!(locate(&list, Some("missing"), 3), Some(3));
        assert_eq!(locate(&list, None, 1), Some(1));
        assert_eq!(locate(&list, Some("missing"), 9), None);
        assert_eq!(locate(&[], None, 0), None);
    }
}
