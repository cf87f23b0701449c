//! Запись и прослушивание голосовых заметок
//!
//! ```text
//!            start()            stop()
//!   Idle ───────────▶ Recording ───────▶ Stopped ◀──────────┐
//!    ▲                                   │  │  │            │ stop() /
//!    │          discard() / attach()     │  │  │ play()     │ playback_finished()
//!    └───────────────────────────────────┘  │  └──────▶ Playing
//! ```
//!
//! Every transition from an illegal state is an `AudioError::StateError`.
//! While recording, a [`TickSource`] adds one second per tick to the
//! elapsed duration. The tick subscription is held by the recording phase
//! itself, so leaving that phase in any way (stop, teardown, drop) cancels
//! it.

use crate::protocol::messages::AudioAttachment;
use crate::utils::error::AudioError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CaptureState {
    Idle,
    Recording,
    Stopped,
    Playing,
}

/// OS microphone permission prompt.
#[async_trait]
pub trait PermissionProvider: Send + Sync {
    async fn request_microphone_permission(&self) -> bool;
}

/// Filesystem collaborator that hands out a writable location for a new
/// recording. The returned URI is opaque to the core.
pub trait RecordingSink: Send + Sync {
    fn allocate(&self) -> anyhow::Result<String>;
}

pub type TickCallback = Arc<dyn Fn() + Send + Sync>;

/// Periodic tick source for the recording timer.
pub trait TickSource: Send + Sync {
    /// Starts calling `on_tick` once per tick until the guard is dropped.
    fn start(&self, on_tick: TickCallback) -> anyhow::Result<TickGuard>;
}

/// Cancels its tick subscription when dropped.
pub struct TickGuard {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl TickGuard {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }
}

impl Drop for TickGuard {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

/// Ticks from a tokio interval; the first tick fires one period after start.
#[derive(Debug, Clone, Copy)]
pub struct TokioTickSource {
    period: Duration,
}

impl TokioTickSource {
    pub fn new(period: Duration) -> Self {
        Self { period }
    }

    pub fn from_config() -> Self {
        Self::new(crate::config::Config::global().recording_tick())
    }
}

impl Default for TokioTickSource {
    fn default() -> Self {
        Self::from_config()
    }
}

impl TickSource for TokioTickSource {
    fn start(&self, on_tick: TickCallback) -> anyhow::Result<TickGuard> {
        let handle = tokio::runtime::Handle::try_current()?;
        let period = self.period;
        let task = handle.spawn(async move {
            let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            loop {
                interval.tick().await;
                on_tick();
            }
        });
        Ok(TickGuard::new(move || task.abort()))
    }
}

/// Tick source driven by hand, for hosts with their own timer and for
/// tests that must not sleep.
#[derive(Default, Clone)]
pub struct ManualTickSource {
    inner: Arc<Mutex<ManualTicks>>,
}

#[derive(Default)]
struct ManualTicks {
    next_id: u64,
    subscribers: HashMap<u64, TickCallback>,
}

impl ManualTickSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers one tick to every live subscription.
    pub fn tick(&self) {
        let callbacks: Vec<TickCallback> = self
            .inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .subscribers
            .values()
            .cloned()
            .collect();
        for callback in callbacks {
            callback();
        }
    }

    pub fn tick_n(&self, n: u64) {
        for _ in 0..n {
            self.tick();
        }
    }

    /// Subscriptions not yet cancelled.
    pub fn active_subscriptions(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .subscribers
            .len()
    }
}

impl TickSource for ManualTickSource {
    fn start(&self, on_tick: TickCallback) -> anyhow::Result<TickGuard> {
        let id = {
            let mut ticks = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            let id = ticks.next_id;
            ticks.next_id += 1;
            ticks.subscribers.insert(id, on_tick);
            id
        };
        let inner = Arc::clone(&self.inner);
        Ok(TickGuard::new(move || {
            inner
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .subscribers
                .remove(&id);
        }))
    }
}

/// A finished recording not yet attached or discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioDraft {
    pub uri: String,
    pub duration_seconds: u64,
}

struct RecordingSession {
    uri: String,
    elapsed: Arc<AtomicU64>,
    live: Arc<AtomicBool>,
    _ticker: TickGuard,
}

impl RecordingSession {
    fn finish(self) -> AudioDraft {
        self.live.store(false, Ordering::SeqCst);
        AudioDraft {
            duration_seconds: self.elapsed.load(Ordering::SeqCst),
            uri: self.uri,
        }
    }
}

enum Phase {
    Idle,
    Recording(RecordingSession),
    Stopped(AudioDraft),
    Playing(AudioDraft),
}

impl Phase {
    fn state(&self) -> CaptureState {
        match self {
            Phase::Idle => CaptureState::Idle,
            Phase::Recording(_) => CaptureState::Recording,
            Phase::Stopped(_) => CaptureState::Stopped,
            Phase::Playing(_) => CaptureState::Playing,
        }
    }
}

pub struct AudioCaptureStateMachine {
    permissions: Arc<dyn PermissionProvider>,
    sink: Arc<dyn RecordingSink>,
    ticks: Arc<dyn TickSource>,
    phase: Phase,
}

impl AudioCaptureStateMachine {
    pub fn new(
        permissions: Arc<dyn PermissionProvider>,
        sink: Arc<dyn RecordingSink>,
        ticks: Arc<dyn TickSource>,
    ) -> Self {
        Self {
            permissions,
            sink,
            ticks,
            phase: Phase::Idle,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.phase.state()
    }

    /// Seconds recorded so far, or the draft's length once stopped.
    pub fn elapsed_seconds(&self) -> u64 {
        match &self.phase {
            Phase::Idle => 0,
            Phase::Recording(session) => session.elapsed.load(Ordering::SeqCst),
            Phase::Stopped(draft) | Phase::Playing(draft) => draft.duration_seconds,
        }
    }

    pub fn draft(&self) -> Option<&AudioDraft> {
        match &self.phase {
            Phase::Stopped(draft) | Phase::Playing(draft) => Some(draft),
            _ => None,
        }
    }

    fn illegal(&self, operation: &'static str) -> AudioError {
        let state = self.state();
        warn!(operation, ?state, "illegal capture transition");
        AudioError::StateError { operation, state }
    }

    /// Idle → Recording. Nothing changes until permission is granted and a
    /// destination is allocated; if the permission prompt never resolves
    /// the machine simply stays `Idle`.
    pub async fn start(&mut self) -> Result<(), AudioError> {
        if self.state() != CaptureState::Idle {
            return Err(AudioError::AlreadyRecording(self.state()));
        }

        if !self.permissions.request_microphone_permission().await {
            warn!("microphone permission denied");
            return Err(AudioError::PermissionDenied);
        }

        let uri = self
            .sink
            .allocate()
            .map_err(|e| AudioError::RecordingUnavailable(e.to_string()))?;

        let elapsed = Arc::new(AtomicU64::new(0));
        let live = Arc::new(AtomicBool::new(true));
        let on_tick: TickCallback = {
            let elapsed = Arc::clone(&elapsed);
            let live = Arc::clone(&live);
            Arc::new(move || {
                if live.load(Ordering::SeqCst) {
                    elapsed.fetch_add(1, Ordering::SeqCst);
                }
            })
        };
        let ticker = self
            .ticks
            .start(on_tick)
            .map_err(|e| AudioError::RecordingUnavailable(e.to_string()))?;

        info!(%uri, "recording started");
        self.phase = Phase::Recording(RecordingSession {
            uri,
            elapsed,
            live,
            _ticker: ticker,
        });
        Ok(())
    }

    /// Recording → Stopped (timer cancelled), or Playing → Stopped.
    pub fn stop(&mut self) -> Result<(), AudioError> {
        match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Recording(session) => {
                let draft = session.finish();
                info!(duration_seconds = draft.duration_seconds, "recording stopped");
                self.phase = Phase::Stopped(draft);
                Ok(())
            }
            Phase::Playing(draft) => {
                debug!("playback stopped");
                self.phase = Phase::Stopped(draft);
                Ok(())
            }
            other => {
                self.phase = other;
                Err(self.illegal("stop"))
            }
        }
    }

    pub fn play(&mut self) -> Result<(), AudioError> {
        match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Stopped(draft) => {
                debug!(uri = %draft.uri, "playback started");
                self.phase = Phase::Playing(draft);
                Ok(())
            }
            other => {
                self.phase = other;
                Err(self.illegal("play"))
            }
        }
    }

    /// Player reached end of file.
    pub fn playback_finished(&mut self) -> Result<(), AudioError> {
        match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Playing(draft) => {
                debug!("playback finished");
                self.phase = Phase::Stopped(draft);
                Ok(())
            }
            other => {
                self.phase = other;
                Err(self.illegal("playback_finished"))
            }
        }
    }

    /// Stopped → Idle, dropping the draft.
    pub fn discard(&mut self) -> Result<(), AudioError> {
        match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Stopped(draft) => {
                info!(uri = %draft.uri, "recording discarded");
                Ok(())
            }
            other => {
                self.phase = other;
                Err(self.illegal("discard"))
            }
        }
    }

    /// Stopped → Idle, handing the draft over as an attachment.
    pub fn attach(&mut self) -> Result<AudioAttachment, AudioError> {
        match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Stopped(draft) => {
                info!(duration_seconds = draft.duration_seconds, "recording attached");
                Ok(AudioAttachment {
                    uri: draft.uri,
                    duration_seconds: draft.duration_seconds,
                })
            }
            other => {
                self.phase = other;
                Err(self.illegal("attach"))
            }
        }
    }

    /// Back to Idle from anywhere: cancels the timer and drops any draft.
    /// Used when the hosting screen goes away.
    pub fn teardown(&mut self) {
        let previous = std::mem::replace(&mut self.phase, Phase::Idle);
        if previous.state() != CaptureState::Idle {
            debug!(state = ?previous.state(), "capture torn down");
        }
        if let Phase::Recording(session) = previous {
            session.live.store(false, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Permission(bool);

    #[async_trait]
    impl PermissionProvider for Permission {
        async fn request_microphone_permission(&self) -> bool {
            self.0
        }
    }

    struct TempSink;

    impl RecordingSink for TempSink {
        fn allocate(&self) -> anyhow::Result<String> {
            Ok("file:///tmp/recording-1.m4a".to_string())
        }
    }

    struct FullDisk;

    impl RecordingSink for FullDisk {
        fn allocate(&self) -> anyhow::Result<String> {
            anyhow::bail!("no space left on device")
        }
    }

    fn machine(granted: bool, ticks: &ManualTickSource) -> AudioCaptureStateMachine {
        AudioCaptureStateMachine::new(
            Arc::new(Permission(granted)),
            Arc::new(TempSink),
            Arc::new(ticks.clone()),
        )
    }

    #[tokio::test]
    async fn test_record_stop_attach() {
        let ticks = ManualTickSource::new();
        let mut capture = machine(true, &ticks);

        capture.start().await.unwrap();
        assert_eq!(capture.state(), CaptureState::Recording);
        assert_eq!(ticks.active_subscriptions(), 1);

        ticks.tick_n(3);
        assert_eq!(capture.elapsed_seconds(), 3);

        capture.stop().unwrap();
        assert_eq!(capture.state(), CaptureState::Stopped);
        assert_eq!(ticks.active_subscriptions(), 0);

        // ticks after stop do not count
        ticks.tick_n(2);
        assert_eq!(capture.elapsed_seconds(), 3);

        let audio = capture.attach().unwrap();
        assert_eq!(capture.state(), CaptureState::Idle);
        assert_eq!(audio.duration_seconds, 3);
        assert_eq!(audio.uri, "file:///tmp/recording-1.m4a");
    }

    #[tokio::test]
    async fn test_permission_denied_stays_idle() {
        let ticks = ManualTickSource::new();
        let mut capture = machine(false, &ticks);

        assert_eq!(capture.start().await, Err(AudioError::PermissionDenied));
        assert_eq!(capture.state(), CaptureState::Idle);
        assert_eq!(ticks.active_subscriptions(), 0);
    }

    #[tokio::test]
    async fn test_sink_failure_stays_idle() {
        let ticks = ManualTickSource::new();
        let mut capture = AudioCaptureStateMachine::new(
            Arc::new(Permission(true)),
            Arc::new(FullDisk),
            Arc::new(ticks.clone()),
        );

        assert!(matches!(
            capture.start().await,
            Err(AudioError::RecordingUnavailable(_))
        ));
        assert_eq!(capture.state(), CaptureState::Idle);
    }

    #[tokio::test]
    async fn test_start_twice_is_already_recording() {
        let ticks = ManualTickSource::new();
        let mut capture = machine(true, &ticks);
        capture.start().await.unwrap();

        assert_eq!(
            capture.start().await,
            Err(AudioError::AlreadyRecording(CaptureState::Recording))
        );
        assert_eq!(ticks.active_subscriptions(), 1);

        capture.stop().unwrap();
        assert_eq!(
            capture.start().await,
            Err(AudioError::AlreadyRecording(CaptureState::Stopped))
        );
    }

    #[test]
    fn test_illegal_transitions_from_idle() {
        let ticks = ManualTickSource::new();
        let mut capture = machine(true, &ticks);

        for (result, operation) in [
            (capture.stop(), "stop"),
            (capture.play(), "play"),
            (capture.playback_finished(), "playback_finished"),
            (capture.discard(), "discard"),
        ] {
            assert_eq!(
                result,
                Err(AudioError::StateError {
                    operation,
                    state: CaptureState::Idle
                })
            );
        }
        assert!(capture.attach().is_err());
        assert_eq!(capture.state(), CaptureState::Idle);
    }

    #[tokio::test]
    async fn test_playback_cycle() {
        let ticks = ManualTickSource::new();
        let mut capture = machine(true, &ticks);
        capture.start().await.unwrap();
        ticks.tick_n(2);
        capture.stop().unwrap();

        capture.play().unwrap();
        assert_eq!(capture.state(), CaptureState::Playing);
        assert!(capture.attach().is_err());
        assert!(capture.discard().is_err());

        capture.playback_finished().unwrap();
        assert_eq!(capture.state(), CaptureState::Stopped);

        capture.play().unwrap();
        capture.stop().unwrap();
        assert_eq!(capture.draft().unwrap().duration_seconds, 2);

        capture.discard().unwrap();
        assert_eq!(capture.state(), CaptureState::Idle);
        assert!(capture.draft().is_none());
    }

    #[tokio::test]
    async fn test_teardown_and_drop_cancel_ticks() {
        let ticks = ManualTickSource::new();
        let mut capture = machine(true, &ticks);
        capture.start().await.unwrap();
        assert_eq!(ticks.active_subscriptions(), 1);

        capture.teardown();
        assert_eq!(capture.state(), CaptureState::Idle);
        assert_eq!(ticks.active_subscriptions(), 0);

        capture.start().await.unwrap();
        assert_eq!(ticks.active_subscriptions(), 1);
        drop(capture);
        assert_eq!(ticks.active_subscriptions(), 0);
    }
}
