//! Voice note capture driven by the tokio clock.

use async_trait::async_trait;
use schoolchat_core::state::{
    AttachmentManager, AudioCaptureStateMachine, CaptureState, PermissionProvider, RecordingSink,
    TokioTickSource,
};
use schoolchat_core::utils::error::{AudioError, CoreError, ErrorKind};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

struct Microphone {
    granted: bool,
    prompts: AtomicUsize,
}

impl Microphone {
    fn new(granted: bool) -> Arc<Self> {
        Arc::new(Self {
            granted,
            prompts: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl PermissionProvider for Microphone {
    async fn request_microphone_permission(&self) -> bool {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        // the OS prompt takes a moment
        tokio::time::sleep(Duration::from_millis(300)).await;
        self.granted
    }
}

struct Recordings {
    next: AtomicUsize,
}

impl RecordingSink for Recordings {
    fn allocate(&self) -> anyhow::Result<String> {
        let n = self.next.fetch_add(1, Ordering::SeqCst);
        Ok(format!("file:///data/recordings/note-{}.m4a", n))
    }
}

fn capture(mic: Arc<Microphone>) -> AudioCaptureStateMachine {
    AudioCaptureStateMachine::new(
        mic,
        Arc::new(Recordings {
            next: AtomicUsize::new(1),
        }),
        Arc::new(TokioTickSource::new(Duration::from_secs(1))),
    )
}

#[tokio::test(start_paused = true)]
async fn test_stop_in_idle_is_state_error() {
    let mut audio = capture(Microphone::new(true));
    let err = audio.stop().unwrap_err();
    assert_eq!(
        err,
        AudioError::StateError {
            operation: "stop",
            state: CaptureState::Idle
        }
    );
    assert_eq!(CoreError::from(err).kind(), ErrorKind::State);
}

#[tokio::test(start_paused = true)]
async fn test_duration_tracks_wall_time() {
    let mut audio = capture(Microphone::new(true));
    audio.start().await.unwrap();
    let started = tokio::time::Instant::now();

    tokio::time::sleep(Duration::from_millis(5_500)).await;
    audio.stop().unwrap();
    let wall = started.elapsed().as_secs();

    let note = audio.attach().unwrap();
    assert!(note.duration_seconds.abs_diff(wall) <= 1, "{} vs {}", note.duration_seconds, wall);
    assert_eq!(note.duration_seconds, 5);
    assert_eq!(audio.state(), CaptureState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_timer_stops_with_recording() {
    let mut audio = capture(Microphone::new(true));
    audio.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(2_500)).await;
    audio.stop().unwrap();

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(audio.elapsed_seconds(), 2);

    audio.play().unwrap();
    tokio::time::sleep(Duration::from_secs(3)).await;
    audio.playback_finished().unwrap();
    assert_eq!(audio.elapsed_seconds(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_denied_permission_keeps_idle() {
    let mic = Microphone::new(false);
    let mut audio = capture(mic.clone());

    assert_eq!(audio.start().await, Err(AudioError::PermissionDenied));
    assert_eq!(audio.state(), CaptureState::Idle);
    assert_eq!(mic.prompts.load(Ordering::SeqCst), 1);
    assert!(CoreError::from(AudioError::PermissionDenied).is_recoverable());
}

#[tokio::test(start_paused = true)]
async fn test_abandoned_permission_prompt_commits_nothing() {
    let mut audio = capture(Microphone::new(true));
    let pending = tokio::time::timeout(Duration::from_millis(100), audio.start()).await;
    assert!(pending.is_err());
    assert_eq!(audio.state(), CaptureState::Idle);

    audio.start().await.unwrap();
    assert_eq!(audio.state(), CaptureState::Recording);
}

#[tokio::test(start_paused = true)]
async fn test_second_start_rejected() {
    let mut audio = capture(Microphone::new(true));
    audio.start().await.unwrap();
    assert_eq!(
        audio.start().await,
        Err(AudioError::AlreadyRecording(CaptureState::Recording))
    );
}

#[tokio::test(start_paused = true)]
async fn test_attached_note_is_staged() {
    let mut audio = capture(Microphone::new(true));
    audio.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(3_200)).await;
    audio.stop().unwrap();

    let mut staged = AttachmentManager::new();
    staged.stage_audio(audio.attach().unwrap()).unwrap();
    assert_eq!(staged.staged_count(), 1);

    // a discarded draft never reaches the manager
    audio.start().await.unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    audio.stop().unwrap();
    audio.discard().unwrap();
    assert!(audio.attach().is_err());
    assert_eq!(staged.staged_count(), 1);
}
