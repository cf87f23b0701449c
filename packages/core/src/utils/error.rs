// Типы ошибок

use crate::error::CryptoError;
use crate::protocol::messages::{Channel, DeliveryStatus};
use crate::state::audio::CaptureState;
use thiserror::Error;

/// Which attachment slot a limit applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    Image,
    Document,
    Audio,
}

impl std::fmt::Display for AttachmentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AttachmentKind::Image => "image",
            AttachmentKind::Document => "document",
            AttachmentKind::Audio => "audio",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AttachmentError {
    #[error("Too many {kind} attachments: {requested} requested, limit is {limit}")]
    LimitExceeded {
        kind: AttachmentKind,
        limit: usize,
        requested: usize,
    },

    #[error("File too large: {size_bytes} bytes (max {max_bytes})")]
    FileTooLarge { size_bytes: u64, max_bytes: u64 },

    #[error("Unsupported attachment type: {0}")]
    UnsupportedType(String),

    #[error("Attachment not found: {0}")]
    NotFound(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AudioError {
    #[error("Capture already in progress ({0:?})")]
    AlreadyRecording(CaptureState),

    #[error("Microphone permission denied")]
    PermissionDenied,

    #[error("Cannot {operation} while {state:?}")]
    StateError {
        operation: &'static str,
        state: CaptureState,
    },

    #[error("Recording destination unavailable: {0}")]
    RecordingUnavailable(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Invalid delivery status transition: {from:?} -> {to:?}")]
    InvalidStateTransition {
        from: DeliveryStatus,
        to: DeliveryStatus,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Persistence error: {0}")]
    Persistence(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandoffError {
    #[error("No application available to open {0}")]
    NoHandler(String),

    #[error("Invalid hand-off target: {0}")]
    InvalidTarget(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ComposeError {
    #[error("Message has neither text nor attachments")]
    EmptyMessage,

    #[error("Message text too long: {length} characters (max {max})")]
    TextTooLong { length: usize, max: usize },

    #[error("No reachable recipient: {0}")]
    NoRecipient(String),

    #[error("Channel {0:?} cannot carry attachments")]
    AttachmentRejected(Channel),

    #[error(transparent)]
    InvalidAttachment(#[from] AttachmentError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Handoff(#[from] HandoffError),
}

/// Top-level error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Permission,
    State,
    Crypto,
    Handoff,
    Storage,
}

#[derive(Error, Debug)]
pub enum CoreError {
    #[error(transparent)]
    Attachment(#[from] AttachmentError),

    #[error(transparent)]
    Audio(#[from] AudioError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Handoff(#[from] HandoffError),

    #[error(transparent)]
    Compose(#[from] ComposeError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Attachment(_) => ErrorKind::Validation,
            CoreError::Audio(AudioError::PermissionDenied) => ErrorKind::Permission,
            CoreError::Audio(AudioError::RecordingUnavailable(_)) => ErrorKind::Storage,
            CoreError::Audio(_) => ErrorKind::State,
            CoreError::Store(StoreError::InvalidStateTransition { .. }) => ErrorKind::State,
            CoreError::Store(_) => ErrorKind::Storage,
            CoreError::Handoff(_) => ErrorKind::Handoff,
            CoreError::Crypto(_) => ErrorKind::Crypto,
            CoreError::Compose(err) => match err {
                ComposeError::EmptyMessage
                | ComposeError::TextTooLong { .. }
                | ComposeError::NoRecipient(_)
                | ComposeError::AttachmentRejected(_)
                | ComposeError::InvalidAttachment(_) => ErrorKind::Validation,
                ComposeError::Crypto(_) => ErrorKind::Crypto,
                ComposeError::Store(StoreError::InvalidStateTransition { .. }) => ErrorKind::State,
                ComposeError::Store(_) => ErrorKind::Storage,
                ComposeError::Handoff(_) => ErrorKind::Handoff,
            },
        }
    }

    /// Validation and state errors go back to the caller for correction;
    /// the rest abandon the operation without partial state.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Permission | ErrorKind::Handoff | ErrorKind::Crypto
        )
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
