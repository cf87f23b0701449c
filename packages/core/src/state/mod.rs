// Управление состоянием
// Беседы, вложения черновика, запись голосовых заметок

pub mod attachments;
pub mod audio;
pub mod conversations;

pub use attachments::{AttachmentManager, AttachmentRef, PickedDocument, PickedImage};
pub use audio::{
    AudioCaptureStateMachine, CaptureState, ManualTickSource, PermissionProvider, RecordingSink,
    TickSource, TokioTickSource,
};
pub use conversations::{ConversationState, ConversationStore, ConversationSummary};
