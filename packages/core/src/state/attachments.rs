// Вложения, подготовленные к отправке

use crate::protocol::messages::{Attachment, AudioAttachment, DocumentAttachment, ImageAttachment};
use crate::protocol::validation::{limit_for, validate_document, validate_image};
use crate::utils::error::{AttachmentError, AttachmentKind};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Metadata returned by the OS image picker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PickedImage {
    pub uri: String,
    pub mime_type: String,
}

/// Metadata returned by the OS document picker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PickedDocument {
    pub uri: String,
    pub name: String,
    pub mime_type: String,
    pub size_bytes: u64,
}

/// Handle to one staged attachment, for removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentRef {
    /// Position among staged images
    Image(usize),
    Document,
    Audio,
}

/// Holds validated attachments until the next message is composed. Nothing
/// here is persisted; it lives only as long as the draft does.
#[derive(Debug, Default)]
pub struct AttachmentManager {
    images: Vec<ImageAttachment>,
    document: Option<DocumentAttachment>,
    audio: Option<AudioAttachment>,
}

impl AttachmentManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages a picker selection. All-or-nothing: if any image is invalid or
    /// the selection would push the staged count past the limit, nothing is
    /// staged.
    pub fn add_images(&mut self, selection: Vec<PickedImage>) -> Result<Vec<ImageAttachment>, AttachmentError> {
        let limit = limit_for(AttachmentKind::Image);
        let requested = self.images.len() + selection.len();
        if requested > limit {
            warn!(staged = self.images.len(), selected = selection.len(), limit, "image limit exceeded");
            return Err(AttachmentError::LimitExceeded {
                kind: AttachmentKind::Image,
                limit,
                requested,
            });
        }

        let images = selection
            .into_iter()
            .map(|picked| ImageAttachment {
                uri: picked.uri,
                mime_type: picked.mime_type,
            })
            .collect::<Vec<_>>();
        for image in &images {
            validate_image(image)?;
        }

        self.images.extend(images.iter().cloned());
        debug!(staged = self.images.len(), "images staged");
        Ok(images)
    }

    pub fn add_document(&mut self, doc: PickedDocument) -> Result<DocumentAttachment, AttachmentError> {
        let document = DocumentAttachment {
            uri: doc.uri,
            name: doc.name,
            mime_type: doc.mime_type,
            size_bytes: doc.size_bytes,
        };
        validate_document(&document)?;

        let limit = limit_for(AttachmentKind::Document);
        let requested = usize::from(self.document.is_some()) + 1;
        if requested > limit {
            return Err(AttachmentError::LimitExceeded {
                kind: AttachmentKind::Document,
                limit,
                requested,
            });
        }

        self.document = Some(document.clone());
        debug!(size_bytes = document.size_bytes, "document staged");
        Ok(document)
    }

    /// Stages a voice note produced by the capture state machine.
    pub fn stage_audio(&mut self, audio: AudioAttachment) -> Result<(), AttachmentError> {
        let limit = limit_for(AttachmentKind::Audio);
        let requested = usize::from(self.audio.is_some()) + 1;
        if requested > limit {
            return Err(AttachmentError::LimitExceeded {
                kind: AttachmentKind::Audio,
                limit,
                requested,
            });
        }
        debug!(duration_seconds = audio.duration_seconds, "audio note staged");
        self.audio = Some(audio);
        Ok(())
    }

    /// Destructive. The caller has already asked the user to confirm.
    pub fn remove_attachment(&mut self, target: AttachmentRef) -> Result<Attachment, AttachmentError> {
        let removed = match target {
            AttachmentRef::Image(index) => {
                if index >= self.images.len() {
                    return Err(AttachmentError::NotFound(format!("image #{}", index)));
                }
                Attachment::Image(self.images.remove(index))
            }
            AttachmentRef::Document => self
                .document
                .take()
                .map(Attachment::Document)
                .ok_or_else(|| AttachmentError::NotFound("document".to_string()))?,
            AttachmentRef::Audio => self
                .audio
                .take()
                .map(Attachment::Audio)
                .ok_or_else(|| AttachmentError::NotFound("audio note".to_string()))?,
        };
        debug!(kind = %removed.kind(), "attachment removed");
        Ok(removed)
    }

    /// Staged attachments in send order: images, then document, then audio.
    pub fn staged(&self) -> Vec<Attachment> {
        let mut staged: Vec<Attachment> = self.images.iter().cloned().map(Attachment::Image).collect();
        staged.extend(self.document.iter().cloned().map(Attachment::Document));
        staged.extend(self.audio.iter().cloned().map(Attachment::Audio));
        staged
    }

    /// Drains everything staged.
    pub fn take_staged(&mut self) -> Vec<Attachment> {
        let staged = self.staged();
        self.reset();
        staged
    }

    pub fn staged_count(&self) -> usize {
        self.images.len() + usize::from(self.document.is_some()) + usize::from(self.audio.is_some())
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.staged_count() == 0
    }

    pub fn reset(&mut self) {
        self.images.clear();
        self.document = None;
        self.audio = None;
    }
}
