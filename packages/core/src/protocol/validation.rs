// Валидация исходящих данных

use crate::config::Config;
use crate::protocol::messages::{Attachment, DocumentAttachment, ImageAttachment};
use crate::utils::error::{AttachmentError, AttachmentKind, ComposeError};

/// Returns the trimmed text if it carries anything, `None` for empty or
/// whitespace-only input.
pub fn normalize_text(text: Option<&str>) -> Option<&str> {
    text.map(str::trim).filter(|t| !t.is_empty())
}

/// Длина считается в символах (Unicode scalar values), не в байтах.
pub fn validate_text(text: &str) -> Result<(), ComposeError> {
    let max = Config::global().max_text_length;
    let length = text.chars().count();
    if length > max {
        return Err(ComposeError::TextTooLong { length, max });
    }
    Ok(())
}

pub fn validate_image(image: &ImageAttachment) -> Result<(), AttachmentError> {
    if image.uri.trim().is_empty() {
        return Err(AttachmentError::UnsupportedType(
            "image without uri".to_string(),
        ));
    }
    let mime = image.mime_type.trim().to_ascii_lowercase();
    if !mime.starts_with("image/") {
        return Err(AttachmentError::UnsupportedType(image.mime_type.clone()));
    }
    Ok(())
}

/// Size is checked before type: an oversized file is rejected as too
/// large whatever its type.
pub fn validate_document(doc: &DocumentAttachment) -> Result<(), AttachmentError> {
    let cfg = Config::global();
    if doc.size_bytes > cfg.max_document_size_bytes {
        return Err(AttachmentError::FileTooLarge {
            size_bytes: doc.size_bytes,
            max_bytes: cfg.max_document_size_bytes,
        });
    }
    if !cfg.is_document_mime_allowed(&doc.mime_type) {
        return Err(AttachmentError::UnsupportedType(doc.mime_type.clone()));
    }
    Ok(())
}

pub fn limit_for(kind: AttachmentKind) -> usize {
    let cfg = Config::global();
    match kind {
        AttachmentKind::Image => cfg.max_images_per_message,
        AttachmentKind::Document => cfg.max_documents_per_message,
        AttachmentKind::Audio => cfg.max_audio_per_message,
    }
}

/// Checks a complete attachment set for one outgoing message.
pub fn validate_attachment_set(attachments: &[Attachment]) -> Result<(), AttachmentError> {
    for kind in [
        AttachmentKind::Image,
        AttachmentKind::Document,
        AttachmentKind::Audio,
    ] {
        let requested = attachments.iter().filter(|a| a.kind() == kind).count();
        let limit = limit_for(kind);
        if requested > limit {
            return Err(AttachmentError::LimitExceeded {
                kind,
                limit,
                requested,
            });
        }
    }

    for attachment in attachments {
        match attachment {
            Attachment::Image(img) => validate_image(img)?,
            Attachment::Document(doc) => validate_document(doc)?,
            Attachment::Audio(audio) => {
                if audio.uri.trim().is_empty() {
                    return Err(AttachmentError::UnsupportedType(
                        "audio note without uri".to_string(),
                    ));
                }
            }
        }
    }

    Ok(())
}
