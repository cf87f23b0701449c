// Типы сообщений
// Модель беседы: каналы, вложения, статусы доставки

use crate::crypto::codec::Envelope;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Delivery path for a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    InApp,
    Sms,
    Call,
    Email,
}

impl Channel {
    /// Only the in-app transport can carry binary payloads.
    pub fn supports_attachments(self) -> bool {
        matches!(self, Channel::InApp)
    }

    /// Channels delivered by an external OS application.
    pub fn requires_handoff(self) -> bool {
        !matches!(self, Channel::InApp)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    /// The local user
    SelfUser,
    Contact,
}

/// Статус доставки
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Pending,   // Создано, но не отправлено
    Sent,      // Доставлено in-app транспортом
    HandedOff, // Передано внешнему приложению (SMS/звонок), исход неизвестен
    Failed,    // Ошибка или отмена отправки
}

impl DeliveryStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, DeliveryStatus::Pending)
    }

    /// Statuses only move forward, out of `Pending`.
    pub fn can_transition_to(self, next: DeliveryStatus) -> bool {
        self == DeliveryStatus::Pending && next != DeliveryStatus::Pending
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageAttachment {
    pub uri: String,
    pub mime_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentAttachment {
    pub uri: String,
    pub name: String,
    pub mime_type: String,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioAttachment {
    pub uri: String,
    pub duration_seconds: u64,
}

/// Binary payload staged for an outgoing message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Attachment {
    Image(ImageAttachment),
    Document(DocumentAttachment),
    Audio(AudioAttachment),
}

impl Attachment {
    pub fn kind(&self) -> crate::utils::error::AttachmentKind {
        use crate::utils::error::AttachmentKind;
        match self {
            Attachment::Image(_) => AttachmentKind::Image,
            Attachment::Document(_) => AttachmentKind::Document,
            Attachment::Audio(_) => AttachmentKind::Audio,
        }
    }

    pub fn uri(&self) -> &str {
        match self {
            Attachment::Image(img) => &img.uri,
            Attachment::Document(doc) => &doc.uri,
            Attachment::Audio(audio) => &audio.uri,
        }
    }
}

/// Message text as stored: plain, or an envelope from `EncryptionCodec`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "form", content = "value", rename_all = "snake_case")]
pub enum TextPayload {
    Plain(String),
    Encrypted(Envelope),
}

impl TextPayload {
    pub fn is_encrypted(&self) -> bool {
        matches!(self, TextPayload::Encrypted(_))
    }
}

/// One part of a message body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Payload {
    Text(TextPayload),
    Image(ImageAttachment),
    Document(DocumentAttachment),
    Audio(AudioAttachment),
}

impl From<Attachment> for Payload {
    fn from(attachment: Attachment) -> Self {
        match attachment {
            Attachment::Image(img) => Payload::Image(img),
            Attachment::Document(doc) => Payload::Document(doc),
            Attachment::Audio(audio) => Payload::Audio(audio),
        }
    }
}

/// Сообщение в беседе
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub sender: Sender,
    pub created_at: DateTime<Utc>,
    pub channel: Channel,
    pub encrypted: bool,
    /// Text part first, if any, then attachments in staging order
    pub payload: Vec<Payload>,
    pub delivery_status: DeliveryStatus,
}

impl Message {
    pub fn text(&self) -> Option<&TextPayload> {
        self.payload.iter().find_map(|p| match p {
            Payload::Text(text) => Some(text),
            _ => None,
        })
    }

    pub fn attachments(&self) -> impl Iterator<Item = &Payload> {
        self.payload.iter().filter(|p| !matches!(p, Payload::Text(_)))
    }

    pub fn has_attachments(&self) -> bool {
        self.attachments().next().is_some()
    }
}

/// Everything `ConversationStore::append` needs except id and timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageDraft {
    pub sender: Sender,
    pub channel: Channel,
    pub text: Option<TextPayload>,
    pub attachments: Vec<Attachment>,
    pub delivery_status: DeliveryStatus,
}

impl MessageDraft {
    pub fn outgoing(channel: Channel) -> Self {
        Self {
            sender: Sender::SelfUser,
            channel,
            text: None,
            attachments: Vec::new(),
            delivery_status: DeliveryStatus::Pending,
        }
    }

    /// Authored by the contact and already delivered.
    pub fn incoming(channel: Channel) -> Self {
        Self {
            sender: Sender::Contact,
            delivery_status: DeliveryStatus::Sent,
            ..Self::outgoing(channel)
        }
    }

    pub fn with_text(mut self, text: TextPayload) -> Self {
        self.text = Some(text);
        self
    }

    pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = attachments;
        self
    }

    pub fn with_status(mut self, status: DeliveryStatus) -> Self {
        self.delivery_status = status;
        self
    }

    pub fn from_contact(mut self) -> Self {
        self.sender = Sender::Contact;
        self
    }

    /// `encrypted` is derived from the text form, never set independently.
    pub fn into_message(self, id: String, conversation_id: String, created_at: DateTime<Utc>) -> Message {
        let encrypted = self.text.as_ref().map_or(false, TextPayload::is_encrypted);
        let mut payload = Vec::with_capacity(self.attachments.len() + 1);
        if let Some(text) = self.text {
            payload.push(Payload::Text(text));
        }
        payload.extend(self.attachments.into_iter().map(Payload::from));

        Message {
            id,
            conversation_id,
            sender: self.sender,
            created_at,
            channel: self.channel,
            encrypted,
            payload,
            delivery_status: self.delivery_status,
        }
    }
}

/// Instruction for the caller to open an external app. The core never
/// opens it itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandoffRequest {
    pub channel: Channel,
    /// Phone number or e-mail address
    pub target: String,
    pub body: Option<String>,
    /// Platform URI: `sms:`, `tel:` or `mailto:`
    pub uri: String,
}

/// How a stored text reads back for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextView {
    Readable(String),
    /// Envelope could not be opened; render a placeholder, not ciphertext
    Undecryptable,
}
