// API для отправки и получения сообщений
//
// MessageComposer is the only entry point the chat screens use: it
// validates, routes, encrypts and appends, and for in-app messages spawns
// a cancellable delivery task.

use crate::api::channels::{ChannelRouter, HandoffDispatcher, Route};
use crate::api::contacts::ContactDirectory;
use crate::config::Config;
use crate::crypto::{EncryptionCodec, KeyProvider};
use crate::protocol::messages::{
    Attachment, Channel, DeliveryStatus, HandoffRequest, Message, MessageDraft, TextPayload,
    TextView,
};
use crate::protocol::transport::{MessageTransport, SimulatedTransport};
use crate::protocol::validation::{normalize_text, validate_attachment_set, validate_text};
use crate::state::attachments::AttachmentManager;
use crate::state::conversations::ConversationStore;
use crate::utils::error::ComposeError;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Explicit compose context; the composer keeps no notion of a
/// "currently selected" contact.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComposeRequest {
    pub conversation_id: String,
    pub text: Option<String>,
    pub attachments: Vec<Attachment>,
    pub channel_override: Option<Channel>,
}

impl ComposeRequest {
    pub fn new(conversation_id: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            ..Self::default()
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = attachments;
        self
    }

    pub fn via(mut self, channel: Channel) -> Self {
        self.channel_override = Some(channel);
        self
    }
}

/// Result of a successful compose.
#[derive(Debug)]
pub struct ComposeOutcome {
    /// The record as appended (`pending` or `handed_off`)
    pub message: Message,
    /// Set for hand-off channels; the caller opens it
    pub handoff: Option<HandoffRequest>,
    /// Set for in-app messages
    pub delivery: Option<SendHandle>,
}

/// A message received from a contact.
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingMessage {
    pub channel: Channel,
    pub text: Option<TextPayload>,
    pub attachments: Vec<Attachment>,
}

/// Global encryption switch with per-conversation overrides. Changing it
/// affects only messages composed afterwards.
#[derive(Debug)]
pub struct EncryptionPolicy {
    global: AtomicBool,
    overrides: RwLock<HashMap<String, bool>>,
}

impl EncryptionPolicy {
    pub fn new(enabled: bool) -> Self {
        Self {
            global: AtomicBool::new(enabled),
            overrides: RwLock::new(HashMap::new()),
        }
    }

    pub fn is_enabled(&self, conversation_id: &str) -> bool {
        self.overrides
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(conversation_id)
            .copied()
            .unwrap_or_else(|| self.global.load(Ordering::SeqCst))
    }

    pub fn set_global(&self, enabled: bool) {
        self.global.store(enabled, Ordering::SeqCst);
    }

    /// `None` removes the override.
    pub fn set_conversation(&self, conversation_id: &str, enabled: Option<bool>) {
        let mut overrides = self.overrides.write().unwrap_or_else(|e| e.into_inner());
        match enabled {
            Some(enabled) => {
                overrides.insert(conversation_id.to_string(), enabled);
            }
            None => {
                overrides.remove(conversation_id);
            }
        }
    }
}

impl Default for EncryptionPolicy {
    fn default() -> Self {
        Self::new(Config::global().encryption_enabled)
    }
}

/// Handle to an in-flight in-app send.
#[derive(Debug)]
pub struct SendHandle {
    message_id: String,
    cancel_tx: watch::Sender<bool>,
    status_rx: watch::Receiver<DeliveryStatus>,
}

impl SendHandle {
    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    /// Requests cancellation. Repeated calls, and calls after the send
    /// completed, change nothing.
    pub fn cancel(&self) {
        self.cancel_tx.send_replace(true);
    }

    pub fn status(&self) -> DeliveryStatus {
        *self.status_rx.borrow()
    }

    /// Waits for the final status.
    pub async fn wait(&self) -> DeliveryStatus {
        let mut rx = self.status_rx.clone();
        loop {
            let status = *rx.borrow_and_update();
            if status.is_terminal() {
                return status;
            }
            if rx.changed().await.is_err() {
                return *rx.borrow();
            }
        }
    }
}

/// Owned by the delivery task. Whatever ends the task (completion,
/// cancellation, or the task being dropped unpolled) moves the message out
/// of `pending`.
struct PendingSend {
    store: Arc<ConversationStore>,
    message_id: String,
    status_tx: watch::Sender<DeliveryStatus>,
    resolved: bool,
}

impl PendingSend {
    fn resolve(&mut self, status: DeliveryStatus) {
        self.resolved = true;
        let settled = match self.store.update_status(&self.message_id, status) {
            Ok(message) => message.delivery_status,
            Err(e) => {
                warn!(message_id = %self.message_id, error = %e, "could not settle delivery status");
                self.store
                    .get(&self.message_id)
                    .map(|m| m.delivery_status)
                    .filter(|s| s.is_terminal())
                    .unwrap_or(status)
            }
        };
        self.status_tx.send_replace(settled);
    }
}

impl Drop for PendingSend {
    fn drop(&mut self) {
        if !self.resolved {
            debug!(message_id = %self.message_id, "delivery task dropped before completion");
            self.resolve(DeliveryStatus::Failed);
        }
    }
}

/// Resolves once cancellation is requested; never, if the handle is gone.
async fn cancelled(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

struct Prepared {
    draft: MessageDraft,
    handoff: Option<HandoffRequest>,
}

pub struct MessageComposer {
    store: Arc<ConversationStore>,
    directory: Arc<dyn ContactDirectory>,
    keys: Arc<dyn KeyProvider>,
    transport: Arc<dyn MessageTransport>,
    router: ChannelRouter,
    codec: EncryptionCodec,
    policy: EncryptionPolicy,
}

impl MessageComposer {
    /// Composer with the configured suite, send delay and encryption default.
    pub fn new(
        store: Arc<ConversationStore>,
        directory: Arc<dyn ContactDirectory>,
        keys: Arc<dyn KeyProvider>,
    ) -> Self {
        Self {
            store,
            directory,
            keys,
            transport: Arc::new(SimulatedTransport::from_config()),
            router: ChannelRouter::new(),
            codec: EncryptionCodec::from_config().unwrap_or_default(),
            policy: EncryptionPolicy::default(),
        }
    }

    pub fn with_transport(mut self, transport: Arc<dyn MessageTransport>) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_codec(mut self, codec: EncryptionCodec) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_encryption(mut self, enabled: bool) -> Self {
        self.policy = EncryptionPolicy::new(enabled);
        self
    }

    pub fn store(&self) -> &Arc<ConversationStore> {
        &self.store
    }

    pub fn set_global_encryption(&self, enabled: bool) {
        info!(enabled, "global encryption toggled");
        self.policy.set_global(enabled);
    }

    pub fn set_conversation_encryption(&self, conversation_id: &str, enabled: Option<bool>) {
        info!(conversation_id, ?enabled, "conversation encryption override");
        self.policy.set_conversation(conversation_id, enabled);
    }

    pub fn is_encryption_enabled(&self, conversation_id: &str) -> bool {
        self.policy.is_enabled(conversation_id)
    }

    /// Runs every check and builds the draft. Nothing is mutated here.
    fn prepare(&self, request: &ComposeRequest) -> Result<Prepared, ComposeError> {
        let conversation_id = request.conversation_id.as_str();
        let text = normalize_text(request.text.as_deref());
        if text.is_none() && request.attachments.is_empty() {
            return Err(ComposeError::EmptyMessage);
        }
        if let Some(text) = text {
            validate_text(text)?;
        }
        validate_attachment_set(&request.attachments)?;

        let contact = self
            .directory
            .contact(conversation_id)
            .ok_or_else(|| ComposeError::NoRecipient(format!("unknown contact {}", conversation_id)))?;
        let channel = self.router.select_channel(&contact, request.channel_override)?;
        let route = self
            .router
            .route(&contact, channel, text, !request.attachments.is_empty())?;

        match route {
            Route::InApp => {
                let mut draft =
                    MessageDraft::outgoing(Channel::InApp).with_attachments(request.attachments.clone());
                if let Some(text) = text {
                    let payload = if self.policy.is_enabled(conversation_id) {
                        let key = self.keys.key_for(conversation_id)?;
                        TextPayload::Encrypted(self.codec.encrypt_bound(
                            text,
                            &key,
                            conversation_id.as_bytes(),
                        )?)
                    } else {
                        TextPayload::Plain(text.to_string())
                    };
                    draft = draft.with_text(payload);
                }
                Ok(Prepared {
                    draft,
                    handoff: None,
                })
            }
            Route::Handoff(handoff) => {
                // The record keeps only what the external app receives; `tel:` carries no body.
                let mut draft =
                    MessageDraft::outgoing(channel).with_status(DeliveryStatus::HandedOff);
                if let Some(body) = &handoff.body {
                    draft = draft.with_text(TextPayload::Plain(body.clone()));
                }
                Ok(Prepared {
                    draft,
                    handoff: Some(handoff),
                })
            }
        }
    }

    fn commit(&self, conversation_id: &str, prepared: Prepared) -> Result<ComposeOutcome, ComposeError> {
        let message = self.store.append(conversation_id, prepared.draft)?;
        match prepared.handoff {
            Some(handoff) => {
                info!(conversation_id, message_id = %message.id, channel = ?handoff.channel, "message handed off");
                Ok(ComposeOutcome {
                    message,
                    handoff: Some(handoff),
                    delivery: None,
                })
            }
            None => {
                info!(conversation_id, message_id = %message.id, encrypted = message.encrypted, "in-app message queued");
                let delivery = self.spawn_delivery(message.clone());
                Ok(ComposeOutcome {
                    message,
                    handoff: None,
                    delivery: Some(delivery),
                })
            }
        }
    }

    /// Validates, routes and appends one outgoing message. On any error
    /// nothing is appended.
    pub async fn compose(&self, request: ComposeRequest) -> Result<ComposeOutcome, ComposeError> {
        let prepared = self.prepare(&request).map_err(|e| {
            warn!(conversation_id = %request.conversation_id, error = %e, "compose rejected");
            e
        })?;
        self.commit(&request.conversation_id, prepared)
    }

    /// Like [`compose`](Self::compose), but opens the hand-off before
    /// appending, so a message is only recorded `handed_off` once the
    /// external app actually accepted it.
    pub async fn compose_and_dispatch(
        &self,
        request: ComposeRequest,
        dispatcher: &dyn HandoffDispatcher,
    ) -> Result<ComposeOutcome, ComposeError> {
        let prepared = self.prepare(&request)?;
        if let Some(handoff) = &prepared.handoff {
            dispatcher.open(handoff).await.map_err(|e| {
                warn!(conversation_id = %request.conversation_id, error = %e, "hand-off dispatch failed");
                e
            })?;
        }
        self.commit(&request.conversation_id, prepared)
    }

    /// Composes with everything staged in `attachments` appended to the
    /// request. Staged attachments are cleared only if the compose
    /// succeeds.
    pub async fn compose_staged(
        &self,
        mut request: ComposeRequest,
        attachments: &mut AttachmentManager,
    ) -> Result<ComposeOutcome, ComposeError> {
        request.attachments.extend(attachments.staged());
        let outcome = self.compose(request).await?;
        attachments.reset();
        Ok(outcome)
    }

    /// Appends a contact-authored message as `sent` and bumps the unread
    /// count. Incoming messages go through the same text, attachment and
    /// channel checks as outgoing ones.
    pub fn record_incoming(
        &self,
        conversation_id: &str,
        incoming: IncomingMessage,
    ) -> Result<Message, ComposeError> {
        let has_text = match &incoming.text {
            Some(TextPayload::Plain(text)) => match normalize_text(Some(text.as_str())) {
                Some(text) => {
                    validate_text(text)?;
                    true
                }
                None => false,
            },
            Some(TextPayload::Encrypted(_)) => true,
            None => false,
        };
        if !has_text && incoming.attachments.is_empty() {
            return Err(ComposeError::EmptyMessage);
        }
        if !incoming.attachments.is_empty() && !incoming.channel.supports_attachments() {
            warn!(conversation_id, channel = ?incoming.channel, "incoming attachments rejected for channel");
            return Err(ComposeError::AttachmentRejected(incoming.channel));
        }
        validate_attachment_set(&incoming.attachments)?;

        let mut draft = MessageDraft::incoming(incoming.channel).with_attachments(incoming.attachments);
        if has_text {
            if let Some(text) = incoming.text {
                draft = draft.with_text(text);
            }
        }
        let message = self.store.append(conversation_id, draft)?;
        debug!(conversation_id, message_id = %message.id, "incoming message recorded");
        Ok(message)
    }

    /// Text of a stored message for display. `None` if it has no text part.
    pub fn read_text(&self, message: &Message) -> Option<TextView> {
        let view = match message.text()? {
            TextPayload::Plain(text) => TextView::Readable(text.clone()),
            TextPayload::Encrypted(envelope) => {
                let opened = self.keys.key_for(&message.conversation_id).and_then(|key| {
                    self.codec
                        .decrypt_bound(envelope, &key, message.conversation_id.as_bytes())
                });
                match opened {
                    Ok(text) => TextView::Readable(text),
                    Err(e) => {
                        warn!(message_id = %message.id, error = %e, "message text undecryptable");
                        TextView::Undecryptable
                    }
                }
            }
        };
        Some(view)
    }

    fn spawn_delivery(&self, message: Message) -> SendHandle {
        let (cancel_tx, mut cancel_rx) = watch::channel(false);
        let (status_tx, status_rx) = watch::channel(DeliveryStatus::Pending);
        let handle = SendHandle {
            message_id: message.id.clone(),
            cancel_tx,
            status_rx,
        };

        // Created outside the task so that a task dropped before its first
        // poll still settles the message.
        let mut pending = PendingSend {
            store: Arc::clone(&self.store),
            message_id: message.id.clone(),
            status_tx,
            resolved: false,
        };
        let transport = Arc::clone(&self.transport);

        tokio::spawn(async move {
            let status = tokio::select! {
                biased;
                _ = cancelled(&mut cancel_rx) => {
                    info!(message_id = %message.id, "send cancelled");
                    DeliveryStatus::Failed
                }
                result = transport.deliver(&message) => match result {
                    Ok(()) => {
                        debug!(message_id = %message.id, "message delivered");
                        DeliveryStatus::Sent
                    }
                    Err(e) => {
                        warn!(message_id = %message.id, error = %e, "delivery failed");
                        DeliveryStatus::Failed
                    }
                },
            };
            pending.resolve(status);
        });

        handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::contacts::{Contact, ContactRole, InMemoryDirectory};
    use crate::crypto::{MessageKey, StaticKeyProvider};
    use std::time::Duration;

    fn composer() -> (MessageComposer, Arc<StaticKeyProvider>) {
        let directory = InMemoryDirectory::from_contacts([
            Contact::new("t1", "Alice Moreau", ContactRole::Teacher),
            Contact::new("p1", "Maria Alvarez", ContactRole::Parent)
                .with_phone("+1 555 010 9999")
                .with_channels([Channel::Sms, Channel::Call]),
        ]);
        let keys = Arc::new(StaticKeyProvider::new());
        keys.insert("t1", MessageKey::generate());
        let composer = MessageComposer::new(
            Arc::new(ConversationStore::new()),
            Arc::new(directory),
            keys.clone(),
        )
        .with_transport(Arc::new(SimulatedTransport::new(Duration::from_millis(800))))
        .with_encryption(true);
        (composer, keys)
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_app_message_is_encrypted_and_readable() {
        let (composer, _) = composer();
        let outcome = composer
            .compose(ComposeRequest::new("t1").with_text("  Homework is posted  "))
            .await
            .unwrap();

        assert!(outcome.message.encrypted);
        assert!(outcome.handoff.is_none());
        assert_eq!(
            composer.read_text(&outcome.message),
            Some(TextView::Readable("Homework is posted".to_string()))
        );

        let status = outcome.delivery.unwrap().wait().await;
        assert_eq!(status, DeliveryStatus::Sent);
    }

    #[tokio::test]
    async fn test_empty_and_whitespace_rejected() {
        let (composer, _) = composer();
        assert_eq!(
            composer.compose(ComposeRequest::new("t1")).await.unwrap_err(),
            ComposeError::EmptyMessage
        );
        assert_eq!(
            composer
                .compose(ComposeRequest::new("t1").with_text(" \n\t "))
                .await
                .unwrap_err(),
            ComposeError::EmptyMessage
        );
        assert!(composer.store().list("t1").is_empty());
    }

    #[tokio::test]
    async fn test_unknown_contact_is_no_recipient() {
        let (composer, _) = composer();
        assert!(matches!(
            composer.compose(ComposeRequest::new("ghost").with_text("hi")).await,
            Err(ComposeError::NoRecipient(_))
        ));
        assert_eq!(composer.store().conversation_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_key_appends_nothing() {
        let (composer, keys) = composer();
        keys.revoke("t1");
        assert!(matches!(
            composer.compose(ComposeRequest::new("t1").with_text("hi")).await,
            Err(ComposeError::Crypto(_))
        ));
        assert!(composer.store().list("t1").is_empty());
    }

    #[tokio::test]
    async fn test_sms_handoff_is_plain_and_handed_off() {
        let (composer, _) = composer();
        let outcome = composer
            .compose(ComposeRequest::new("p1").with_text("Bus is late"))
            .await
            .unwrap();

        assert_eq!(outcome.message.channel, Channel::Sms);
        assert_eq!(outcome.message.delivery_status, DeliveryStatus::HandedOff);
        assert!(!outcome.message.encrypted);
        assert!(outcome.delivery.is_none());
        assert_eq!(
            outcome.handoff.unwrap().uri,
            "sms:+15550109999?body=Bus%20is%20late"
        );
    }

    #[tokio::test]
    async fn test_undecryptable_after_key_revoked() {
        let (composer, keys) = composer();
        let outcome = composer
            .compose(ComposeRequest::new("t1").with_text("secret"))
            .await
            .unwrap();
        keys.revoke("t1");
        assert_eq!(composer.read_text(&outcome.message), Some(TextView::Undecryptable));
    }

    #[test]
    fn test_record_incoming_counts_unread() {
        let (composer, _) = composer();
        let message = composer
            .record_incoming(
                "t1",
                IncomingMessage {
                    channel: Channel::InApp,
                    text: Some(TextPayload::Plain("Reminder: field trip".into())),
                    attachments: Vec::new(),
                },
            )
            .unwrap();

        assert_eq!(message.delivery_status, DeliveryStatus::Sent);
        assert_eq!(composer.store().unread_count("t1"), 1);

        assert_eq!(
            composer.record_incoming(
                "t1",
                IncomingMessage {
                    channel: Channel::InApp,
                    text: Some(TextPayload::Plain("   ".into())),
                    attachments: Vec::new(),
                },
            ),
            Err(ComposeError::EmptyMessage)
        );
    }

    #[test]
    fn test_record_incoming_enforces_attachment_rules() {
        let (composer, _) = composer();
        let video = |n: usize| {
            Attachment::Image(crate::protocol::messages::ImageAttachment {
                uri: format!("content://media/{}", n),
                mime_type: "video/mp4".to_string(),
            })
        };
        let photo = |n: usize| {
            Attachment::Image(crate::protocol::messages::ImageAttachment {
                uri: format!("content://media/{}", n),
                mime_type: "image/png".to_string(),
            })
        };

        assert_eq!(
            composer.record_incoming(
                "p1",
                IncomingMessage {
                    channel: Channel::Sms,
                    text: None,
                    attachments: vec![photo(1)],
                },
            ),
            Err(ComposeError::AttachmentRejected(Channel::Sms))
        );
        assert!(matches!(
            composer.record_incoming(
                "t1",
                IncomingMessage {
                    channel: Channel::InApp,
                    text: None,
                    attachments: vec![video(1)],
                },
            ),
            Err(ComposeError::InvalidAttachment(_))
        ));
        assert!(matches!(
            composer.record_incoming(
                "t1",
                IncomingMessage {
                    channel: Channel::InApp,
                    text: None,
                    attachments: (0..6).map(photo).collect(),
                },
            ),
            Err(ComposeError::InvalidAttachment(_))
        ));
        assert!(composer.store().list("t1").is_empty());
        assert!(composer.store().list("p1").is_empty());
    }

    #[tokio::test]
    async fn test_call_handoff_records_no_text() {
        let (composer, _) = composer();
        let outcome = composer
            .compose(ComposeRequest::new("p1").with_text("Please call back").via(Channel::Call))
            .await
            .unwrap();

        assert_eq!(outcome.message.channel, Channel::Call);
        assert_eq!(outcome.message.delivery_status, DeliveryStatus::HandedOff);
        assert!(outcome.message.text().is_none());
        assert!(outcome.message.payload.is_empty());
        assert_eq!(composer.read_text(&outcome.message), None);
    }

    #[test]
    fn test_policy_overrides() {
        let policy = EncryptionPolicy::new(true);
        policy.set_conversation("a", Some(false));
        assert!(!policy.is_enabled("a"));
        assert!(policy.is_enabled("b"));

        policy.set_global(false);
        policy.set_conversation("a", None);
        assert!(!policy.is_enabled("a"));
        policy.set_conversation("b", Some(true));
        assert!(policy.is_enabled("b"));
    }
}
