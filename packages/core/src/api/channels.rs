// Выбор канала доставки

use crate::api::contacts::Contact;
use crate::protocol::handoff::build_request;
use crate::protocol::messages::{Channel, HandoffRequest};
use crate::utils::error::{ComposeError, HandoffError};
use async_trait::async_trait;
use tracing::{debug, warn};

/// Where a composed message goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    InApp,
    /// Caller must open the external app described by the request
    Handoff(HandoffRequest),
}

/// Opens `sms:` / `tel:` / `mailto:` URIs on the host platform.
#[async_trait]
pub trait HandoffDispatcher: Send + Sync {
    async fn open(&self, request: &HandoffRequest) -> Result<(), HandoffError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ChannelRouter;

impl ChannelRouter {
    pub fn new() -> Self {
        Self
    }

    /// An override wins only if the contact accepts that channel. Otherwise
    /// in-app is preferred whenever it is available, then the contact's
    /// first choice.
    pub fn select_channel(
        &self,
        contact: &Contact,
        override_channel: Option<Channel>,
    ) -> Result<Channel, ComposeError> {
        if let Some(channel) = override_channel {
            if contact.prefers(channel) {
                return Ok(channel);
            }
            debug!(contact_id = %contact.id, ?channel, "override not accepted by contact, ignoring");
        }

        if contact.prefers(Channel::InApp) {
            return Ok(Channel::InApp);
        }

        contact.preferred_channels.first().copied().ok_or_else(|| {
            ComposeError::NoRecipient(format!("{} has no delivery channels", contact.id))
        })
    }

    pub fn route(
        &self,
        contact: &Contact,
        channel: Channel,
        text: Option<&str>,
        has_binary: bool,
    ) -> Result<Route, ComposeError> {
        if has_binary && !channel.supports_attachments() {
            warn!(contact_id = %contact.id, ?channel, "attachments rejected for channel");
            return Err(ComposeError::AttachmentRejected(channel));
        }

        if !channel.requires_handoff() {
            return Ok(Route::InApp);
        }

        let target = match channel {
            Channel::Email => contact.email.as_deref(),
            _ => contact.phone.as_deref(),
        };
        let target = target.filter(|t| !t.trim().is_empty()).ok_or_else(|| {
            ComposeError::NoRecipient(format!("{} has no address for {:?}", contact.id, channel))
        })?;

        let request = build_request(channel, target, text).map_err(|e| match e {
            HandoffError::InvalidTarget(target) => {
                ComposeError::NoRecipient(format!("{} has invalid address {:?}", contact.id, target))
            }
            other => ComposeError::Handoff(other),
        })?;
        Ok(Route::Handoff(request))
    }
}
