// Состояние бесед
//
// Each conversation sits behind its own mutex; the outer map is only
// locked long enough to find or create an entry, so independent
// conversations never wait on each other.

use crate::protocol::messages::{DeliveryStatus, Message, MessageDraft, Sender};
use crate::storage::MessagePersistence;
use crate::utils::error::StoreError;
use crate::utils::time::{Clock, SystemClock};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use tracing::{debug, warn};

/// Состояние одной беседы
#[derive(Debug, Clone)]
pub struct ConversationState {
    pub contact_id: String,
    pub messages: Vec<Message>,
    pub unread_count: u32,
    pub last_read_message_id: Option<String>,
}

impl ConversationState {
    pub fn new(contact_id: String) -> Self {
        Self {
            contact_id,
            messages: Vec::new(),
            unread_count: 0,
            last_read_message_id: None,
        }
    }

    /// Получить последнее сообщение
    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Получить количество сообщений
    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    /// Отметить все сообщения как прочитанные
    pub fn mark_as_read(&mut self) {
        self.last_read_message_id = self.last_message().map(|m| m.id.clone());
        self.unread_count = 0;
    }

    /// Next timestamp that keeps `created_at` monotonic.
    fn next_timestamp(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self.last_message() {
            Some(last) if now <= last.created_at => last.created_at + Duration::milliseconds(1),
            _ => now,
        }
    }
}

/// Краткая сводка для списка бесед
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationSummary {
    pub conversation_id: String,
    pub message_count: usize,
    pub unread_count: u32,
    pub last_message_id: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
}

type SharedConversation = Arc<Mutex<ConversationState>>;

fn lock(conversation: &SharedConversation) -> MutexGuard<'_, ConversationState> {
    conversation.lock().unwrap_or_else(|e| e.into_inner())
}

/// Хранилище всех бесед текущей сессии
pub struct ConversationStore {
    conversations: RwLock<HashMap<String, SharedConversation>>,
    /// message id -> conversation id
    index: RwLock<HashMap<String, String>>,
    clock: Arc<dyn Clock>,
    persistence: Option<Arc<dyn MessagePersistence>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            conversations: RwLock::new(HashMap::new()),
            index: RwLock::new(HashMap::new()),
            clock,
            persistence: None,
        }
    }

    /// Every append and status change is forwarded to `persistence`.
    pub fn with_persistence(mut self, persistence: Arc<dyn MessagePersistence>) -> Self {
        self.persistence = Some(persistence);
        self
    }

    fn conversation(&self, conversation_id: &str) -> Option<SharedConversation> {
        self.conversations
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(conversation_id)
            .cloned()
    }

    /// Получить или создать беседу
    fn get_or_create(&self, conversation_id: &str) -> SharedConversation {
        if let Some(existing) = self.conversation(conversation_id) {
            return existing;
        }
        self.conversations
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .entry(conversation_id.to_string())
            .or_insert_with(|| {
                debug!(conversation_id, "creating conversation");
                Arc::new(Mutex::new(ConversationState::new(conversation_id.to_string())))
            })
            .clone()
    }

    fn persist(&self, conversation_id: &str, message: &Message) -> Result<(), StoreError> {
        if let Some(persistence) = &self.persistence {
            persistence.save(conversation_id, message).map_err(|e| {
                warn!(conversation_id, message_id = %message.id, error = %e, "persistence save failed");
                StoreError::Persistence(e.to_string())
            })?;
        }
        Ok(())
    }

    /// Assigns id and timestamp, appends, and returns the stored record.
    /// The conversation is created on first append.
    pub fn append(&self, conversation_id: &str, draft: MessageDraft) -> Result<Message, StoreError> {
        if conversation_id.trim().is_empty() {
            return Err(StoreError::NotFound("empty conversation id".to_string()));
        }

        let shared = self.get_or_create(conversation_id);
        let mut conversation = lock(&shared);

        let created_at = conversation.next_timestamp(self.clock.now());
        let message = draft.into_message(
            crate::utils::uuid::generate_v4(),
            conversation_id.to_string(),
            created_at,
        );

        self.persist(conversation_id, &message)?;

        if message.sender == Sender::Contact {
            conversation.unread_count += 1;
        }
        conversation.messages.push(message.clone());
        self.index
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(message.id.clone(), conversation_id.to_string());

        debug!(
            conversation_id,
            message_id = %message.id,
            channel = ?message.channel,
            status = ?message.delivery_status,
            "message appended"
        );
        Ok(message)
    }

    /// Snapshot of the conversation in insertion order. Unknown ids give an
    /// empty list; reading never creates or mutates anything.
    pub fn list(&self, conversation_id: &str) -> Vec<Message> {
        self.conversation(conversation_id)
            .map(|shared| lock(&shared).messages.clone())
            .unwrap_or_default()
    }

    pub fn get(&self, message_id: &str) -> Option<Message> {
        let conversation_id = self.conversation_id_of(message_id)?;
        let shared = self.conversation(&conversation_id)?;
        let conversation = lock(&shared);
        conversation.messages.iter().find(|m| m.id == message_id).cloned()
    }

    pub fn conversation_id_of(&self, message_id: &str) -> Option<String> {
        self.index
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(message_id)
            .cloned()
    }

    /// Moves a message's delivery status forward. Only `Pending` may
    /// change, and never back to `Pending`.
    ///
    /// A persistence failure is returned as `StoreError::Persistence`, but
    /// the new status stays applied in memory.
    pub fn update_status(&self, message_id: &str, status: DeliveryStatus) -> Result<Message, StoreError> {
        let conversation_id = self
            .conversation_id_of(message_id)
            .ok_or_else(|| StoreError::NotFound(format!("message {}", message_id)))?;
        let shared = self
            .conversation(&conversation_id)
            .ok_or_else(|| StoreError::NotFound(format!("conversation {}", conversation_id)))?;
        let mut conversation = lock(&shared);

        let position = conversation
            .messages
            .iter()
            .position(|m| m.id == message_id)
            .ok_or_else(|| StoreError::NotFound(format!("message {}", message_id)))?;

        let current = conversation.messages[position].delivery_status;
        if !current.can_transition_to(status) {
            return Err(StoreError::InvalidStateTransition {
                from: current,
                to: status,
            });
        }

        conversation.messages[position].delivery_status = status;
        let updated = conversation.messages[position].clone();
        debug!(conversation_id = %conversation_id, message_id, from = ?current, to = ?status, "delivery status updated");

        self.persist(&conversation_id, &updated)?;
        Ok(updated)
    }

    pub fn last_message(&self, conversation_id: &str) -> Option<Message> {
        let shared = self.conversation(conversation_id)?;
        let conversation = lock(&shared);
        conversation.last_message().cloned()
    }

    pub fn message_count(&self, conversation_id: &str) -> usize {
        self.conversation(conversation_id)
            .map(|shared| lock(&shared).message_count())
            .unwrap_or(0)
    }

    /// Отметить беседу как прочитанную
    pub fn mark_read(&self, conversation_id: &str) -> Result<(), StoreError> {
        let shared = self
            .conversation(conversation_id)
            .ok_or_else(|| StoreError::NotFound(format!("conversation {}", conversation_id)))?;
        lock(&shared).mark_as_read();
        Ok(())
    }

    pub fn unread_count(&self, conversation_id: &str) -> u32 {
        self.conversation(conversation_id)
            .map(|shared| lock(&shared).unread_count)
            .unwrap_or(0)
    }

    /// Получить общее количество непрочитанных сообщений
    pub fn total_unread_count(&self) -> u32 {
        self.handles().iter().map(|shared| lock(shared).unread_count).sum()
    }

    pub fn conversation_count(&self) -> usize {
        self.conversations.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn handles(&self) -> Vec<SharedConversation> {
        self.conversations
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect()
    }

    /// Сводки по всем беседам, самые свежие первыми
    pub fn summaries(&self) -> Vec<ConversationSummary> {
        let mut summaries: Vec<ConversationSummary> = self
            .handles()
            .iter()
            .map(|shared| {
                let conversation = lock(shared);
                let last = conversation.last_message();
                ConversationSummary {
                    conversation_id: conversation.contact_id.clone(),
                    message_count: conversation.message_count(),
                    unread_count: conversation.unread_count,
                    last_message_id: last.map(|m| m.id.clone()),
                    last_message_at: last.map(|m| m.created_at),
                }
            })
            .collect();

        summaries.sort_by(|a, b| {
            b.last_message_at
                .cmp(&a.last_message_at)
                .then_with(|| a.conversation_id.cmp(&b.conversation_id))
        });
        summaries
    }

    /// Loads a conversation from the persistence collaborator. Messages
    /// already in memory are kept; returns how many were added.
    ///
    /// Records filed under another conversation are skipped. A record still
    /// `pending` has no delivery task left to settle it, so it is loaded as
    /// `failed`.
    pub fn restore(&self, conversation_id: &str) -> Result<usize, StoreError> {
        let Some(persistence) = &self.persistence else {
            return Ok(0);
        };
        let loaded = persistence
            .load(conversation_id)
            .map_err(|e| StoreError::Persistence(e.to_string()))?;

        let shared = self.get_or_create(conversation_id);
        let mut conversation = lock(&shared);
        let mut index = self.index.write().unwrap_or_else(|e| e.into_inner());

        let mut added = 0;
        let mut settled = Vec::new();
        for mut message in loaded {
            if message.conversation_id != conversation_id {
                warn!(
                    conversation_id,
                    message_id = %message.id,
                    filed_under = %message.conversation_id,
                    "skipping record from another conversation"
                );
                continue;
            }
            if index.contains_key(&message.id) {
                continue;
            }
            if message.delivery_status == DeliveryStatus::Pending {
                debug!(conversation_id, message_id = %message.id, "stale pending record settled as failed");
                message.delivery_status = DeliveryStatus::Failed;
                settled.push(message.clone());
            }
            index.insert(message.id.clone(), conversation_id.to_string());
            conversation.messages.push(message);
            added += 1;
        }
        conversation.messages.sort_by_key(|m| m.created_at);
        drop(index);

        for message in &settled {
            // in-memory record is already final; a failed write is only logged
            let _ = self.persist(conversation_id, message);
        }

        debug!(conversation_id, added, "conversation restored");
        Ok(added)
    }
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new()
    }
}
