// In-memory storage для тестов и хостов без своей БД

use crate::protocol::messages::Message;
use crate::storage::MessagePersistence;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

/// Экспортируемый снимок одной беседы
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSnapshot {
    pub conversation_id: String,
    pub messages: Vec<Message>,
}

/// In-memory хранилище
#[derive(Default)]
pub struct MemoryStorage {
    messages: RwLock<HashMap<String, Vec<Message>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn conversation_ids(&self) -> Vec<String> {
        let guard = self.messages.read().unwrap_or_else(|e| e.into_inner());
        let mut ids: Vec<String> = guard.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Экспорт беседы в JSON
    pub fn export_conversation(&self, conversation_id: &str) -> anyhow::Result<String> {
        let snapshot = ConversationSnapshot {
            conversation_id: conversation_id.to_string(),
            messages: self.load(conversation_id)?,
        };
        serde_json::to_string(&snapshot).context("failed to export conversation")
    }

    /// Импорт беседы; существующие сообщения с тем же id перезаписываются
    pub fn import_conversation(&self, json: &str) -> anyhow::Result<usize> {
        let snapshot: ConversationSnapshot =
            serde_json::from_str(json).context("failed to import conversation")?;
        let count = snapshot.messages.len();
        for message in &snapshot.messages {
            self.save(&snapshot.conversation_id, message)?;
        }
        Ok(count)
    }

    pub fn delete_conversation(&self, conversation_id: &str) -> bool {
        self.messages
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(conversation_id)
            .is_some()
    }

    pub fn clear_all(&self) {
        self.messages
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

impl MessagePersistence for MemoryStorage {
    fn save(&self, conversation_id: &str, message: &Message) -> anyhow::Result<()> {
        let mut guard = self.messages.write().unwrap_or_else(|e| e.into_inner());
        let messages = guard.entry(conversation_id.to_string()).or_default();
        match messages.iter_mut().find(|m| m.id == message.id) {
            Some(existing) => *existing = message.clone(),
            None => messages.push(message.clone()),
        }
        Ok(())
    }

    fn load(&self, conversation_id: &str) -> anyhow::Result<Vec<Message>> {
        let guard = self.messages.read().unwrap_or_else(|e| e.into_inner());
        let mut messages = guard.get(conversation_id).cloned().unwrap_or_default();
        // Сортировка по timestamp
        messages.sort_by_key(|m| m.created_at);
        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::messages::{Channel, DeliveryStatus, MessageDraft, TextPayload};
    use chrono::{Duration, TimeZone, Utc};

    fn msg(id: &str, secs: i64) -> Message {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap() + Duration::seconds(secs);
        MessageDraft::outgoing(Channel::InApp)
            .with_text(TextPayload::Plain(format!("text {}", id)))
            .into_message(id.to_string(), "conv1".to_string(), at)
    }

    #[test]
    fn test_memory_storage_messages() {
        let storage = MemoryStorage::new();

        storage.save("conv1", &msg("msg2", 200)).unwrap();
        storage.save("conv1", &msg("msg1", 100)).unwrap();

        let messages = storage.load("conv1").unwrap();

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].id, "msg1"); // Сортировка по timestamp
        assert_eq!(messages[1].id, "msg2");
        assert!(storage.load("other").unwrap().is_empty());
    }

    #[test]
    fn test_save_is_upsert() {
        let storage = MemoryStorage::new();
        let mut m = msg("msg1", 0);
        storage.save("conv1", &m).unwrap();

        m.delivery_status = DeliveryStatus::Sent;
        storage.save("conv1", &m).unwrap();

        let messages = storage.load("conv1").unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].delivery_status, DeliveryStatus::Sent);
    }

    #[test]
    fn test_export_import_roundtrip() {
        let source = MemoryStorage::new();
        source.save("conv1", &msg("msg1", 0)).unwrap();
        source.save("conv1", &msg("msg2", 5)).unwrap();

        let json = source.export_conversation("conv1").unwrap();

        let target = MemoryStorage::new();
        assert_eq!(target.import_conversation(&json).unwrap(), 2);
        assert_eq!(target.load("conv1").unwrap(), source.load("conv1").unwrap());
        assert_eq!(target.conversation_ids(), vec!["conv1".to_string()]);

        assert!(target.delete_conversation("conv1"));
        assert!(target.import_conversation("{not json").is_err());
    }
}
