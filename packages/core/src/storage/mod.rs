// Модуль хранилища
// Схема и технология хранения — забота внешнего коллаборатора; ядро
// знает только этот контракт.

pub mod memory;

use crate::protocol::messages::Message;

/// Optional persistence collaborator. `save` is an upsert keyed by message
/// id: it is called on append and again on every status change.
pub trait MessagePersistence: Send + Sync {
    fn save(&self, conversation_id: &str, message: &Message) -> anyhow::Result<()>;

    /// Messages of one conversation ordered by `created_at`.
    fn load(&self, conversation_id: &str) -> anyhow::Result<Vec<Message>>;
}

pub use memory::MemoryStorage;
