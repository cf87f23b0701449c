// Публичный API ядра сообщений
// Контакты, выбор канала, составление и отправка сообщений

pub mod channels;
pub mod contacts;
pub mod messaging;

pub use channels::{ChannelRouter, HandoffDispatcher, Route};
pub use contacts::{Contact, ContactDirectory, ContactRole, InMemoryDirectory};
pub use messaging::{
    ComposeOutcome, ComposeRequest, EncryptionPolicy, IncomingMessage, MessageComposer, SendHandle,
};
