// Schoolchat Core
// Messaging core for the school chat screens: encrypted in-app threads,
// SMS/call/e-mail hand-off, attachments and voice notes

#![warn(clippy::all)]

// Модули
pub mod api;
pub mod config;
pub mod crypto;
pub mod error;
pub mod protocol;
pub mod state;
pub mod storage;
pub mod utils;

// Re-exports для удобства
pub use api::{ComposeOutcome, ComposeRequest, MessageComposer, SendHandle};
pub use config::Config;
pub use error::CryptoError;
pub use protocol::messages::{Channel, DeliveryStatus, Message, TextView};
pub use utils::error::{CoreError, ErrorKind, Result};
