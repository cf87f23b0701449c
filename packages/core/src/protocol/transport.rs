// In-app транспорт
// Доставка in-app сообщений; реальная сеть живёт за этим trait

use crate::protocol::messages::Message;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Transport unavailable: {0}")]
    Unavailable(String),

    #[error("Rejected by server: {0}")]
    Rejected(String),
}

/// Delivers an already-stored in-app message. Completion may take
/// arbitrarily long; the composer wraps calls in a cancellable task.
#[async_trait]
pub trait MessageTransport: Send + Sync {
    async fn deliver(&self, message: &Message) -> Result<(), TransportError>;
}

/// Transport that sleeps for a fixed delay and then reports success,
/// reproducing the simulated send of the chat screens.
#[derive(Debug)]
pub struct SimulatedTransport {
    delay: Duration,
    offline: AtomicBool,
    delivered: AtomicUsize,
}

impl SimulatedTransport {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            offline: AtomicBool::new(false),
            delivered: AtomicUsize::new(0),
        }
    }

    /// Delay taken from the global config.
    pub fn from_config() -> Self {
        Self::new(crate::config::Config::global().send_delay())
    }

    /// While offline, every delivery fails after the delay.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn delivered_count(&self) -> usize {
        self.delivered.load(Ordering::SeqCst)
    }
}

impl Default for SimulatedTransport {
    fn default() -> Self {
        Self::from_config()
    }
}

#[async_trait]
impl MessageTransport for SimulatedTransport {
    async fn deliver(&self, message: &Message) -> Result<(), TransportError> {
        tokio::time::sleep(self.delay).await;

        if self.offline.load(Ordering::SeqCst) {
            return Err(TransportError::Unavailable(format!(
                "offline while sending {}",
                message.id
            )));
        }

        self.delivered.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
