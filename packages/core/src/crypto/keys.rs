// Управление ключами
// Ключи сообщений выдаются внешним trust-коллаборатором; здесь только
// типы и производные провайдеры.

use crate::crypto::provider::CryptoProvider;
use crate::crypto::suites::classic::ClassicSuiteProvider;
use crate::error::CryptoError;
use rand_core::RngCore;
use std::collections::HashMap;
use std::sync::RwLock;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

pub const KEY_LENGTH: usize = 32;

const CONVERSATION_KEY_INFO: &[u8] = b"schoolchat/conversation-key/v1:";

/// Symmetric key for message envelopes. Wiped on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MessageKey([u8; KEY_LENGTH]);

impl MessageKey {
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LENGTH];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; KEY_LENGTH]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let array: [u8; KEY_LENGTH] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidInputError(format!(
                "Invalid key length: expected {}, got {}",
                KEY_LENGTH,
                bytes.len()
            ))
        })?;
        Ok(Self(array))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for MessageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MessageKey(<redacted>)")
    }
}

/// Source of per-conversation keys.
pub trait KeyProvider: Send + Sync {
    fn key_for(&self, conversation_id: &str) -> Result<MessageKey, CryptoError>;
}

/// Derives one key per conversation from a user master secret with
/// HKDF-SHA256; the conversation id goes into the HKDF info.
pub struct DerivedKeyProvider {
    master_secret: Zeroizing<Vec<u8>>,
    salt: Vec<u8>,
}

impl DerivedKeyProvider {
    pub fn new(master_secret: &[u8], salt: &[u8]) -> Result<Self, CryptoError> {
        if master_secret.len() < KEY_LENGTH {
            return Err(CryptoError::KeyDerivationError(format!(
                "Master secret must be at least {} bytes",
                KEY_LENGTH
            )));
        }
        Ok(Self {
            master_secret: Zeroizing::new(master_secret.to_vec()),
            salt: salt.to_vec(),
        })
    }
}

impl KeyProvider for DerivedKeyProvider {
    fn key_for(&self, conversation_id: &str) -> Result<MessageKey, CryptoError> {
        let mut info = CONVERSATION_KEY_INFO.to_vec();
        info.extend_from_slice(conversation_id.as_bytes());

        let okm = Zeroizing::new(ClassicSuiteProvider::hkdf_derive_key(
            &self.salt,
            &self.master_secret,
            &info,
            KEY_LENGTH,
        )?);
        MessageKey::from_slice(&okm)
    }
}

/// Keys handed over explicitly, one per conversation.
#[derive(Default)]
pub struct StaticKeyProvider {
    keys: RwLock<HashMap<String, MessageKey>>,
}

impl StaticKeyProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, conversation_id: &str, key: MessageKey) {
        self.keys
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(conversation_id.to_string(), key);
    }

    /// Forget a key. Envelopes sealed with it become undecryptable.
    pub fn revoke(&self, conversation_id: &str) -> bool {
        self.keys
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(conversation_id)
            .is_some()
    }
}

impl KeyProvider for StaticKeyProvider {
    fn key_for(&self, conversation_id: &str) -> Result<MessageKey, CryptoError> {
        self.keys
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(conversation_id)
            .cloned()
            .ok_or_else(|| CryptoError::MissingKey(conversation_id.to_string()))
    }
}
