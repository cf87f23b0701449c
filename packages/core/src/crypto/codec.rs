//! Шифрование текста сообщений
//!
//! `EncryptionCodec` seals message text into an [`Envelope`] with a fresh
//! OS-random nonce per call. The envelope records the suite it was sealed
//! with, so history written under one suite stays readable after the
//! default changes.

use crate::crypto::keys::MessageKey;
use crate::crypto::provider::CryptoProvider;
use crate::crypto::suites::aes::AesGcmSuiteProvider;
use crate::crypto::suites::classic::ClassicSuiteProvider;
use crate::crypto::{AES_GCM_SUITE_ID, CLASSIC_SUITE_ID};
use crate::error::CryptoError;
use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};

/// Encrypted representation of a text payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub suite_id: u16,
    #[serde(with = "serde_bytes")]
    pub nonce: Vec<u8>,
    /// Ciphertext including the AEAD tag
    #[serde(with = "serde_bytes")]
    pub ciphertext: Vec<u8>,
}

impl Envelope {
    /// Base64(suite_id_be || nonce || ciphertext), the form used on the wire
    /// and by persistence backends that store text columns.
    pub fn to_base64(&self) -> String {
        let mut buf = Vec::with_capacity(2 + self.nonce.len() + self.ciphertext.len());
        buf.extend_from_slice(&self.suite_id.to_be_bytes());
        buf.extend_from_slice(&self.nonce);
        buf.extend_from_slice(&self.ciphertext);
        general_purpose::STANDARD.encode(buf)
    }

    pub fn from_base64(encoded: &str) -> Result<Self, CryptoError> {
        let raw = general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| CryptoError::DecryptionFailure(format!("Base64 decode failed: {}", e)))?;
        if raw.len() < 2 {
            return Err(CryptoError::DecryptionFailure("Envelope too short".to_string()));
        }

        let suite_id = u16::from_be_bytes([raw[0], raw[1]]);
        let nonce_len = nonce_length_for(suite_id)?;
        let body = &raw[2..];
        if body.len() < nonce_len {
            return Err(CryptoError::DecryptionFailure("Envelope too short".to_string()));
        }

        Ok(Self {
            suite_id,
            nonce: body[..nonce_len].to_vec(),
            ciphertext: body[nonce_len..].to_vec(),
        })
    }
}

fn nonce_length_for(suite_id: u16) -> Result<usize, CryptoError> {
    match suite_id {
        CLASSIC_SUITE_ID => Ok(ClassicSuiteProvider::nonce_length()),
        AES_GCM_SUITE_ID => Ok(AesGcmSuiteProvider::nonce_length()),
        other => Err(CryptoError::UnsupportedSuite(other)),
    }
}

fn seal<P: CryptoProvider>(
    key: &MessageKey,
    plaintext: &str,
    associated_data: &[u8],
) -> Result<Envelope, CryptoError> {
    let nonce = P::generate_nonce()?;
    let ciphertext = P::aead_encrypt(
        key.as_bytes(),
        &nonce,
        plaintext.as_bytes(),
        Some(associated_data),
    )?;
    Ok(Envelope {
        suite_id: P::suite_id(),
        nonce,
        ciphertext,
    })
}

fn open<P: CryptoProvider>(
    key: &MessageKey,
    envelope: &Envelope,
    associated_data: &[u8],
) -> Result<String, CryptoError> {
    let plaintext = P::aead_decrypt(
        key.as_bytes(),
        &envelope.nonce,
        &envelope.ciphertext,
        Some(associated_data),
    )?;
    String::from_utf8(plaintext)
        .map_err(|_| CryptoError::DecryptionFailure("Plaintext is not valid UTF-8".to_string()))
}

#[derive(Debug, Clone, Copy)]
pub struct EncryptionCodec {
    suite_id: u16,
}

impl Default for EncryptionCodec {
    fn default() -> Self {
        Self {
            suite_id: CLASSIC_SUITE_ID,
        }
    }
}

impl EncryptionCodec {
    /// Codec sealing new envelopes with the given suite.
    pub fn new(suite_id: u16) -> Result<Self, CryptoError> {
        nonce_length_for(suite_id)?;
        Ok(Self { suite_id })
    }

    /// Codec using the suite named in the global config.
    pub fn from_config() -> Result<Self, CryptoError> {
        Self::new(crate::config::Config::global().default_suite_id)
    }

    pub fn suite_id(&self) -> u16 {
        self.suite_id
    }

    pub fn encrypt(&self, plaintext: &str, key: &MessageKey) -> Result<Envelope, CryptoError> {
        self.encrypt_bound(plaintext, key, b"")
    }

    pub fn decrypt(&self, envelope: &Envelope, key: &MessageKey) -> Result<String, CryptoError> {
        self.decrypt_bound(envelope, key, b"")
    }

    /// Encrypt with `context` bound as associated data. The composer binds
    /// the conversation id so an envelope only opens in its own thread.
    pub fn encrypt_bound(
        &self,
        plaintext: &str,
        key: &MessageKey,
        context: &[u8],
    ) -> Result<Envelope, CryptoError> {
        match self.suite_id {
            CLASSIC_SUITE_ID => seal::<ClassicSuiteProvider>(key, plaintext, context),
            AES_GCM_SUITE_ID => seal::<AesGcmSuiteProvider>(key, plaintext, context),
            other => Err(CryptoError::UnsupportedSuite(other)),
        }
    }

    /// Decrypt with the suite recorded in the envelope, not the codec's
    /// current default.
    pub fn decrypt_bound(
        &self,
        envelope: &Envelope,
        key: &MessageKey,
        context: &[u8],
    ) -> Result<String, CryptoError> {
        match envelope.suite_id {
            CLASSIC_SUITE_ID => open::<ClassicSuiteProvider>(key, envelope, context),
            AES_GCM_SUITE_ID => open::<AesGcmSuiteProvider>(key, envelope, context),
            other => Err(CryptoError::DecryptionFailure(format!(
                "Unknown suite id {}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_nonce_per_call() {
        let codec = EncryptionCodec::default();
        let key = MessageKey::generate();

        let a = codec.encrypt("same text", &key).unwrap();
        let b = codec.encrypt("same text", &key).unwrap();

        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.ciphertext, b.ciphertext);
        assert_eq!(codec.decrypt(&a, &key).unwrap(), "same text");
        assert_eq!(codec.decrypt(&b, &key).unwrap(), "same text");
    }

    #[test]
    fn test_envelope_base64_roundtrip() {
        let codec = EncryptionCodec::new(AES_GCM_SUITE_ID).unwrap();
        let key = MessageKey::generate();
        let envelope = codec.encrypt("PTA meeting moved", &key).unwrap();

        let decoded = Envelope::from_base64(&envelope.to_base64()).unwrap();
        assert_eq!(decoded, envelope);
        assert_eq!(codec.decrypt(&decoded, &key).unwrap(), "PTA meeting moved");
    }

    #[test]
    fn test_decrypts_with_envelope_suite() {
        let key = MessageKey::generate();
        let old = EncryptionCodec::new(AES_GCM_SUITE_ID)
            .unwrap()
            .encrypt("sealed under AES", &key)
            .unwrap();

        let current = EncryptionCodec::default();
        assert_eq!(current.decrypt(&old, &key).unwrap(), "sealed under AES");
    }

    #[test]
    fn test_unknown_suite() {
        assert_eq!(
            EncryptionCodec::new(99).unwrap_err(),
            CryptoError::UnsupportedSuite(99)
        );

        let envelope = Envelope {
            suite_id: 99,
            nonce: vec![0; 12],
            ciphertext: vec![0; 20],
        };
        let res = EncryptionCodec::default().decrypt(&envelope, &MessageKey::generate());
        assert!(matches!(res, Err(CryptoError::DecryptionFailure(_))));
    }

    #[test]
    fn test_truncated_base64_envelope() {
        assert!(Envelope::from_base64("AQ==").is_err());
        assert!(Envelope::from_base64("not base64!").is_err());
    }
}
