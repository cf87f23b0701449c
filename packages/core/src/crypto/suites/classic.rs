use crate::crypto::provider::CryptoProvider;
use crate::crypto::CLASSIC_SUITE_ID;
use crate::error::CryptoError;
use chacha20poly1305::{
    aead::{Aead, Payload},
    ChaCha20Poly1305, KeyInit, Nonce,
};

const NONCE_LENGTH: usize = 12;

/// ChaCha20-Poly1305 suite. Default for new envelopes.
pub struct ClassicSuiteProvider;

impl CryptoProvider for ClassicSuiteProvider {
    fn aead_encrypt(
        key: &[u8],
        nonce: &[u8],
        plaintext: &[u8],
        associated_data: Option<&[u8]>,
    ) -> Result<Vec<u8>, CryptoError> {
        let cipher = ChaCha20Poly1305::new_from_slice(key)
            .map_err(|_| CryptoError::InvalidInputError("Invalid AEAD key length".to_string()))?;
        if nonce.len() != NONCE_LENGTH {
            return Err(CryptoError::InvalidInputError(format!(
                "Invalid nonce length: expected {}, got {}",
                NONCE_LENGTH,
                nonce.len()
            )));
        }

        let payload = Payload {
            msg: plaintext,
            aad: associated_data.unwrap_or(b""),
        };

        let ciphertext_with_tag = cipher.encrypt(Nonce::from_slice(nonce), payload)?;
        Ok(ciphertext_with_tag)
    }

    fn aead_decrypt(
        key: &[u8],
        nonce: &[u8],
        ciphertext: &[u8],
        associated_data: Option<&[u8]>,
    ) -> Result<Vec<u8>, CryptoError> {
        let cipher = ChaCha20Poly1305::new_from_slice(key)
            .map_err(|_| CryptoError::DecryptionFailure("Invalid AEAD key length".to_string()))?;
        if nonce.len() != NONCE_LENGTH {
            return Err(CryptoError::DecryptionFailure(
                "Malformed nonce".to_string(),
            ));
        }

        let payload = Payload {
            msg: ciphertext,
            aad: associated_data.unwrap_or(b""),
        };

        cipher
            .decrypt(Nonce::from_slice(nonce), payload)
            .map_err(|e| CryptoError::DecryptionFailure(e.to_string()))
    }

    fn nonce_length() -> usize {
        NONCE_LENGTH
    }

    fn suite_id() -> u16 {
        CLASSIC_SUITE_ID
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aead_roundtrip_with_aad() {
        let key = [7u8; 32];
        let nonce = ClassicSuiteProvider::generate_nonce().unwrap();
        let ct = ClassicSuiteProvider::aead_encrypt(&key, &nonce, b"homework", Some(b"conv-1"))
            .unwrap();

        let pt = ClassicSuiteProvider::aead_decrypt(&key, &nonce, &ct, Some(b"conv-1")).unwrap();
        assert_eq!(pt, b"homework");

        let wrong_aad = ClassicSuiteProvider::aead_decrypt(&key, &nonce, &ct, Some(b"conv-2"));
        assert!(matches!(wrong_aad, Err(CryptoError::DecryptionFailure(_))));
    }

    #[test]
    fn test_rejects_bad_key_and_nonce_lengths() {
        let nonce = [0u8; 12];
        assert!(ClassicSuiteProvider::aead_encrypt(&[0u8; 16], &nonce, b"x", None).is_err());
        assert!(ClassicSuiteProvider::aead_encrypt(&[0u8; 32], &[0u8; 8], b"x", None).is_err());
        assert!(matches!(
            ClassicSuiteProvider::aead_decrypt(&[0u8; 32], &[0u8; 3], b"xxxxxxxxxxxxxxxxxxx", None),
            Err(CryptoError::DecryptionFailure(_))
        ));
    }
}
