use crate::crypto::provider::CryptoProvider;
use crate::crypto::AES_GCM_SUITE_ID;
use crate::error::CryptoError;
use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};

const NONCE_LENGTH: usize = 12;

/// AES-256-GCM suite, for hosts with hardware AES.
pub struct AesGcmSuiteProvider;

impl CryptoProvider for AesGcmSuiteProvider {
    fn aead_encrypt(
        key: &[u8],
        nonce: &[u8],
        plaintext: &[u8],
        associated_data: Option<&[u8]>,
    ) -> Result<Vec<u8>, CryptoError> {
        let cipher = Aes256Gcm::new_from_slice(key)
            .map_err(|_| CryptoError::InvalidInputError("Invalid AES key length".to_string()))?;
        if nonce.len() != NONCE_LENGTH {
            return Err(CryptoError::InvalidInputError(format!(
                "Invalid nonce length: expected {}, got {}",
                NONCE_LENGTH,
                nonce.len()
            )));
        }

        cipher
            .encrypt(
                Nonce::from_slice(nonce),
                Payload {
                    msg: plaintext,
                    aad: associated_data.unwrap_or(b""),
                },
            )
            .map_err(|e| CryptoError::AeadEncryptionError(e.to_string()))
    }

    fn aead_decrypt(
        key: &[u8],
        nonce: &[u8],
        ciphertext: &[u8],
        associated_data: Option<&[u8]>,
    ) -> Result<Vec<u8>, CryptoError> {
        let cipher = Aes256Gcm::new_from_slice(key)
            .map_err(|_| CryptoError::DecryptionFailure("Invalid AES key length".to_string()))?;
        if nonce.len() != NONCE_LENGTH {
            return Err(CryptoError::DecryptionFailure(
                "Malformed nonce".to_string(),
            ));
        }

        cipher
            .decrypt(
                Nonce::from_slice(nonce),
                Payload {
                    msg: ciphertext,
                    aad: associated_data.unwrap_or(b""),
                },
            )
            .map_err(|e| CryptoError::DecryptionFailure(e.to_string()))
    }

    fn nonce_length() -> usize {
        NONCE_LENGTH
    }

    fn suite_id() -> u16 {
        AES_GCM_SUITE_ID
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aes_gcm_roundtrip() {
        let key = [3u8; 32];
        let nonce = AesGcmSuiteProvider::generate_nonce().unwrap();
        assert_eq!(nonce.len(), 12);

        let ct = AesGcmSuiteProvider::aead_encrypt(&key, &nonce, b"exam at 9", None).unwrap();
        assert_eq!(ct.len(), b"exam at 9".len() + 16);

        let pt = AesGcmSuiteProvider::aead_decrypt(&key, &nonce, &ct, None).unwrap();
        assert_eq!(pt, b"exam at 9");
    }

    #[test]
    fn test_aes_gcm_wrong_key() {
        let nonce = [1u8; 12];
        let ct = AesGcmSuiteProvider::aead_encrypt(&[3u8; 32], &nonce, b"fees", None).unwrap();
        let res = AesGcmSuiteProvider::aead_decrypt(&[4u8; 32], &nonce, &ct, None);
        assert!(matches!(res, Err(CryptoError::DecryptionFailure(_))));
    }
}
