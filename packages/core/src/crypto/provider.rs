//! Defines the CryptoProvider trait for crypto-agility.

use crate::error::CryptoError;
use hkdf::Hkdf;
use sha2::Sha256;

/// Trait that formalizes the symmetric operations a cipher suite offers to
/// the message codec. Envelopes record the suite id they were sealed with,
/// so several suites can coexist in one conversation history.
pub trait CryptoProvider: Send + Sync + 'static {
    /// Performs AEAD encryption.
    /// `key`: The 32-byte symmetric key.
    /// `nonce`: The unique nonce for this encryption.
    /// `plaintext`: The data to encrypt.
    /// `associated_data`: Optional associated data (authenticated but not encrypted).
    fn aead_encrypt(
        key: &[u8],
        nonce: &[u8],
        plaintext: &[u8],
        associated_data: Option<&[u8]>,
    ) -> Result<Vec<u8>, CryptoError>;

    /// Performs AEAD decryption. Any failure, including a wrong key, a
    /// tampered ciphertext or a malformed nonce, is a `DecryptionFailure`.
    fn aead_decrypt(
        key: &[u8],
        nonce: &[u8],
        ciphertext: &[u8],
        associated_data: Option<&[u8]>,
    ) -> Result<Vec<u8>, CryptoError>;

    /// Nonce length in bytes expected by `aead_encrypt`.
    fn nonce_length() -> usize;

    /// Returns the SuiteID associated with this CryptoProvider.
    fn suite_id() -> u16;

    /// Derives a key from input key material using HKDF-SHA256.
    fn hkdf_derive_key(
        salt: &[u8],
        ikm: &[u8],
        info: &[u8],
        len: usize,
    ) -> Result<Vec<u8>, CryptoError> {
        let hkdf = Hkdf::<Sha256>::new(Some(salt), ikm);
        let mut okm = vec![0u8; len];
        hkdf.expand(info, &mut okm)?;
        Ok(okm)
    }

    /// Generates a cryptographically secure random nonce from the OS RNG.
    fn generate_nonce() -> Result<Vec<u8>, CryptoError> {
        use rand_core::RngCore;

        let mut nonce_bytes = vec![0u8; Self::nonce_length()];
        rand::rngs::OsRng.try_fill_bytes(&mut nonce_bytes)?;
        Ok(nonce_bytes)
    }
}
