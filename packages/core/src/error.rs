use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("AEAD encryption failed: {0}")]
    AeadEncryptionError(String),
    /// The envelope could not be opened with the given key. Callers render
    /// this as an undecryptable message, never as the raw ciphertext.
    #[error("Decryption failed: {0}")]
    DecryptionFailure(String),
    #[error("Key derivation failed: {0}")]
    KeyDerivationError(String),
    #[error("Nonce generation failed: {0}")]
    NonceGenerationError(String),
    #[error("No key available for conversation {0}")]
    MissingKey(String),
    #[error("Unsupported suite: {0}")]
    UnsupportedSuite(u16),
    #[error("Invalid input: {0}")]
    InvalidInputError(String),
}

impl From<chacha20poly1305::Error> for CryptoError {
    fn from(err: chacha20poly1305::Error) -> Self {
        CryptoError::AeadEncryptionError(err.to_string())
    }
}

impl From<rand::Error> for CryptoError {
    fn from(err: rand::Error) -> Self {
        CryptoError::NonceGenerationError(err.to_string())
    }
}

impl From<hkdf::InvalidLength> for CryptoError {
    fn from(err: hkdf::InvalidLength) -> Self {
        CryptoError::KeyDerivationError(err.to_string())
    }
}
