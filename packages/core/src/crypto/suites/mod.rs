//! Криптографические наборы (Crypto Suites)
//!
//! Реализации CryptoProvider trait для шифрования текста сообщений.
//!
//! ## Доступные наборы
//!
//! ### Classic Suite (по умолчанию)
//! - **AEAD**: ChaCha20-Poly1305, 96-bit nonce
//! - **KDF**: HKDF-SHA256
//! - **Suite ID**: 1
//!
//! ### AES-GCM Suite
//! - **AEAD**: AES-256-GCM, 96-bit nonce
//! - **KDF**: HKDF-SHA256
//! - **Suite ID**: 2
//!
//! ## Выбор suite
//!
//! ```rust
//! use schoolchat_core::crypto::suites::classic::ClassicSuiteProvider;
//! use schoolchat_core::crypto::provider::CryptoProvider;
//!
//! type MySuite = ClassicSuiteProvider;
//! assert_eq!(MySuite::suite_id(), 1);
//! ```

pub mod aes;
pub mod classic;
