//! Криптографический модуль
//!
//! # Архитектура
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     MessageComposer                         │
//! └─────────────────────────────────────────────────────────────┘
//!                │                           │
//!                ▼                           ▼
//! ┌───────────────────────────┐  ┌──────────────────────────┐
//! │   KeyProvider             │  │  EncryptionCodec         │
//! │  - per-conversation keys  │  │  - Envelope seal/open    │
//! │  - HKDF derivation        │  │  - fresh nonce per call  │
//! └───────────────────────────┘  └──────────────────────────┘
//!                                            │
//!                                            ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │              CryptoProvider (Crypto-Agility)                │
//! │  - AEAD (ChaCha20-Poly1305, AES-256-GCM)                    │
//! │  - KDF (HKDF-SHA256)                                        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Модули
//!
//! - [`provider`]: CryptoProvider trait для crypto-agility
//! - [`suites`]: Реализации CryptoProvider
//! - [`keys`]: MessageKey и провайдеры ключей
//! - [`codec`]: EncryptionCodec и Envelope

pub mod codec;
pub mod keys;
pub mod provider;
pub mod suites;

pub use codec::{EncryptionCodec, Envelope};
pub use keys::{DerivedKeyProvider, KeyProvider, MessageKey, StaticKeyProvider};
pub use provider::CryptoProvider;

pub type SuiteID = u16;

/// Suite ID for ChaCha20-Poly1305
pub const CLASSIC_SUITE_ID: SuiteID = 1;
/// Suite ID for AES-256-GCM
pub const AES_GCM_SUITE_ID: SuiteID = 2;
