//! Crypto error types.

use thiserror::Error;

/// Result type for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors from key derivation, field/buffer encryption and token encoding.
///
/// Messages never include plaintext or key material.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Missing or unusable key material. Fatal at startup.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("encryption failed: {0}")]
    Encryption(String),

    /// Tampered, truncated or foreign ciphertext, or the wrong key.
    #[error("decryption failed: {0}")]
    Decryption(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl CryptoError {
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    pub fn is_decryption(&self) -> bool {
        matches!(self, Self::Decryption(_))
    }
}
