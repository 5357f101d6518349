//! Encryption layer for the intake platform.
//!
//! Provides:
//! - PBKDF2-HMAC-SHA512 key derivation from the operator secret
//! - AES-256-GCM encryption of PII strings and file payloads
//! - Last-4 masking helpers computed at write time
//! - Stateless encrypted URL tokens for email and portal links
//!
//! # Keys
//!
//! Two independent keys live in a [`KeyProvider`] built once at startup:
//!
//! 1. **Field key**: derived from the field secret with a fixed application
//!    salt. Encrypts PII columns and document bytes.
//!
//! 2. **Token key**: taken from (or hashed out of) the token secret. Only
//!    the URL token codec uses it, so leaking a link never weakens stored PII.

mod cipher;
mod error;
mod key;
pub mod mask;
pub mod url_token;

pub use cipher::{EncryptedBlob, FieldCipher, HEADER_SIZE, IV_SIZE, SALT_SIZE, TAG_SIZE};
pub use error::{CryptoError, CryptoResult};
pub use key::{
    derive_key, generate_random_key, DerivedKey, KdfParams, KeyProvider, TokenKey,
    DEFAULT_ITERATIONS, FIELD_KEY_SALT, KEY_SIZE, MIN_SECRET_LEN,
};
pub use mask::{last_four, masked_display};
pub use url_token::{TokenPayload, UrlTokenCodec};
