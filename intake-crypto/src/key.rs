//! Key derivation and the process-wide key provider.
//!
//! The field key is derived from the operator secret with PBKDF2-HMAC-SHA512
//! over a fixed application salt. It has to be deterministic: anything
//! encrypted under a secret stays decryptable for as long as that secret is
//! configured. Changing the secret orphans every existing blob.

use crate::cipher::FieldCipher;
use crate::error::{CryptoError, CryptoResult};
use crate::url_token::UrlTokenCodec;
use rand::RngCore;
use sha2::{Digest, Sha256, Sha512};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of every symmetric key in bytes (AES-256).
pub const KEY_SIZE: usize = 32;

/// Minimum length, in characters, of the field encryption secret.
pub const MIN_SECRET_LEN: usize = 32;

/// Application-wide PBKDF2 salt. Never varies per record.
pub const FIELD_KEY_SALT: &[u8] = b"intake-pii-field-encryption-salt";

/// Iteration count used for every production derivation.
pub const DEFAULT_ITERATIONS: u32 = 100_000;

/// PBKDF2 parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KdfParams {
    pub iterations: u32,
}

impl KdfParams {
    /// Custom iteration count. Tests only; data encrypted under a non-default
    /// count is unreadable by a default-configured process.
    pub fn with_iterations(iterations: u32) -> Self {
        Self {
            iterations: iterations.max(1),
        }
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
        }
    }
}

// ============================================================================
// DerivedKey
// ============================================================================

/// 256-bit key for the field/buffer cipher. Zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey {
    bytes: [u8; KEY_SIZE],
}

impl DerivedKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DerivedKey([REDACTED])")
    }
}

/// Derives the field key from operator-supplied secret material.
///
/// Fails with [`CryptoError::Configuration`] when the secret is shorter than
/// [`MIN_SECRET_LEN`] characters.
pub fn derive_key(secret_material: &str, params: &KdfParams) -> CryptoResult<DerivedKey> {
    let len = secret_material.chars().count();
    if len < MIN_SECRET_LEN {
        return Err(CryptoError::Configuration(format!(
            "encryption secret must be at least {MIN_SECRET_LEN} characters (got {len})"
        )));
    }

    let mut bytes = [0u8; KEY_SIZE];
    pbkdf2::pbkdf2_hmac::<Sha512>(
        secret_material.as_bytes(),
        FIELD_KEY_SALT,
        params.iterations,
        &mut bytes,
    );
    let key = DerivedKey::from_bytes(bytes);
    bytes.zeroize();
    Ok(key)
}

/// Generates a random key. Used by tests and by callers that manage their
/// own key material.
pub fn generate_random_key() -> DerivedKey {
    let mut bytes = [0u8; KEY_SIZE];
    rand::rng().fill_bytes(&mut bytes);
    DerivedKey::from_bytes(bytes)
}

// ============================================================================
// TokenKey
// ============================================================================

/// Independent 256-bit key for the URL token codec. Zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct TokenKey {
    bytes: [u8; KEY_SIZE],
}

impl TokenKey {
    /// Builds the token key from its configured secret.
    ///
    /// A 64-character hex string is used as the raw key. Any other non-empty
    /// value is hashed with SHA-256 so degraded configurations keep working;
    /// the result is deterministic for a given secret.
    pub fn from_secret(secret: &str) -> CryptoResult<Self> {
        let secret = secret.trim();
        if secret.is_empty() {
            return Err(CryptoError::Configuration(
                "token secret must not be empty".to_string(),
            ));
        }

        let mut bytes = [0u8; KEY_SIZE];
        if secret.len() == KEY_SIZE * 2 && hex::decode_to_slice(secret, &mut bytes).is_ok() {
            return Ok(Self { bytes });
        }

        bytes.copy_from_slice(&Sha256::digest(secret.as_bytes()));
        Ok(Self { bytes })
    }

    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl fmt::Debug for TokenKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TokenKey([REDACTED])")
    }
}

// ============================================================================
// KeyProvider
// ============================================================================

/// Owns both keys for the lifetime of the process.
///
/// Built once at startup and shared by reference; the cipher and the token
/// codec are constructed from it rather than reaching for global state.
#[derive(Clone, Debug)]
pub struct KeyProvider {
    field_key: DerivedKey,
    token_key: TokenKey,
}

impl KeyProvider {
    /// Derives both keys from their secrets using production parameters.
    pub fn new(field_secret: &str, token_secret: &str) -> CryptoResult<Self> {
        Self::with_params(field_secret, token_secret, &KdfParams::default())
    }

    pub fn with_params(
        field_secret: &str,
        token_secret: &str,
        params: &KdfParams,
    ) -> CryptoResult<Self> {
        Ok(Self {
            field_key: derive_key(field_secret, params)?,
            token_key: TokenKey::from_secret(token_secret)?,
        })
    }

    pub fn from_keys(field_key: DerivedKey, token_key: TokenKey) -> Self {
        Self {
            field_key,
            token_key,
        }
    }

    pub fn field_key(&self) -> &DerivedKey {
        &self.field_key
    }

    pub fn token_key(&self) -> &TokenKey {
        &self.token_key
    }

    pub fn field_cipher(&self) -> FieldCipher {
        FieldCipher::new(&self.field_key)
    }

    pub fn url_token_codec(&self) -> UrlTokenCodec {
        UrlTokenCodec::new(&self.token_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "0123456789abcdef0123456789abcdef-intake";

    fn fast() -> KdfParams {
        KdfParams::with_iterations(1_000)
    }

    #[test]
    fn short_secret_rejected() {
        let err = derive_key("too-short", &fast()).unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("at least 32"));
    }

    #[test]
    fn exactly_minimum_length_accepted() {
        let secret = "x".repeat(MIN_SECRET_LEN);
        assert!(derive_key(&secret, &fast()).is_ok());
    }

    #[test]
    fn minimum_counts_characters_not_bytes() {
        // 31 two-byte characters is 62 bytes but still too short
        let secret = "é".repeat(MIN_SECRET_LEN - 1);
        assert!(derive_key(&secret, &fast()).is_err());
    }

    #[test]
    fn derivation_is_deterministic() {
        let a = derive_key(SECRET, &fast()).unwrap();
        let b = derive_key(SECRET, &fast()).unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn default_params_are_deterministic() {
        let a = derive_key(SECRET, &KdfParams::default()).unwrap();
        let b = derive_key(SECRET, &KdfParams::default()).unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn different_secrets_different_keys() {
        let a = derive_key(SECRET, &fast()).unwrap();
        let b = derive_key(&format!("{SECRET}!"), &fast()).unwrap();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn iteration_count_changes_key() {
        let a = derive_key(SECRET, &KdfParams::with_iterations(1_000)).unwrap();
        let b = derive_key(SECRET, &KdfParams::with_iterations(1_001)).unwrap();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn debug_output_is_redacted() {
        let key = derive_key(SECRET, &fast()).unwrap();
        let shown = format!("{key:?}");
        assert_eq!(shown, "DerivedKey([REDACTED])");
    }

    #[test]
    fn token_key_accepts_hex() {
        let hex_secret = "ab".repeat(KEY_SIZE);
        let key = TokenKey::from_secret(&hex_secret).unwrap();
        assert_eq!(key.as_bytes(), &[0xAB; KEY_SIZE]);
    }

    #[test]
    fn token_key_rederives_non_hex() {
        let a = TokenKey::from_secret("not-a-hex-secret").unwrap();
        let b = TokenKey::from_secret("not-a-hex-secret").unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());
        assert_eq!(
            a.as_bytes().as_slice(),
            Sha256::digest(b"not-a-hex-secret").as_slice()
        );
    }

    #[test]
    fn token_key_rederives_wrong_length_hex() {
        let key = TokenKey::from_secret("abcdef").unwrap();
        assert_eq!(key.as_bytes().as_slice(), Sha256::digest(b"abcdef").as_slice());
    }

    #[test]
    fn token_key_rejects_empty() {
        assert!(TokenKey::from_secret("   ").unwrap_err().is_configuration());
    }

    #[test]
    fn provider_keys_are_independent() {
        let provider = KeyProvider::with_params(SECRET, SECRET, &fast()).unwrap();
        assert_ne!(
            provider.field_key().as_bytes(),
            provider.token_key().as_bytes()
        );
    }
}
