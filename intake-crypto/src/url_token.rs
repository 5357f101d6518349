//! Stateless, URL-safe encrypted tokens for link-based flows.
//!
//! Wire format: `<ivHex>.<authTagHex>.<cipherHex>` where the ciphertext is
//! AES-256-GCM (12-byte IV) over a JSON object. Every token embeds a creation
//! `timestamp` (Unix ms) and a random `nonce`, so two tokens for the same
//! payload never match byte for byte.
//!
//! Nothing is tracked server-side. [`UrlTokenCodec::verify`] only proves a
//! token is authentic and well formed; expiry is checked with
//! [`UrlTokenCodec::verify_with_max_age`] so each link kind keeps its own
//! policy. Every failure is `None`: callers cannot and should not tell a
//! malformed token from a forged or stale one.

use crate::error::{CryptoError, CryptoResult};
use crate::key::TokenKey;
use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::{Aes256Gcm, Key};
use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::fmt;
use std::time::Duration;

pub const TOKEN_IV_SIZE: usize = 12;
pub const TOKEN_TAG_SIZE: usize = 16;

/// Payload field holding the creation time in Unix milliseconds.
pub const TIMESTAMP_FIELD: &str = "timestamp";
/// Payload field holding the per-token random nonce.
pub const NONCE_FIELD: &str = "nonce";

const NONCE_BYTES: usize = 8;
/// Tolerated clock drift for tokens minted by another node.
const MAX_FUTURE_SKEW_MS: i64 = 60_000;

/// Decoded token payload.
pub type TokenPayload = Map<String, Value>;

/// Encodes and verifies secure URL tokens with its own key.
#[derive(Clone)]
pub struct UrlTokenCodec {
    aead: Aes256Gcm,
}

impl fmt::Debug for UrlTokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UrlTokenCodec").finish_non_exhaustive()
    }
}

impl UrlTokenCodec {
    pub fn new(key: &TokenKey) -> Self {
        Self {
            aead: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes())),
        }
    }

    /// Encrypts `payload` into a token. Caller fields named `timestamp` or
    /// `nonce` are overwritten.
    pub fn create(&self, payload: &TokenPayload) -> CryptoResult<String> {
        let mut rng = rand::rng();

        let mut nonce = [0u8; NONCE_BYTES];
        rng.fill_bytes(&mut nonce);

        let mut body = payload.clone();
        body.insert(
            TIMESTAMP_FIELD.to_string(),
            Value::from(Utc::now().timestamp_millis()),
        );
        body.insert(NONCE_FIELD.to_string(), Value::from(hex::encode(nonce)));

        let mut buffer = serde_json::to_vec(&body)
            .map_err(|e| CryptoError::Serialization(format!("token payload: {e}")))?;

        let mut iv = [0u8; TOKEN_IV_SIZE];
        rng.fill_bytes(&mut iv);

        let tag = self
            .aead
            .encrypt_in_place_detached(GenericArray::from_slice(&iv), b"", &mut buffer)
            .map_err(|_| CryptoError::Encryption("token seal failed".to_string()))?;

        Ok(format!(
            "{}.{}.{}",
            hex::encode(iv),
            hex::encode(tag),
            hex::encode(buffer)
        ))
    }

    /// Decrypts a token. Returns `None` for anything but an authentic token
    /// carrying a JSON object.
    pub fn verify(&self, token: &str) -> Option<TokenPayload> {
        let segments: Vec<&str> = token.split('.').collect();
        let [iv_hex, tag_hex, cipher_hex] = segments.as_slice() else {
            return None;
        };

        let iv = hex::decode(iv_hex).ok()?;
        let tag = hex::decode(tag_hex).ok()?;
        let mut buffer = hex::decode(cipher_hex).ok()?;
        if iv.len() != TOKEN_IV_SIZE || tag.len() != TOKEN_TAG_SIZE {
            return None;
        }

        self.aead
            .decrypt_in_place_detached(
                GenericArray::from_slice(&iv),
                b"",
                &mut buffer,
                GenericArray::from_slice(&tag),
            )
            .ok()?;

        serde_json::from_slice::<TokenPayload>(&buffer).ok()
    }

    /// [`verify`](Self::verify), then rejects tokens older than `max_age` or
    /// stamped implausibly far in the future.
    pub fn verify_with_max_age(&self, token: &str, max_age: Duration) -> Option<TokenPayload> {
        let payload = self.verify(token)?;
        let issued_ms = payload.get(TIMESTAMP_FIELD)?.as_i64()?;
        let age_ms = Utc::now().timestamp_millis() - issued_ms;

        if age_ms < -MAX_FUTURE_SKEW_MS {
            return None;
        }
        let max_age_ms = i64::try_from(max_age.as_millis()).unwrap_or(i64::MAX);
        if age_ms > max_age_ms {
            return None;
        }
        Some(payload)
    }

    /// Serializes `claims` (which must serialize to a JSON object) into a token.
    pub fn create_claims<T: Serialize>(&self, claims: &T) -> CryptoResult<String> {
        match serde_json::to_value(claims) {
            Ok(Value::Object(map)) => self.create(&map),
            Ok(_) => Err(CryptoError::Serialization(
                "token claims must serialize to a JSON object".to_string(),
            )),
            Err(e) => Err(CryptoError::Serialization(format!("token claims: {e}"))),
        }
    }

    /// Verifies a token with `max_age` and deserializes it into `T`.
    pub fn verify_claims<T: DeserializeOwned>(&self, token: &str, max_age: Duration) -> Option<T> {
        let payload = self.verify_with_max_age(token, max_age)?;
        serde_json::from_value(Value::Object(payload)).ok()
    }
}

/// Creation time embedded in a decoded payload.
pub fn issued_at(payload: &TokenPayload) -> Option<DateTime<Utc>> {
    let ms = payload.get(TIMESTAMP_FIELD)?.as_i64()?;
    DateTime::<Utc>::from_timestamp_millis(ms)
}
