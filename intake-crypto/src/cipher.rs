//! AES-256-GCM field and buffer encryption.
//!
//! Blob layout: `[16 bytes: IV][64 bytes: salt][16 bytes: tag][N bytes: ciphertext]`.
//!
//! The salt is random per call and carried in every blob, but the key is
//! always the one derived from the fixed application salt. Existing data was
//! written that way, so decryption ignores the stored salt.
//!
//! Strings travel as standard base64 of the layout; buffers as raw bytes.

use crate::error::{CryptoError, CryptoResult};
use crate::key::DerivedKey;
use aes_gcm::aead::consts::U16;
use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::aes::Aes256;
use aes_gcm::{AesGcm, Key};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rand::RngCore;
use std::fmt;

pub const IV_SIZE: usize = 16;
pub const SALT_SIZE: usize = 64;
pub const TAG_SIZE: usize = 16;

/// Bytes preceding the ciphertext.
pub const HEADER_SIZE: usize = IV_SIZE + SALT_SIZE + TAG_SIZE;

/// AES-256-GCM with a 128-bit IV.
type Aes256Gcm16 = AesGcm<Aes256, U16>;

// ============================================================================
// EncryptedBlob
// ============================================================================

/// Parsed view of the canonical blob layout.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncryptedBlob {
    pub iv: [u8; IV_SIZE],
    /// Carried for format compatibility; never used to derive a key.
    pub salt: [u8; SALT_SIZE],
    pub tag: [u8; TAG_SIZE],
    pub ciphertext: Vec<u8>,
}

impl EncryptedBlob {
    /// Splits raw blob bytes into their fields.
    pub fn parse(bytes: &[u8]) -> CryptoResult<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(CryptoError::Decryption(format!(
                "blob too short: {} bytes, need at least {HEADER_SIZE}",
                bytes.len()
            )));
        }

        let (iv, rest) = bytes.split_at(IV_SIZE);
        let (salt, rest) = rest.split_at(SALT_SIZE);
        let (tag, ciphertext) = rest.split_at(TAG_SIZE);

        let mut blob = Self {
            iv: [0u8; IV_SIZE],
            salt: [0u8; SALT_SIZE],
            tag: [0u8; TAG_SIZE],
            ciphertext: ciphertext.to_vec(),
        };
        blob.iv.copy_from_slice(iv);
        blob.salt.copy_from_slice(salt);
        blob.tag.copy_from_slice(tag);
        Ok(blob)
    }

    /// Concatenates the fields in canonical order.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_SIZE + self.ciphertext.len());
        out.extend_from_slice(&self.iv);
        out.extend_from_slice(&self.salt);
        out.extend_from_slice(&self.tag);
        out.extend_from_slice(&self.ciphertext);
        out
    }

    pub fn from_base64(encoded: &str) -> CryptoResult<Self> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|_| CryptoError::Decryption("blob is not valid base64".to_string()))?;
        Self::parse(&bytes)
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.to_bytes())
    }
}

// ============================================================================
// FieldCipher
// ============================================================================

/// Authenticated encryption of PII strings and file payloads.
///
/// Stateless apart from the key schedule; share it behind an `Arc`.
#[derive(Clone)]
pub struct FieldCipher {
    aead: Aes256Gcm16,
}

impl fmt::Debug for FieldCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldCipher").finish_non_exhaustive()
    }
}

impl FieldCipher {
    pub fn new(key: &DerivedKey) -> Self {
        Self {
            aead: Aes256Gcm16::new(Key::<Aes256Gcm16>::from_slice(key.as_bytes())),
        }
    }

    /// Encrypts a string into a base64 blob. Empty input yields `None`.
    pub fn encrypt_string(&self, plaintext: &str) -> CryptoResult<Option<String>> {
        if plaintext.is_empty() {
            return Ok(None);
        }
        let blob = self.seal(plaintext.as_bytes())?;
        Ok(Some(blob.to_base64()))
    }

    /// Decrypts a base64 blob produced by [`encrypt_string`](Self::encrypt_string).
    /// Empty input yields `None`.
    pub fn decrypt_string(&self, encoded: &str) -> CryptoResult<Option<String>> {
        if encoded.is_empty() {
            return Ok(None);
        }
        let blob = EncryptedBlob::from_base64(encoded)?;
        let plaintext = self.open(blob)?;
        String::from_utf8(plaintext)
            .map(Some)
            .map_err(|_| CryptoError::Decryption("plaintext is not valid UTF-8".to_string()))
    }

    /// [`encrypt_string`](Self::encrypt_string) for optional columns.
    pub fn encrypt_optional(&self, plaintext: Option<&str>) -> CryptoResult<Option<String>> {
        match plaintext {
            Some(s) => self.encrypt_string(s),
            None => Ok(None),
        }
    }

    /// [`decrypt_string`](Self::decrypt_string) for optional columns.
    pub fn decrypt_optional(&self, encoded: Option<&str>) -> CryptoResult<Option<String>> {
        match encoded {
            Some(s) => self.decrypt_string(s),
            None => Ok(None),
        }
    }

    /// Encrypts an arbitrary byte payload. Empty payloads are valid.
    pub fn encrypt_buffer(&self, data: &[u8]) -> CryptoResult<Vec<u8>> {
        Ok(self.seal(data)?.to_bytes())
    }

    /// Decrypts bytes produced by [`encrypt_buffer`](Self::encrypt_buffer).
    pub fn decrypt_buffer(&self, data: &[u8]) -> CryptoResult<Vec<u8>> {
        let blob = EncryptedBlob::parse(data)?;
        self.open(blob)
    }

    fn seal(&self, plaintext: &[u8]) -> CryptoResult<EncryptedBlob> {
        let mut rng = rand::rng();
        let mut iv = [0u8; IV_SIZE];
        let mut salt = [0u8; SALT_SIZE];
        rng.fill_bytes(&mut iv);
        rng.fill_bytes(&mut salt);

        let mut buffer = plaintext.to_vec();
        let tag = self
            .aead
            .encrypt_in_place_detached(GenericArray::from_slice(&iv), b"", &mut buffer)
            .map_err(|_| CryptoError::Encryption("AES-GCM seal failed".to_string()))?;

        let mut tag_bytes = [0u8; TAG_SIZE];
        tag_bytes.copy_from_slice(tag.as_slice());

        Ok(EncryptedBlob {
            iv,
            salt,
            tag: tag_bytes,
            ciphertext: buffer,
        })
    }

    fn open(&self, blob: EncryptedBlob) -> CryptoResult<Vec<u8>> {
        let EncryptedBlob {
            iv, tag, ciphertext, ..
        } = blob;
        let mut buffer = ciphertext;
        self.aead
            .decrypt_in_place_detached(
                GenericArray::from_slice(&iv),
                b"",
                &mut buffer,
                GenericArray::from_slice(&tag),
            )
            .map_err(|_| {
                CryptoError::Decryption(
                    "authentication failed (wrong key or tampered data)".to_string(),
                )
            })?;
        Ok(buffer)
    }
}
