//! PII column helpers: encrypt on write, audited reveal on read.

use crate::audit::AuditRecorder;
use crate::error::ProtectResult;
use intake_crypto::mask::last_four_opt;
use intake_crypto::{masked_display, FieldCipher};
use std::fmt;
use tracing::warn;

/// Display text when a stored value cannot be decrypted.
pub const UNAVAILABLE_TEXT: &str = "value unavailable";

/// What gets persisted for one PII column pair (`x_encrypted`, `x_last4`).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProtectedField {
    pub encrypted: Option<String>,
    pub last4: Option<String>,
}

impl ProtectedField {
    /// `•••• 6789`, without decrypting.
    pub fn masked(&self) -> String {
        masked_display(self.last4.as_deref())
    }
}

/// Outcome of revealing a stored value.
#[derive(Clone, PartialEq, Eq)]
pub enum RevealedValue {
    Value(String),
    /// Stored blob exists but did not decrypt.
    Unavailable,
    /// Nothing stored.
    Empty,
}

impl RevealedValue {
    pub fn as_deref(&self) -> Option<&str> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Debug for RevealedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(_) => f.write_str("Value([REDACTED])"),
            Self::Unavailable => f.write_str("Unavailable"),
            Self::Empty => f.write_str("Empty"),
        }
    }
}

impl fmt::Display for RevealedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => f.write_str(v),
            Self::Unavailable => f.write_str(UNAVAILABLE_TEXT),
            Self::Empty => Ok(()),
        }
    }
}

#[derive(Clone)]
pub struct PiiService {
    cipher: FieldCipher,
    audit: AuditRecorder,
}

impl PiiService {
    pub fn new(cipher: FieldCipher, audit: AuditRecorder) -> Self {
        Self { cipher, audit }
    }

    /// Encrypts a value and computes its last four from the same plaintext.
    pub fn protect(&self, plaintext: Option<&str>) -> ProtectResult<ProtectedField> {
        Ok(ProtectedField {
            encrypted: self.cipher.encrypt_optional(plaintext)?,
            last4: last_four_opt(plaintext),
        })
    }

    /// Decrypts a stored value for `actor`, recording why.
    ///
    /// The audit entry is written before the decrypt is attempted, so a
    /// reveal of a corrupt value is still on record.
    pub async fn reveal(
        &self,
        actor: &str,
        field: &str,
        entity: &str,
        entity_id: &str,
        reason: &str,
        blob: Option<&str>,
    ) -> RevealedValue {
        let Some(blob) = blob.filter(|b| !b.is_empty()) else {
            return RevealedValue::Empty;
        };

        self.audit
            .record_decryption(actor, field, entity, entity_id, reason)
            .await;

        match self.cipher.decrypt_string(blob) {
            Ok(Some(value)) => RevealedValue::Value(value),
            Ok(None) => RevealedValue::Empty,
            Err(e) => {
                warn!(field, entity, entity_id, error = %e, "stored value failed to decrypt");
                RevealedValue::Unavailable
            }
        }
    }
}
