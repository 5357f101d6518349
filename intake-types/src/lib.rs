//! Shared record types for the intake protection layer.
//!
//! These are the rows the record store persists and the services hand back
//! to callers. None of them carry plaintext PII or raw token values.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Token purposes
// ============================================================================

/// What a one-time access token unlocks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenPurpose {
    /// Portal upload/download of a requested document.
    DocumentRequest,
    /// Client approval of a prepared filing or quote.
    ApprovalRequest,
    /// First-time password setup for an invited client.
    PasswordSetup,
    /// Confirming ownership of an email address.
    EmailVerification,
}

impl TokenPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DocumentRequest => "document_request",
            Self::ApprovalRequest => "approval_request",
            Self::PasswordSetup => "password_setup",
            Self::EmailVerification => "email_verification",
        }
    }
}

impl fmt::Display for TokenPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown token purpose: {0}")]
pub struct UnknownPurpose(pub String);

impl FromStr for TokenPurpose {
    type Err = UnknownPurpose;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "document_request" => Ok(Self::DocumentRequest),
            "approval_request" => Ok(Self::ApprovalRequest),
            "password_setup" => Ok(Self::PasswordSetup),
            "email_verification" => Ok(Self::EmailVerification),
            other => Err(UnknownPurpose(other.to_string())),
        }
    }
}

// ============================================================================
// One-time access tokens
// ============================================================================

/// A persisted one-time access token. Only the SHA-256 of the raw token is kept.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTokenRecord {
    pub id: Uuid,
    /// Lowercase hex SHA-256 of the raw token.
    pub token_hash: String,
    pub purpose: TokenPurpose,
    /// The business object this token grants access to (request, approval, user).
    pub subject_id: String,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<String>,
}

impl AccessTokenRecord {
    pub fn is_used(&self) -> bool {
        self.used_at.is_some()
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

// ============================================================================
// Documents
// ============================================================================

/// Suffix marking a storage key whose object bytes are buffer-encrypted.
pub const ENCRYPTED_KEY_SUFFIX: &str = ".enc";

/// Unencrypted metadata for a stored document.
///
/// `mime_type` and `size_bytes` describe the original upload, not the
/// encrypted object.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: Uuid,
    pub owner_id: String,
    /// Standardized display name, e.g. `2024_W2_Jane_Doe.pdf`.
    pub title: String,
    pub doc_type: String,
    pub tax_year: Option<i32>,
    pub mime_type: String,
    pub size_bytes: u64,
    pub storage_key: String,
    pub storage_url: String,
    pub created_at: DateTime<Utc>,
}

impl DocumentRecord {
    /// Whether egress has to decrypt this document's bytes.
    pub fn is_encrypted(&self) -> bool {
        is_encrypted_key(&self.storage_key)
    }
}

/// Returns true if `storage_key` carries the encryption marker.
pub fn is_encrypted_key(storage_key: &str) -> bool {
    storage_key.ends_with(ENCRYPTED_KEY_SUFFIX)
}

// ============================================================================
// Audit
// ============================================================================

/// An audit event before it has been persisted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub actor: String,
    pub action: String,
    pub entity: String,
    pub entity_id: String,
    #[serde(default)]
    pub details: serde_json::Value,
}

impl AuditEvent {
    pub fn new(
        actor: impl Into<String>,
        action: impl Into<String>,
        entity: impl Into<String>,
        entity_id: impl Into<String>,
    ) -> Self {
        Self {
            actor: actor.into(),
            action: action.into(),
            entity: entity.into(),
            entity_id: entity_id.into(),
            details: serde_json::Value::Null,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }
}

/// A persisted, append-only audit entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub actor: String,
    pub action: String,
    pub entity: String,
    pub entity_id: String,
    pub details: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}
