//! One-time access tokens for email links.
//!
//! The raw token only ever exists in the link; the store keeps its SHA-256.
//! Redemption is a single conditional update, so two concurrent redeems of
//! the same token cannot both succeed.

use crate::error::{ProtectError, ProtectResult, RedeemError};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use intake_storage::AccessTokenRepository;
use intake_types::{AccessTokenRecord, TokenPurpose};
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Random bytes per raw token.
pub const TOKEN_BYTES: usize = 32;

/// A freshly issued token. `token` is the only copy of the raw value.
#[derive(Clone)]
pub struct IssuedToken {
    pub token: String,
    pub purpose: TokenPurpose,
    pub subject_id: String,
    pub expires_at: DateTime<Utc>,
}

impl fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedToken")
            .field("token", &"[REDACTED]")
            .field("purpose", &self.purpose)
            .field("subject_id", &self.subject_id)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// SHA-256 of a raw token, lowercase hex.
pub fn hash_token(raw_token: &str) -> String {
    hex::encode(Sha256::digest(raw_token.as_bytes()))
}

fn generate_raw_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[derive(Clone)]
pub struct AccessTokenService {
    repo: Arc<dyn AccessTokenRepository>,
}

impl AccessTokenService {
    pub fn new(repo: Arc<dyn AccessTokenRepository>) -> Self {
        Self { repo }
    }

    pub async fn issue(
        &self,
        purpose: TokenPurpose,
        subject_id: &str,
        ttl: Duration,
        issued_by: Option<&str>,
    ) -> ProtectResult<IssuedToken> {
        if ttl <= Duration::zero() {
            return Err(ProtectError::InvalidInput("token ttl must be positive".into()));
        }
        if subject_id.is_empty() {
            return Err(ProtectError::InvalidInput("token subject is empty".into()));
        }

        let now = Utc::now();
        let expires_at = now
            .checked_add_signed(ttl)
            .ok_or_else(|| ProtectError::InvalidInput("token ttl too large".into()))?;

        let token = generate_raw_token();
        let record = AccessTokenRecord {
            id: Uuid::new_v4(),
            token_hash: hash_token(&token),
            purpose,
            subject_id: subject_id.to_string(),
            expires_at,
            used_at: None,
            created_at: now,
            created_by: issued_by.map(str::to_string),
        };
        self.repo.insert_token(&record).await?;

        info!(token_id = %record.id, %purpose, "access token issued");
        Ok(IssuedToken {
            token,
            purpose,
            subject_id: record.subject_id,
            expires_at: record.expires_at,
        })
    }

    /// Consumes a token. Succeeds at most once per token.
    pub async fn redeem(
        &self,
        raw_token: &str,
        expected_purpose: TokenPurpose,
    ) -> Result<AccessTokenRecord, RedeemError> {
        if raw_token.is_empty() {
            return Err(RedeemError::NotFound);
        }
        let token_hash = hash_token(raw_token);
        let now = Utc::now();

        if self
            .repo
            .consume_token(&token_hash, expected_purpose, now)
            .await?
        {
            let record = self
                .repo
                .find_token_by_hash(&token_hash)
                .await?
                .ok_or(RedeemError::NotFound)?;
            info!(token_id = %record.id, purpose = %expected_purpose, "access token redeemed");
            return Ok(record);
        }

        // The update did not apply; read once to say why.
        let record = self.repo.find_token_by_hash(&token_hash).await?;
        let err = classify(record.as_ref(), expected_purpose, now)
            .err()
            .unwrap_or(RedeemError::AlreadyUsed);
        debug!(reason = %err, "access token redeem rejected");
        Err(err)
    }

    /// Checks a token without consuming it, e.g. before rendering a form.
    pub async fn validate(
        &self,
        raw_token: &str,
        expected_purpose: TokenPurpose,
    ) -> Result<AccessTokenRecord, RedeemError> {
        if raw_token.is_empty() {
            return Err(RedeemError::NotFound);
        }
        let record = self.repo.find_token_by_hash(&hash_token(raw_token)).await?;
        classify(record.as_ref(), expected_purpose, Utc::now())?;
        record.ok_or(RedeemError::NotFound)
    }

    /// Deletes rows that expired or were used before `older_than`.
    pub async fn purge_expired(&self, older_than: DateTime<Utc>) -> ProtectResult<usize> {
        let removed = self.repo.purge_tokens(older_than).await?;
        if removed > 0 {
            info!(removed, "purged stale access tokens");
        }
        Ok(removed)
    }
}

fn classify(
    record: Option<&AccessTokenRecord>,
    expected_purpose: TokenPurpose,
    now: DateTime<Utc>,
) -> Result<(), RedeemError> {
    let Some(record) = record else {
        return Err(RedeemError::NotFound);
    };
    if record.is_used() {
        return Err(RedeemError::AlreadyUsed);
    }
    if record.is_expired_at(now) {
        return Err(RedeemError::Expired);
    }
    if record.purpose != expected_purpose {
        return Err(RedeemError::PurposeMismatch);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_tokens_are_url_safe_and_unique() {
        let a = generate_raw_token();
        let b = generate_raw_token();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn hash_is_sha256_hex() {
        assert_eq!(
            hash_token("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn issued_token_debug_hides_raw_value() {
        let issued = IssuedToken {
            token: "super-secret-raw".into(),
            purpose: TokenPurpose::PasswordSetup,
            subject_id: "user-1".into(),
            expires_at: Utc::now(),
        };
        assert!(!format!("{issued:?}").contains("super-secret-raw"));
    }
}
