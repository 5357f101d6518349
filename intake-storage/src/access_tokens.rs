//! One-time access token rows.

use crate::error::{StorageError, StorageResult};
use crate::record_store::{from_millis, to_millis, RecordStore};
use crate::repository::AccessTokenRepository;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use duckdb::params;
use intake_types::{AccessTokenRecord, TokenPurpose};
use tracing::debug;
use uuid::Uuid;

const TABLE: &str = "access_tokens";

struct TokenRow {
    id: String,
    token_hash: String,
    purpose: String,
    subject_id: String,
    expires_at: i64,
    used_at: Option<i64>,
    created_at: i64,
    created_by: Option<String>,
}

impl TryFrom<TokenRow> for AccessTokenRecord {
    type Error = StorageError;

    fn try_from(row: TokenRow) -> StorageResult<Self> {
        let corrupt = |reason: String| StorageError::CorruptRow {
            table: TABLE,
            reason,
        };
        Ok(AccessTokenRecord {
            id: row
                .id
                .parse::<Uuid>()
                .map_err(|e| corrupt(format!("bad id: {e}")))?,
            token_hash: row.token_hash,
            purpose: row
                .purpose
                .parse::<TokenPurpose>()
                .map_err(|e| corrupt(e.to_string()))?,
            subject_id: row.subject_id,
            expires_at: from_millis(TABLE, row.expires_at)?,
            used_at: row.used_at.map(|ms| from_millis(TABLE, ms)).transpose()?,
            created_at: from_millis(TABLE, row.created_at)?,
            created_by: row.created_by,
        })
    }
}

#[async_trait]
impl AccessTokenRepository for RecordStore {
    async fn insert_token(&self, record: &AccessTokenRecord) -> StorageResult<()> {
        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT INTO access_tokens (
                id, token_hash, purpose, subject_id,
                expires_at, used_at, created_at, created_by
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                record.id.to_string(),
                record.token_hash,
                record.purpose.as_str(),
                record.subject_id,
                to_millis(record.expires_at),
                record.used_at.map(to_millis),
                to_millis(record.created_at),
                record.created_by,
            ],
        )?;
        Ok(())
    }

    async fn find_token_by_hash(
        &self,
        token_hash: &str,
    ) -> StorageResult<Option<AccessTokenRecord>> {
        let conn = self.lock()?;
        let result = conn.query_row(
            "SELECT id, token_hash, purpose, subject_id, expires_at, used_at, created_at, created_by \
             FROM access_tokens WHERE token_hash = ?",
            params![token_hash],
            |row| {
                Ok(TokenRow {
                    id: row.get(0)?,
                    token_hash: row.get(1)?,
                    purpose: row.get(2)?,
                    subject_id: row.get(3)?,
                    expires_at: row.get(4)?,
                    used_at: row.get(5)?,
                    created_at: row.get(6)?,
                    created_by: row.get(7)?,
                })
            },
        );

        match result {
            Ok(row) => Ok(Some(row.try_into()?)),
            Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn consume_token(
        &self,
        token_hash: &str,
        purpose: TokenPurpose,
        now: DateTime<Utc>,
    ) -> StorageResult<bool> {
        let now_ms = to_millis(now);
        let conn = self.lock()?;
        let affected = conn.execute(
            "UPDATE access_tokens SET used_at = ? \
             WHERE token_hash = ? AND used_at IS NULL AND expires_at > ? AND purpose = ?",
            params![now_ms, token_hash, now_ms, purpose.as_str()],
        )?;
        debug!(affected, "conditional token consume");
        Ok(affected == 1)
    }

    async fn purge_tokens(&self, cutoff: DateTime<Utc>) -> StorageResult<usize> {
        let cutoff_ms = to_millis(cutoff);
        let conn = self.lock()?;
        let removed = conn.execute(
            "DELETE FROM access_tokens WHERE expires_at <= ? OR (used_at IS NOT NULL AND used_at <= ?)",
            params![cutoff_ms, cutoff_ms],
        )?;
        Ok(removed)
    }
}
