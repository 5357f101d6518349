//! Record store interfaces used by the protection services.
//!
//! Services hold `Arc<dyn …Repository>` so tests can swap in failing or
//! instrumented stores. [`RecordStore`](crate::RecordStore) implements all
//! three over DuckDB.

use crate::error::StorageResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use intake_types::{AccessTokenRecord, AuditEntry, DocumentRecord, TokenPurpose};
use uuid::Uuid;

#[async_trait]
pub trait DocumentRepository: Send + Sync {
    async fn insert_document(&self, record: &DocumentRecord) -> StorageResult<()>;

    async fn get_document(&self, id: Uuid) -> StorageResult<Option<DocumentRecord>>;

    async fn get_document_by_key(&self, storage_key: &str)
    -> StorageResult<Option<DocumentRecord>>;

    async fn list_documents_for_owner(&self, owner_id: &str) -> StorageResult<Vec<DocumentRecord>>;

    /// Returns false if no row had this id.
    async fn delete_document(&self, id: Uuid) -> StorageResult<bool>;
}

#[async_trait]
pub trait AccessTokenRepository: Send + Sync {
    async fn insert_token(&self, record: &AccessTokenRecord) -> StorageResult<()>;

    async fn find_token_by_hash(&self, token_hash: &str)
    -> StorageResult<Option<AccessTokenRecord>>;

    /// Marks the token used in one conditional update.
    ///
    /// The row only changes if it is unused, unexpired at `now`, and has the
    /// expected purpose. Returns true iff exactly this call consumed it.
    async fn consume_token(
        &self,
        token_hash: &str,
        purpose: TokenPurpose,
        now: DateTime<Utc>,
    ) -> StorageResult<bool>;

    /// Deletes tokens that expired or were used before `cutoff`.
    async fn purge_tokens(&self, cutoff: DateTime<Utc>) -> StorageResult<usize>;
}

#[async_trait]
pub trait AuditRepository: Send + Sync {
    async fn append_audit(&self, entry: &AuditEntry) -> StorageResult<()>;

    async fn audit_for_entity(&self, entity: &str, entity_id: &str)
    -> StorageResult<Vec<AuditEntry>>;
}
