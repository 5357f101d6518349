//! Shared fixtures and fault-injecting collaborators.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use intake_blobstore::{BlobStore, BlobStoreError, BlobStoreResult, LocalBlobStore, StoredObject};
use intake_crypto::{KdfParams, KeyProvider};
use intake_protect::{AuditRecorder, DocumentService, NewDocument};
use intake_storage::{
    AccessTokenRepository, AuditRepository, DocumentRepository, RecordStore, StorageError,
    StorageResult,
};
use intake_types::{AccessTokenRecord, AuditEntry, DocumentRecord, TokenPurpose};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

pub const FIELD_SECRET: &str = "correct-horse-battery-staple-0123456789";
pub const TOKEN_SECRET: &str = "a1b2c3d4e5f60718293a4b5c6d7e8f90a1b2c3d4e5f60718293a4b5c6d7e8f90";

/// Keys with a low iteration count so tests stay fast.
pub fn test_keys() -> KeyProvider {
    KeyProvider::with_params(FIELD_SECRET, TOKEN_SECRET, &KdfParams::with_iterations(1_000))
        .expect("test secrets are valid")
}

pub struct DocumentFixture {
    pub service: DocumentService,
    pub blobs: Arc<LocalBlobStore>,
    pub records: RecordStore,
    pub audit: AuditRecorder,
}

pub fn document_fixture() -> DocumentFixture {
    let blobs = Arc::new(LocalBlobStore::open_in_memory().expect("in-memory blobs"));
    let records = RecordStore::open_in_memory().expect("in-memory records");
    let audit = AuditRecorder::new(Arc::new(records.clone()));
    let service = DocumentService::new(
        test_keys().field_cipher(),
        blobs.clone(),
        Arc::new(records.clone()),
        audit.clone(),
    );
    DocumentFixture {
        service,
        blobs,
        records,
        audit,
    }
}

pub fn w2_upload(owner_id: &str, data: &[u8]) -> NewDocument {
    NewDocument {
        owner_id: owner_id.to_string(),
        doc_type: "w2".to_string(),
        tax_year: Some(2024),
        subject: "Jane Doe".to_string(),
        original_file_name: "scan_0001.PDF".to_string(),
        mime_type: "application/pdf".to_string(),
        data: data.to_vec(),
    }
}

pub fn sample_pdf() -> Vec<u8> {
    let mut bytes = b"%PDF-1.7\n".to_vec();
    bytes.extend((0..2048u32).map(|i| (i % 251) as u8));
    bytes.extend_from_slice(b"\n%%EOF\n");
    bytes
}

// ── Fault injection ──

/// Blob store whose every operation fails.
pub struct UnavailableBlobStore;

#[async_trait]
impl BlobStore for UnavailableBlobStore {
    async fn put(
        &self,
        _data: Vec<u8>,
        _path: &str,
        _is_public: bool,
    ) -> BlobStoreResult<StoredObject> {
        Err(BlobStoreError::Storage("bucket unreachable".into()))
    }

    async fn get(&self, _path: &str) -> BlobStoreResult<Vec<u8>> {
        Err(BlobStoreError::Storage("bucket unreachable".into()))
    }

    async fn delete(&self, _path: &str) -> BlobStoreResult<()> {
        Err(BlobStoreError::Storage("bucket unreachable".into()))
    }

    async fn signed_url(&self, _path: &str, _ttl: Duration) -> BlobStoreResult<String> {
        Err(BlobStoreError::Storage("bucket unreachable".into()))
    }
}

/// Record store that refuses every write.
pub struct ReadOnlyRecords;

#[async_trait]
impl DocumentRepository for ReadOnlyRecords {
    async fn insert_document(&self, _record: &DocumentRecord) -> StorageResult<()> {
        Err(StorageError::LockPoisoned)
    }

    async fn get_document(&self, _id: Uuid) -> StorageResult<Option<DocumentRecord>> {
        Ok(None)
    }

    async fn get_document_by_key(&self, _key: &str) -> StorageResult<Option<DocumentRecord>> {
        Ok(None)
    }

    async fn list_documents_for_owner(&self, _owner: &str) -> StorageResult<Vec<DocumentRecord>> {
        Ok(Vec::new())
    }

    async fn delete_document(&self, _id: Uuid) -> StorageResult<bool> {
        Err(StorageError::LockPoisoned)
    }
}

#[async_trait]
impl AuditRepository for ReadOnlyRecords {
    async fn append_audit(&self, _entry: &AuditEntry) -> StorageResult<()> {
        Err(StorageError::LockPoisoned)
    }

    async fn audit_for_entity(&self, _entity: &str, _id: &str) -> StorageResult<Vec<AuditEntry>> {
        Ok(Vec::new())
    }
}

#[async_trait]
impl AccessTokenRepository for ReadOnlyRecords {
    async fn insert_token(&self, _record: &AccessTokenRecord) -> StorageResult<()> {
        Err(StorageError::LockPoisoned)
    }

    async fn find_token_by_hash(&self, _hash: &str) -> StorageResult<Option<AccessTokenRecord>> {
        Ok(None)
    }

    async fn consume_token(
        &self,
        _hash: &str,
        _purpose: TokenPurpose,
        _now: DateTime<Utc>,
    ) -> StorageResult<bool> {
        Err(StorageError::LockPoisoned)
    }

    async fn purge_tokens(&self, _cutoff: DateTime<Utc>) -> StorageResult<usize> {
        Err(StorageError::LockPoisoned)
    }
}
