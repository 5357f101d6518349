//! Document ingest and egress.
//!
//! Ingest encrypts bytes before they reach the blob store and writes the
//! metadata record only once the blob is durable. Egress decrypts objects
//! whose key carries the `.enc` marker and passes legacy objects through
//! untouched.

use crate::audit::AuditRecorder;
use crate::error::{DocumentError, ProtectResult};
use crate::naming::standard_file_name;
use chrono::Utc;
use intake_blobstore::BlobStore;
use intake_crypto::FieldCipher;
use intake_storage::DocumentRepository;
use intake_types::{is_encrypted_key, DocumentRecord, ENCRYPTED_KEY_SUFFIX};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

const FALLBACK_MIME: &str = "application/octet-stream";

/// An upload awaiting ingest.
#[derive(Clone)]
pub struct NewDocument {
    pub owner_id: String,
    pub doc_type: String,
    pub tax_year: Option<i32>,
    /// Whose document this is, for the display name (e.g. the client's name).
    pub subject: String,
    pub original_file_name: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl fmt::Debug for NewDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewDocument")
            .field("owner_id", &self.owner_id)
            .field("doc_type", &self.doc_type)
            .field("tax_year", &self.tax_year)
            .field("mime_type", &self.mime_type)
            .field("len", &self.data.len())
            .finish_non_exhaustive()
    }
}

/// Plaintext document bytes ready to stream to a client.
#[derive(Clone, PartialEq, Eq)]
pub struct DecryptedDocument {
    pub file_name: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl fmt::Debug for DecryptedDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecryptedDocument")
            .field("file_name", &self.file_name)
            .field("mime_type", &self.mime_type)
            .field("len", &self.data.len())
            .finish()
    }
}

pub struct DocumentService {
    cipher: FieldCipher,
    blobs: Arc<dyn BlobStore>,
    records: Arc<dyn DocumentRepository>,
    audit: AuditRecorder,
}

impl DocumentService {
    pub fn new(
        cipher: FieldCipher,
        blobs: Arc<dyn BlobStore>,
        records: Arc<dyn DocumentRepository>,
        audit: AuditRecorder,
    ) -> Self {
        Self {
            cipher,
            blobs,
            records,
            audit,
        }
    }

    /// Encrypts and stores an upload, then records its metadata.
    ///
    /// The record keeps the original MIME type and plaintext size. If the
    /// record cannot be written the blob is removed again.
    pub async fn ingest(&self, doc: NewDocument) -> ProtectResult<DocumentRecord> {
        let display_name = standard_file_name(
            doc.tax_year,
            &doc.doc_type,
            &doc.subject,
            &doc.original_file_name,
        );
        let id = Uuid::new_v4();
        let storage_key = format!(
            "clients/{}/documents/{id}_{display_name}{ENCRYPTED_KEY_SUFFIX}",
            doc.owner_id
        );

        let size_bytes = doc.data.len() as u64;
        let encrypted = self.cipher.encrypt_buffer(&doc.data)?;
        drop(doc.data);

        let stored = self.blobs.put(encrypted, &storage_key, false).await?;
        debug!(document_id = %id, stored = stored.size, "encrypted blob written");

        let record = DocumentRecord {
            id,
            owner_id: doc.owner_id,
            title: display_name,
            doc_type: doc.doc_type,
            tax_year: doc.tax_year,
            mime_type: doc.mime_type,
            size_bytes,
            storage_key,
            storage_url: stored.url,
            created_at: Utc::now(),
        };

        if let Err(e) = self.records.insert_document(&record).await {
            if let Err(cleanup) = self.blobs.delete(&record.storage_key).await {
                warn!(
                    document_id = %id,
                    error = %cleanup,
                    "orphaned blob left after failed metadata write"
                );
            }
            return Err(e.into());
        }

        info!(document_id = %id, size_bytes, "document ingested");
        Ok(record)
    }

    /// Loads and, if encrypted, decrypts a document by id.
    pub async fn retrieve(&self, document_id: Uuid) -> Result<DecryptedDocument, DocumentError> {
        let record = self.record(document_id).await?;
        let data = self.fetch(&record.storage_key).await?;
        Ok(DecryptedDocument {
            file_name: record.title,
            mime_type: record.mime_type,
            data,
        })
    }

    /// Egress by storage key. Works for keys without a metadata record.
    pub async fn retrieve_by_key(
        &self,
        storage_key: &str,
    ) -> Result<DecryptedDocument, DocumentError> {
        let record = self.records.get_document_by_key(storage_key).await?;
        let data = self.fetch(storage_key).await?;

        let (file_name, mime_type) = match record {
            Some(r) => (r.title, r.mime_type),
            None => (file_name_from_key(storage_key), FALLBACK_MIME.to_string()),
        };
        Ok(DecryptedDocument {
            file_name,
            mime_type,
            data,
        })
    }

    /// [`retrieve`](Self::retrieve) on behalf of `actor`, with an audit entry.
    pub async fn download(
        &self,
        actor: &str,
        document_id: Uuid,
    ) -> Result<DecryptedDocument, DocumentError> {
        let doc = self.retrieve(document_id).await?;
        self.audit
            .record_document_access(actor, document_id, "download")
            .await;
        Ok(doc)
    }

    /// Removes the blob, then the record. A blob that is already gone does
    /// not block removing the record.
    pub async fn delete(&self, actor: &str, document_id: Uuid) -> Result<(), DocumentError> {
        let record = self.record(document_id).await?;

        match self.blobs.delete(&record.storage_key).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                warn!(document_id = %document_id, "blob already missing on delete")
            }
            Err(e) => return Err(e.into()),
        }
        self.records.delete_document(document_id).await?;
        self.audit
            .record_document_access(actor, document_id, "delete")
            .await;
        info!(document_id = %document_id, "document deleted");
        Ok(())
    }

    pub async fn list_for_owner(&self, owner_id: &str) -> ProtectResult<Vec<DocumentRecord>> {
        Ok(self.records.list_documents_for_owner(owner_id).await?)
    }

    /// Direct download URL for documents stored before encryption.
    pub async fn legacy_signed_url(
        &self,
        document_id: Uuid,
        ttl: Duration,
    ) -> Result<String, DocumentError> {
        let record = self.record(document_id).await?;
        if record.is_encrypted() {
            return Err(DocumentError::RequiresDecryption(document_id.to_string()));
        }
        Ok(self.blobs.signed_url(&record.storage_key, ttl).await?)
    }

    async fn record(&self, document_id: Uuid) -> Result<DocumentRecord, DocumentError> {
        self.records
            .get_document(document_id)
            .await?
            .ok_or_else(|| DocumentError::NotFound(document_id.to_string()))
    }

    async fn fetch(&self, storage_key: &str) -> Result<Vec<u8>, DocumentError> {
        let bytes = self.blobs.get(storage_key).await?;
        if !is_encrypted_key(storage_key) {
            return Ok(bytes);
        }
        self.cipher.decrypt_buffer(&bytes).map_err(|e| {
            warn!(storage_key, error = %e, "stored document failed to decrypt");
            DocumentError::Corrupted(storage_key.to_string())
        })
    }
}

fn file_name_from_key(storage_key: &str) -> String {
    let name = storage_key.rsplit('/').next().unwrap_or(storage_key);
    name.strip_suffix(ENCRYPTED_KEY_SUFFIX)
        .unwrap_or(name)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_from_key_strips_prefix_and_marker() {
        assert_eq!(
            file_name_from_key("clients/1/documents/abc_2024_W2_Jane.pdf.enc"),
            "abc_2024_W2_Jane.pdf"
        );
        assert_eq!(file_name_from_key("legacy/scan.pdf"), "scan.pdf");
        assert_eq!(file_name_from_key("flat.pdf"), "flat.pdf");
    }
}
