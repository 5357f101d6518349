//! Document metadata rows.

use crate::error::{StorageError, StorageResult};
use crate::record_store::{from_millis, to_millis, RecordStore};
use crate::repository::DocumentRepository;
use async_trait::async_trait;
use duckdb::params;
use intake_types::DocumentRecord;
use uuid::Uuid;

const TABLE: &str = "documents";

const SELECT_COLUMNS: &str = "SELECT id, owner_id, title, doc_type, tax_year, mime_type, size_bytes, \
     storage_key, storage_url, created_at FROM documents";

struct DocumentRow {
    id: String,
    owner_id: String,
    title: String,
    doc_type: String,
    tax_year: Option<i32>,
    mime_type: String,
    size_bytes: i64,
    storage_key: String,
    storage_url: String,
    created_at: i64,
}

fn read_row(row: &duckdb::Row<'_>) -> duckdb::Result<DocumentRow> {
    Ok(DocumentRow {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        title: row.get(2)?,
        doc_type: row.get(3)?,
        tax_year: row.get(4)?,
        mime_type: row.get(5)?,
        size_bytes: row.get(6)?,
        storage_key: row.get(7)?,
        storage_url: row.get(8)?,
        created_at: row.get(9)?,
    })
}

impl TryFrom<DocumentRow> for DocumentRecord {
    type Error = StorageError;

    fn try_from(row: DocumentRow) -> StorageResult<Self> {
        let id = row.id.parse::<Uuid>().map_err(|e| StorageError::CorruptRow {
            table: TABLE,
            reason: format!("bad id {}: {e}", row.id),
        })?;
        let size_bytes = u64::try_from(row.size_bytes).map_err(|_| StorageError::CorruptRow {
            table: TABLE,
            reason: format!("negative size {} for {id}", row.size_bytes),
        })?;
        Ok(DocumentRecord {
            id,
            owner_id: row.owner_id,
            title: row.title,
            doc_type: row.doc_type,
            tax_year: row.tax_year,
            mime_type: row.mime_type,
            size_bytes,
            storage_key: row.storage_key,
            storage_url: row.storage_url,
            created_at: from_millis(TABLE, row.created_at)?,
        })
    }
}

impl RecordStore {
    fn query_documents(
        &self,
        filter: &str,
        param: &str,
    ) -> StorageResult<Vec<DocumentRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} {filter}"))?;
        let rows = stmt
            .query_map(params![param], read_row)?
            .collect::<duckdb::Result<Vec<_>>>()?;
        rows.into_iter().map(DocumentRecord::try_from).collect()
    }
}

#[async_trait]
impl DocumentRepository for RecordStore {
    async fn insert_document(&self, record: &DocumentRecord) -> StorageResult<()> {
        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT INTO documents (
                id, owner_id, title, doc_type, tax_year,
                mime_type, size_bytes, storage_key, storage_url, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                record.id.to_string(),
                record.owner_id,
                record.title,
                record.doc_type,
                record.tax_year,
                record.mime_type,
                i64::try_from(record.size_bytes).unwrap_or(i64::MAX),
                record.storage_key,
                record.storage_url,
                to_millis(record.created_at),
            ],
        )?;
        Ok(())
    }

    async fn get_document(&self, id: Uuid) -> StorageResult<Option<DocumentRecord>> {
        let mut found = self.query_documents("WHERE id = ?", &id.to_string())?;
        Ok(found.pop())
    }

    async fn get_document_by_key(
        &self,
        storage_key: &str,
    ) -> StorageResult<Option<DocumentRecord>> {
        let mut found = self.query_documents("WHERE storage_key = ? LIMIT 1", storage_key)?;
        Ok(found.pop())
    }

    async fn list_documents_for_owner(&self, owner_id: &str) -> StorageResult<Vec<DocumentRecord>> {
        self.query_documents("WHERE owner_id = ? ORDER BY created_at DESC", owner_id)
    }

    async fn delete_document(&self, id: Uuid) -> StorageResult<bool> {
        let conn = self.lock()?;
        let affected = conn.execute("DELETE FROM documents WHERE id = ?", params![id.to_string()])?;
        Ok(affected > 0)
    }
}
