//! DuckDB-backed object store for development and tests.
//!
//! Objects are stored as-is; the caller is responsible for encryption. The
//! content hash is computed over the stored bytes so corruption at rest can
//! be told apart from a decrypt failure.

use crate::{validate_path, BlobStore, BlobStoreError, BlobStoreResult, StoredObject};
use async_trait::async_trait;
use chrono::Utc;
use duckdb::{params, Connection};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;

/// Stored object metadata (without the bytes).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectMetadata {
    pub path: String,
    pub size: u64,
    pub content_hash: String,
    pub is_public: bool,
    pub created_at: i64,
}

pub struct LocalBlobStore {
    conn: Arc<Mutex<Connection>>,
    base_url: String,
}

impl LocalBlobStore {
    /// Open a store backed by a DuckDB file.
    pub fn open(db_path: &Path, base_url: impl Into<String>) -> BlobStoreResult<Self> {
        let conn = if db_path.to_str() == Some(":memory:") {
            Connection::open_in_memory()
        } else {
            Connection::open(db_path)
        }
        .map_err(|e| BlobStoreError::Storage(e.to_string()))?;

        // Cap memory/threads: DuckDB defaults to ~80% RAM per connection
        if db_path.to_str() != Some(":memory:") {
            conn.execute_batch("PRAGMA memory_limit='128MB'; PRAGMA threads=1;")
                .map_err(|e| BlobStoreError::Storage(e.to_string()))?;
        }

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            base_url: base_url.into(),
        };
        store.ensure_tables()?;
        Ok(store)
    }

    /// Open in-memory.
    pub fn open_in_memory() -> BlobStoreResult<Self> {
        Self::open(Path::new(":memory:"), "local://blobs")
    }

    fn ensure_tables(&self) -> BlobStoreResult<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS objects (
                path VARCHAR PRIMARY KEY,
                data BLOB NOT NULL,
                size BIGINT NOT NULL DEFAULT 0,
                content_hash VARCHAR NOT NULL,
                is_public BOOLEAN NOT NULL DEFAULT FALSE,
                created_at BIGINT NOT NULL
            );",
        )
        .map_err(|e| BlobStoreError::Storage(e.to_string()))?;
        Ok(())
    }

    fn lock(&self) -> BlobStoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| BlobStoreError::Storage(e.to_string()))
    }

    fn object_url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url.trim_end_matches('/'))
    }

    /// Metadata for one object.
    pub fn metadata(&self, path: &str) -> BlobStoreResult<ObjectMetadata> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT path, size, content_hash, is_public, created_at FROM objects WHERE path = ?",
            params![path],
            |row| {
                Ok(ObjectMetadata {
                    path: row.get(0)?,
                    size: row.get::<_, i64>(1)?.max(0) as u64,
                    content_hash: row.get(2)?,
                    is_public: row.get(3)?,
                    created_at: row.get(4)?,
                })
            },
        )
        .map_err(|e| match e {
            duckdb::Error::QueryReturnedNoRows => BlobStoreError::NotFound(path.to_string()),
            e => BlobStoreError::Storage(e.to_string()),
        })
    }

    /// Lists object paths under a prefix.
    pub fn list(&self, prefix: &str) -> BlobStoreResult<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT path FROM objects WHERE starts_with(path, ?) ORDER BY path")
            .map_err(|e| BlobStoreError::Storage(e.to_string()))?;

        let paths = stmt
            .query_map(params![prefix], |row| row.get(0))
            .map_err(|e| BlobStoreError::Storage(e.to_string()))?
            .collect::<Result<Vec<String>, _>>()
            .map_err(|e| BlobStoreError::Storage(e.to_string()))?;

        Ok(paths)
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(
        &self,
        data: Vec<u8>,
        path: &str,
        is_public: bool,
    ) -> BlobStoreResult<StoredObject> {
        validate_path(path)?;
        let content_hash = hex::encode(Sha256::digest(&data));
        let size = data.len() as u64;
        let now = Utc::now().timestamp_millis();

        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO objects (path, data, size, content_hash, is_public, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
            params![path, data, size as i64, content_hash, is_public, now],
        )
        .map_err(|e| BlobStoreError::Storage(e.to_string()))?;

        debug!(size, "stored local object {path}");
        Ok(StoredObject {
            url: self.object_url(path),
            path: path.to_string(),
            size,
        })
    }

    async fn get(&self, path: &str) -> BlobStoreResult<Vec<u8>> {
        let conn = self.lock()?;
        let result = conn.query_row(
            "SELECT data FROM objects WHERE path = ?",
            params![path],
            |row| row.get::<_, Vec<u8>>(0),
        );

        match result {
            Ok(data) => Ok(data),
            Err(duckdb::Error::QueryReturnedNoRows) => {
                Err(BlobStoreError::NotFound(path.to_string()))
            }
            Err(e) => Err(BlobStoreError::Storage(e.to_string())),
        }
    }

    async fn delete(&self, path: &str) -> BlobStoreResult<()> {
        let conn = self.lock()?;
        let affected = conn
            .execute("DELETE FROM objects WHERE path = ?", params![path])
            .map_err(|e| BlobStoreError::Storage(e.to_string()))?;

        if affected == 0 {
            return Err(BlobStoreError::NotFound(path.to_string()));
        }
        Ok(())
    }

    /// Local objects have no signing authority; the URL only carries the
    /// expiry for whatever dev server fronts the store.
    async fn signed_url(&self, path: &str, ttl: Duration) -> BlobStoreResult<String> {
        let _ = self.metadata(path)?;
        let expires = i64::try_from(ttl.as_secs())
            .ok()
            .and_then(|secs| Utc::now().timestamp().checked_add(secs))
            .ok_or_else(|| {
                BlobStoreError::Config(format!("signed url ttl out of range: {ttl:?}"))
            })?;
        Ok(format!("{}?expires={expires}", self.object_url(path)))
    }
}
