//! Object storage for encrypted documents.
//!
//! The protection layer only assumes byte-for-byte round-tripping, so every
//! backend sits behind the [`BlobStore`] trait:
//!
//! - [`LocalBlobStore`]: DuckDB-backed, for development and tests
//! - [`S3BlobStore`]: AWS S3 (or MinIO via endpoint override)
//!
//! Backends never see plaintext; callers encrypt before `put`.

mod local;
mod s3;

pub use local::LocalBlobStore;
pub use s3::{S3BlobStore, S3Config};

use async_trait::async_trait;
use std::time::Duration;

// ============================================================================
// Error types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum BlobStoreError {
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("invalid object path: {0}")]
    InvalidPath(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl BlobStoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

pub type BlobStoreResult<T> = Result<T, BlobStoreError>;

// ============================================================================
// BlobStore
// ============================================================================

/// Result of a successful `put`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredObject {
    /// Direct URL of the object. Only dereferenceable if the object is public.
    pub url: String,
    pub path: String,
    /// Stored size in bytes (the encrypted size for encrypted documents).
    pub size: u64,
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(
        &self,
        data: Vec<u8>,
        path: &str,
        is_public: bool,
    ) -> BlobStoreResult<StoredObject>;

    /// Fails with [`BlobStoreError::NotFound`] if nothing is stored at `path`.
    async fn get(&self, path: &str) -> BlobStoreResult<Vec<u8>>;

    async fn delete(&self, path: &str) -> BlobStoreResult<()>;

    /// Time-limited URL for direct download of the stored bytes.
    async fn signed_url(&self, path: &str, ttl: Duration) -> BlobStoreResult<String>;
}

/// Rejects paths that could escape a prefix or address nothing.
pub fn validate_path(path: &str) -> BlobStoreResult<()> {
    if path.is_empty() || path.starts_with('/') || path.ends_with('/') {
        return Err(BlobStoreError::InvalidPath(path.to_string()));
    }
    if path
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err(BlobStoreError::InvalidPath(path.to_string()));
    }
    if path.chars().any(|c| c.is_control() || c == '\\') {
        return Err(BlobStoreError::InvalidPath(path.to_string()));
    }
    Ok(())
}
