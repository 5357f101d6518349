//! Protection layer error types.

use intake_blobstore::BlobStoreError;
use intake_crypto::CryptoError;
use intake_storage::StorageError;
use thiserror::Error;

/// Result type for protection layer operations.
pub type ProtectResult<T> = Result<T, ProtectError>;

#[derive(Debug, Error)]
pub enum ProtectError {
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("record store error: {0}")]
    Storage(#[from] StorageError),

    #[error("blob store error: {0}")]
    BlobStore(#[from] BlobStoreError),

    #[error("document error: {0}")]
    Document(#[from] DocumentError),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Failures on the document egress path.
///
/// Missing records and missing blobs are both `NotFound`; a blob that exists
/// but does not decrypt is `Corrupted`.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("document not found: {0}")]
    NotFound(String),

    #[error("document could not be decrypted: {0}")]
    Corrupted(String),

    #[error("document is encrypted and must be served through egress: {0}")]
    RequiresDecryption(String),

    #[error("document storage unavailable: {0}")]
    Storage(String),
}

impl DocumentError {
    /// HTTP status class for surfacing the error to a client.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::RequiresDecryption(_) => 409,
            Self::Corrupted(_) => 500,
            Self::Storage(_) => 502,
        }
    }
}

impl From<StorageError> for DocumentError {
    fn from(err: StorageError) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<BlobStoreError> for DocumentError {
    fn from(err: BlobStoreError) -> Self {
        match err {
            BlobStoreError::NotFound(path) => Self::NotFound(path),
            other => Self::Storage(other.to_string()),
        }
    }
}

/// Why a one-time token could not be redeemed.
#[derive(Debug, Error)]
pub enum RedeemError {
    #[error("token not found")]
    NotFound,

    #[error("token already used")]
    AlreadyUsed,

    #[error("token expired")]
    Expired,

    #[error("token issued for a different purpose")]
    PurposeMismatch,

    #[error("record store error: {0}")]
    Storage(#[from] StorageError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        assert_eq!(DocumentError::NotFound("k".into()).status_code(), 404);
        assert_eq!(DocumentError::Corrupted("k".into()).status_code(), 500);
        assert_eq!(DocumentError::Storage("s3".into()).status_code(), 502);
        assert_eq!(DocumentError::RequiresDecryption("k".into()).status_code(), 409);
    }

    #[test]
    fn blob_not_found_maps_to_not_found() {
        let err: DocumentError = BlobStoreError::NotFound("a.enc".into()).into();
        assert!(matches!(err, DocumentError::NotFound(ref p) if p == "a.enc"));

        let err: DocumentError = BlobStoreError::Storage("timeout".into()).into();
        assert_eq!(err.status_code(), 502);
    }
}
