//! Wires the protection services together from a [`ProtectionConfig`].

use crate::access_tokens::AccessTokenService;
use crate::audit::AuditRecorder;
use crate::config::{BlobBackend, ProtectionConfig};
use crate::documents::DocumentService;
use crate::error::ProtectResult;
use crate::links::LinkService;
use crate::pii::PiiService;
use intake_blobstore::{BlobStore, LocalBlobStore, S3BlobStore};
use intake_crypto::{KdfParams, KeyProvider};
use intake_storage::RecordStore;
use std::sync::Arc;
use tracing::info;

/// Every protection service, sharing one key provider and one record store.
pub struct ProtectionLayer {
    pub documents: DocumentService,
    pub tokens: AccessTokenService,
    pub audit: AuditRecorder,
    pub pii: PiiService,
    pub links: LinkService,
    records: RecordStore,
}

impl ProtectionLayer {
    /// Derives keys, opens stores and builds the services.
    ///
    /// Fails fast on bad secrets so a misconfigured process never serves.
    pub async fn from_config(config: &ProtectionConfig) -> ProtectResult<Self> {
        config.validate()?;

        let keys = KeyProvider::with_params(
            &config.encryption_key,
            &config.token_secret,
            &KdfParams::with_iterations(config.kdf_iterations),
        )?;

        let records = match config.db_path {
            Some(ref path) => RecordStore::open(path)?,
            None => RecordStore::open_in_memory()?,
        };

        let blobs: Arc<dyn BlobStore> = match config.blob_backend {
            BlobBackend::Local => {
                let base = format!("{}/files", config.public_base_url.trim_end_matches('/'));
                match config.local_blob_path() {
                    Some(path) => Arc::new(LocalBlobStore::open(&path, base)?),
                    None => Arc::new(LocalBlobStore::open(std::path::Path::new(":memory:"), base)?),
                }
            }
            BlobBackend::S3 => {
                let s3 = if config.s3.access_key_id.is_some() {
                    S3BlobStore::new(config.s3.clone())?
                } else {
                    S3BlobStore::from_env_chain(config.s3.clone()).await?
                };
                Arc::new(s3)
            }
        };

        let layer = Self::assemble(&keys, records, blobs, config);
        info!(
            backend = ?config.blob_backend,
            persistent = config.db_path.is_some(),
            "protection layer ready"
        );
        Ok(layer)
    }

    /// Builds the services over already-open stores.
    pub fn assemble(
        keys: &KeyProvider,
        records: RecordStore,
        blobs: Arc<dyn BlobStore>,
        config: &ProtectionConfig,
    ) -> Self {
        let shared = Arc::new(records.clone());
        let audit = AuditRecorder::new(shared.clone());
        let cipher = keys.field_cipher();

        Self {
            documents: DocumentService::new(cipher.clone(), blobs, shared.clone(), audit.clone()),
            tokens: AccessTokenService::new(shared),
            pii: PiiService::new(cipher, audit.clone()),
            links: LinkService::new(
                keys.url_token_codec(),
                config.link_max_ages,
                config.public_base_url.clone(),
            ),
            audit,
            records,
        }
    }

    pub fn records(&self) -> &RecordStore {
        &self.records
    }
}
