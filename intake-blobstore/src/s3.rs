//! S3 backend. Works against AWS or any S3-compatible endpoint (MinIO).

use crate::{validate_path, BlobStore, BlobStoreError, BlobStoreResult, StoredObject};
use async_trait::async_trait;
use aws_sdk_s3::Client as S3Client;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ObjectCannedAcl;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::debug;

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    /// Custom endpoint (MinIO, LocalStack). Forces path-style addressing.
    #[serde(default)]
    pub endpoint_override: Option<String>,
    #[serde(default)]
    pub access_key_id: Option<String>,
    #[serde(default)]
    pub secret_access_key: Option<String>,
    /// Public base for object URLs, e.g. a CDN in front of the bucket.
    #[serde(default)]
    pub public_base_url: Option<String>,
}

impl fmt::Debug for S3Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Config")
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("endpoint_override", &self.endpoint_override)
            .field("access_key_id", &self.access_key_id)
            .field(
                "secret_access_key",
                &self.secret_access_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("public_base_url", &self.public_base_url)
            .finish()
    }
}

impl S3Config {
    fn validate(&self) -> BlobStoreResult<()> {
        if self.bucket.trim().is_empty() {
            return Err(BlobStoreError::Config("S3 bucket is required".into()));
        }
        if self.region.trim().is_empty() {
            return Err(BlobStoreError::Config("S3 region is required".into()));
        }
        Ok(())
    }
}

pub struct S3BlobStore {
    client: S3Client,
    config: S3Config,
}

impl S3BlobStore {
    /// Builds a client from static credentials in `config`.
    pub fn new(config: S3Config) -> BlobStoreResult<Self> {
        config.validate()?;
        let (Some(access_key_id), Some(secret_access_key)) =
            (&config.access_key_id, &config.secret_access_key)
        else {
            return Err(BlobStoreError::Config(
                "static S3 credentials require both access key id and secret".into(),
            ));
        };

        let credentials = aws_credential_types::Credentials::new(
            access_key_id,
            secret_access_key,
            None,
            None,
            "intake-static",
        );

        let mut config_builder = aws_sdk_s3::Config::builder()
            .region(aws_types::region::Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .behavior_version_latest();

        if let Some(ref endpoint) = config.endpoint_override {
            config_builder = config_builder.endpoint_url(endpoint).force_path_style(true);
        }

        Ok(Self {
            client: S3Client::from_conf(config_builder.build()),
            config,
        })
    }

    /// Resolves credentials from the default AWS provider chain
    /// (environment, profile, instance metadata).
    pub async fn from_env_chain(config: S3Config) -> BlobStoreResult<Self> {
        config.validate()?;
        let shared = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_types::region::Region::new(config.region.clone()))
            .load()
            .await;

        let mut config_builder = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(ref endpoint) = config.endpoint_override {
            config_builder = config_builder.endpoint_url(endpoint).force_path_style(true);
        }

        Ok(Self {
            client: S3Client::from_conf(config_builder.build()),
            config,
        })
    }

    pub fn bucket(&self) -> &str {
        &self.config.bucket
    }

    /// Direct (unsigned) URL of an object.
    pub fn object_url(&self, key: &str) -> String {
        if let Some(ref base) = self.config.public_base_url {
            return format!("{}/{key}", base.trim_end_matches('/'));
        }
        match self.config.endpoint_override {
            Some(ref endpoint) => {
                format!("{}/{}/{key}", endpoint.trim_end_matches('/'), self.config.bucket)
            }
            None => format!(
                "https://{}.s3.{}.amazonaws.com/{key}",
                self.config.bucket, self.config.region
            ),
        }
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn put(
        &self,
        data: Vec<u8>,
        path: &str,
        is_public: bool,
    ) -> BlobStoreResult<StoredObject> {
        validate_path(path)?;
        let size = data.len() as u64;

        let mut request = self
            .client
            .put_object()
            .bucket(&self.config.bucket)
            .key(path)
            .body(ByteStream::from(data));
        if is_public {
            request = request.acl(ObjectCannedAcl::PublicRead);
        }

        request
            .send()
            .await
            .map_err(|e| BlobStoreError::Storage(format!("upload failed for {path}: {e}")))?;

        debug!("uploaded {size} bytes to s3://{}/{path}", self.config.bucket);
        Ok(StoredObject {
            url: self.object_url(path),
            path: path.to_string(),
            size,
        })
    }

    async fn get(&self, path: &str) -> BlobStoreResult<Vec<u8>> {
        let resp = match self
            .client
            .get_object()
            .bucket(&self.config.bucket)
            .key(path)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                let service_err = e.into_service_error();
                if service_err.is_no_such_key() {
                    return Err(BlobStoreError::NotFound(path.to_string()));
                }
                return Err(BlobStoreError::Storage(format!(
                    "download failed for {path}: {service_err}"
                )));
            }
        };

        let body = resp
            .body
            .collect()
            .await
            .map_err(|e| BlobStoreError::Storage(format!("failed to read body for {path}: {e}")))?;

        let bytes = body.into_bytes().to_vec();
        debug!(
            "downloaded {} bytes from s3://{}/{path}",
            bytes.len(),
            self.config.bucket
        );
        Ok(bytes)
    }

    /// S3 deletes are idempotent: deleting a missing key succeeds.
    async fn delete(&self, path: &str) -> BlobStoreResult<()> {
        self.client
            .delete_object()
            .bucket(&self.config.bucket)
            .key(path)
            .send()
            .await
            .map_err(|e| BlobStoreError::Storage(format!("delete failed for {path}: {e}")))?;
        debug!("deleted s3://{}/{path}", self.config.bucket);
        Ok(())
    }

    async fn signed_url(&self, path: &str, ttl: Duration) -> BlobStoreResult<String> {
        let presigning = PresigningConfig::expires_in(ttl)
            .map_err(|e| BlobStoreError::Config(format!("invalid presign ttl: {e}")))?;

        let request = self
            .client
            .get_object()
            .bucket(&self.config.bucket)
            .key(path)
            .presigned(presigning)
            .await
            .map_err(|e| BlobStoreError::Storage(format!("presign failed for {path}: {e}")))?;

        Ok(request.uri().to_string())
    }
}
