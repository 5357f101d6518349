//! Protection layer configuration.
//!
//! Secrets come from the process environment at startup. A missing or short
//! field secret is a startup failure, never a runtime one.

use crate::error::{ProtectError, ProtectResult};
use intake_blobstore::S3Config;
use intake_crypto::{DEFAULT_ITERATIONS, MIN_SECRET_LEN};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

pub const ENV_ENCRYPTION_KEY: &str = "INTAKE_ENCRYPTION_KEY";
pub const ENV_TOKEN_SECRET: &str = "INTAKE_TOKEN_SECRET";
pub const ENV_DB_PATH: &str = "INTAKE_DB_PATH";
pub const ENV_BLOB_BACKEND: &str = "INTAKE_BLOB_BACKEND";
pub const ENV_S3_BUCKET: &str = "INTAKE_S3_BUCKET";
pub const ENV_S3_REGION: &str = "INTAKE_S3_REGION";
pub const ENV_S3_ENDPOINT: &str = "INTAKE_S3_ENDPOINT";
pub const ENV_S3_ACCESS_KEY_ID: &str = "INTAKE_S3_ACCESS_KEY_ID";
pub const ENV_S3_SECRET_ACCESS_KEY: &str = "INTAKE_S3_SECRET_ACCESS_KEY";
pub const ENV_PUBLIC_BASE_URL: &str = "INTAKE_PUBLIC_BASE_URL";
pub const ENV_EMAIL_LINK_MAX_AGE: &str = "INTAKE_EMAIL_LINK_MAX_AGE_SECS";
pub const ENV_PASSWORD_LINK_MAX_AGE: &str = "INTAKE_PASSWORD_LINK_MAX_AGE_SECS";
pub const ENV_DOCUMENT_LINK_MAX_AGE: &str = "INTAKE_DOCUMENT_LINK_MAX_AGE_SECS";

/// Where encrypted document bytes live.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlobBackend {
    #[default]
    Local,
    S3,
}

impl std::str::FromStr for BlobBackend {
    type Err = ProtectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "s3" => Ok(Self::S3),
            other => Err(ProtectError::Config(format!(
                "{ENV_BLOB_BACKEND} must be 'local' or 's3', got '{other}'"
            ))),
        }
    }
}

/// Max ages for the three signed link kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkMaxAges {
    pub email_verification_secs: u64,
    pub password_setup_secs: u64,
    pub document_request_secs: u64,
}

impl Default for LinkMaxAges {
    fn default() -> Self {
        Self {
            email_verification_secs: 24 * 60 * 60,
            password_setup_secs: 72 * 60 * 60,
            document_request_secs: 30 * 24 * 60 * 60,
        }
    }
}

impl LinkMaxAges {
    pub fn email_verification(&self) -> Duration {
        Duration::from_secs(self.email_verification_secs)
    }

    pub fn password_setup(&self) -> Duration {
        Duration::from_secs(self.password_setup_secs)
    }

    pub fn document_request(&self) -> Duration {
        Duration::from_secs(self.document_request_secs)
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProtectionConfig {
    /// Field encryption secret. At least 32 characters.
    pub encryption_key: String,

    /// URL token secret. 64 hex characters are used as the raw key.
    pub token_secret: String,

    /// DuckDB file for records (and local blobs). In-memory when absent.
    pub db_path: Option<PathBuf>,

    pub blob_backend: BlobBackend,

    pub s3: S3Config,

    /// Base for links sent to clients and for local object URLs.
    pub public_base_url: String,

    pub link_max_ages: LinkMaxAges,

    /// PBKDF2 rounds for the field key. Not read from the environment.
    pub kdf_iterations: u32,
}

impl Default for ProtectionConfig {
    fn default() -> Self {
        Self {
            encryption_key: String::new(),
            token_secret: String::new(),
            db_path: None,
            blob_backend: BlobBackend::Local,
            s3: S3Config {
                region: "us-east-1".to_string(),
                ..Default::default()
            },
            public_base_url: "http://localhost:3000".to_string(),
            link_max_ages: LinkMaxAges::default(),
            kdf_iterations: DEFAULT_ITERATIONS,
        }
    }
}

impl fmt::Debug for ProtectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProtectionConfig")
            .field("encryption_key", &"[REDACTED]")
            .field("token_secret", &"[REDACTED]")
            .field("db_path", &self.db_path)
            .field("blob_backend", &self.blob_backend)
            .field("s3", &self.s3)
            .field("public_base_url", &self.public_base_url)
            .field("link_max_ages", &self.link_max_ages)
            .field("kdf_iterations", &self.kdf_iterations)
            .finish()
    }
}

impl ProtectionConfig {
    /// Reads the process environment.
    pub fn from_env() -> ProtectResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds a config from any variable source. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> ProtectResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let required = |name: &str| {
            get(name).ok_or_else(|| ProtectError::Config(format!("{name} is not set")))
        };
        let secs = |name: &str, default: u64| -> ProtectResult<u64> {
            match get(name) {
                None => Ok(default),
                Some(raw) => match raw.parse::<u64>() {
                    Ok(0) | Err(_) => Err(ProtectError::Config(format!(
                        "{name} must be a positive number of seconds"
                    ))),
                    Ok(v) => Ok(v),
                },
            }
        };

        let defaults = Self::default();
        let link_defaults = defaults.link_max_ages;

        let config = Self {
            encryption_key: required(ENV_ENCRYPTION_KEY)?,
            token_secret: required(ENV_TOKEN_SECRET)?,
            db_path: get(ENV_DB_PATH).map(PathBuf::from),
            blob_backend: match get(ENV_BLOB_BACKEND) {
                Some(raw) => raw.parse()?,
                None => BlobBackend::Local,
            },
            s3: S3Config {
                bucket: get(ENV_S3_BUCKET).unwrap_or_default(),
                region: get(ENV_S3_REGION).unwrap_or(defaults.s3.region),
                endpoint_override: get(ENV_S3_ENDPOINT),
                access_key_id: get(ENV_S3_ACCESS_KEY_ID),
                secret_access_key: get(ENV_S3_SECRET_ACCESS_KEY),
                public_base_url: None,
            },
            public_base_url: get(ENV_PUBLIC_BASE_URL).unwrap_or(defaults.public_base_url),
            link_max_ages: LinkMaxAges {
                email_verification_secs: secs(
                    ENV_EMAIL_LINK_MAX_AGE,
                    link_defaults.email_verification_secs,
                )?,
                password_setup_secs: secs(
                    ENV_PASSWORD_LINK_MAX_AGE,
                    link_defaults.password_setup_secs,
                )?,
                document_request_secs: secs(
                    ENV_DOCUMENT_LINK_MAX_AGE,
                    link_defaults.document_request_secs,
                )?,
            },
            kdf_iterations: defaults.kdf_iterations,
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks invariants that would otherwise surface on first use.
    pub fn validate(&self) -> ProtectResult<()> {
        if self.encryption_key.chars().count() < MIN_SECRET_LEN {
            return Err(ProtectError::Config(format!(
                "{ENV_ENCRYPTION_KEY} must be at least {MIN_SECRET_LEN} characters"
            )));
        }
        if self.token_secret.is_empty() {
            return Err(ProtectError::Config(format!("{ENV_TOKEN_SECRET} is not set")));
        }
        if self.kdf_iterations == 0 {
            return Err(ProtectError::Config("kdf_iterations must be positive".into()));
        }
        if self.blob_backend == BlobBackend::S3 && self.s3.bucket.is_empty() {
            return Err(ProtectError::Config(format!(
                "{ENV_S3_BUCKET} is required when {ENV_BLOB_BACKEND}=s3"
            )));
        }
        Ok(())
    }

    /// Sibling DuckDB file for local blobs, so records and blobs never share
    /// a database handle.
    pub fn local_blob_path(&self) -> Option<PathBuf> {
        self.db_path
            .as_ref()
            .map(|path| path.with_extension("blobs.duckdb"))
    }
}
