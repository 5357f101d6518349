//! Data protection layer for the intake platform.
//!
//! Sits between request handlers and storage:
//!
//! - [`documents`]: encrypt-on-ingest, decrypt-on-egress document pipeline
//! - [`access_tokens`]: hashed, single-use tokens for emailed actions
//! - [`pii`]: encrypted PII columns with last-4 masks and audited reveal
//! - [`links`]: stateless signed links for verification and setup flows
//! - [`audit`]: fire-and-forget audit trail
//!
//! [`ProtectionLayer::from_config`] builds all of them from
//! [`ProtectionConfig::from_env`].

pub mod access_tokens;
pub mod audit;
pub mod config;
pub mod documents;
mod error;
pub mod layer;
pub mod links;
pub mod naming;
pub mod pii;
pub mod telemetry;

pub use access_tokens::{AccessTokenService, IssuedToken};
pub use audit::AuditRecorder;
pub use config::{BlobBackend, LinkMaxAges, ProtectionConfig};
pub use documents::{DecryptedDocument, DocumentService, NewDocument};
pub use error::{DocumentError, ProtectError, ProtectResult, RedeemError};
pub use layer::ProtectionLayer;
pub use links::{
    DocumentRequestClaims, EmailVerificationClaims, LinkClaims, LinkKind, LinkService,
    PasswordSetupClaims,
};
pub use pii::{PiiService, ProtectedField, RevealedValue};
pub use telemetry::init_tracing;

pub use intake_types::{AccessTokenRecord, AuditEntry, AuditEvent, DocumentRecord, TokenPurpose};
