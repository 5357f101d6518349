//! Signed, stateless links for email verification, password setup and
//! document requests.
//!
//! Each kind is tagged inside the token so a link minted for one flow never
//! verifies as another, and each has its own max age.

use crate::config::LinkMaxAges;
use crate::error::ProtectResult;
use intake_crypto::UrlTokenCodec;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    EmailVerification,
    PasswordSetup,
    DocumentRequest,
}

/// Claims carried by one link kind.
pub trait LinkClaims: Serialize + DeserializeOwned {
    const KIND: LinkKind;
    /// Route the link opens, relative to the public base URL.
    const PATH: &'static str;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailVerificationClaims {
    pub user_id: String,
    pub email: String,
}

impl LinkClaims for EmailVerificationClaims {
    const KIND: LinkKind = LinkKind::EmailVerification;
    const PATH: &'static str = "verify-email";
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordSetupClaims {
    pub user_id: String,
}

impl LinkClaims for PasswordSetupClaims {
    const KIND: LinkKind = LinkKind::PasswordSetup;
    const PATH: &'static str = "setup-password";
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRequestClaims {
    pub request_id: String,
    pub client_id: String,
}

impl LinkClaims for DocumentRequestClaims {
    const KIND: LinkKind = LinkKind::DocumentRequest;
    const PATH: &'static str = "document-request";
}

#[derive(Serialize, Deserialize)]
struct Tagged<T> {
    kind: LinkKind,
    #[serde(flatten)]
    claims: T,
}

#[derive(Clone, Debug)]
pub struct LinkService {
    codec: UrlTokenCodec,
    max_ages: LinkMaxAges,
    base_url: String,
}

impl LinkService {
    pub fn new(codec: UrlTokenCodec, max_ages: LinkMaxAges, base_url: impl Into<String>) -> Self {
        Self {
            codec,
            max_ages,
            base_url: base_url.into(),
        }
    }

    pub fn max_age(&self, kind: LinkKind) -> Duration {
        match kind {
            LinkKind::EmailVerification => self.max_ages.email_verification(),
            LinkKind::PasswordSetup => self.max_ages.password_setup(),
            LinkKind::DocumentRequest => self.max_ages.document_request(),
        }
    }

    pub fn create<T: LinkClaims>(&self, claims: T) -> ProtectResult<String> {
        let tagged = Tagged {
            kind: T::KIND,
            claims,
        };
        Ok(self.codec.create_claims(&tagged)?)
    }

    /// Returns the claims only for an authentic, unexpired token of kind `T`.
    pub fn verify<T: LinkClaims>(&self, token: &str) -> Option<T> {
        let tagged: Tagged<T> = self.codec.verify_claims(token, self.max_age(T::KIND))?;
        (tagged.kind == T::KIND).then_some(tagged.claims)
    }

    /// Full URL to embed in an email.
    pub fn url<T: LinkClaims>(&self, claims: T) -> ProtectResult<String> {
        let token = self.create(claims)?;
        Ok(format!(
            "{}/{}?token={token}",
            self.base_url.trim_end_matches('/'),
            T::PATH
        ))
    }
}
