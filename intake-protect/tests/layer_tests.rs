//! Bootstrapping the whole layer from configuration.

mod support;

use chrono::Duration;
use intake_protect::config::{ENV_DB_PATH, ENV_ENCRYPTION_KEY, ENV_TOKEN_SECRET};
use intake_protect::{
    DocumentRequestClaims, EmailVerificationClaims, ProtectError, ProtectionConfig,
    ProtectionLayer, TokenPurpose,
};
use pretty_assertions::assert_eq;
use std::collections::HashMap;
use support::{sample_pdf, w2_upload, FIELD_SECRET, TOKEN_SECRET};

fn config_from(vars: &[(&str, &str)]) -> ProtectionConfig {
    let map: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let mut config = ProtectionConfig::from_lookup(|name| map.get(name).cloned()).unwrap();
    config.kdf_iterations = 1_000;
    config
}

fn in_memory_config() -> ProtectionConfig {
    config_from(&[(ENV_ENCRYPTION_KEY, FIELD_SECRET), (ENV_TOKEN_SECRET, TOKEN_SECRET)])
}

#[tokio::test]
async fn in_memory_layer_serves_every_flow() {
    let layer = ProtectionLayer::from_config(&in_memory_config()).await.unwrap();

    let record = layer
        .documents
        .ingest(w2_upload("client-1", &sample_pdf()))
        .await
        .unwrap();
    assert!(record.storage_url.starts_with("http://localhost:3000/files/clients/client-1/"));
    assert_eq!(layer.documents.retrieve(record.id).await.unwrap().data, sample_pdf());

    let issued = layer
        .tokens
        .issue(TokenPurpose::DocumentRequest, "req-1", Duration::days(7), None)
        .await
        .unwrap();
    assert!(layer.tokens.redeem(&issued.token, TokenPurpose::DocumentRequest).await.is_ok());

    let field = layer.pii.protect(Some("12-3456789")).unwrap();
    assert_eq!(field.last4.as_deref(), Some("6789"));

    let url = layer
        .links
        .url(DocumentRequestClaims {
            request_id: "req-1".into(),
            client_id: "client-1".into(),
        })
        .unwrap();
    let token = url.split("token=").nth(1).unwrap();
    assert!(layer.links.verify::<DocumentRequestClaims>(token).is_some());
    assert!(layer.links.verify::<EmailVerificationClaims>(token).is_none());
}

#[tokio::test]
async fn short_secret_fails_startup() {
    let mut config = in_memory_config();
    config.encryption_key = "short".into();
    let err = ProtectionLayer::from_config(&config).await.err().unwrap();
    assert!(matches!(err, ProtectError::Config(_)));
}

#[tokio::test]
async fn link_tokens_do_not_decrypt_as_fields() {
    let layer = ProtectionLayer::from_config(&in_memory_config()).await.unwrap();
    let token = layer
        .links
        .create(EmailVerificationClaims {
            user_id: "u".into(),
            email: "u@example.com".into(),
        })
        .unwrap();

    let revealed = layer
        .pii
        .reveal("admin:1", "email", "user", "u", "probe", Some(&token))
        .await;
    assert_eq!(revealed.as_deref(), None);
}

#[tokio::test]
async fn file_backed_layer_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("records.duckdb");
    let db = db.to_str().unwrap();
    let config = config_from(&[
        (ENV_ENCRYPTION_KEY, FIELD_SECRET),
        (ENV_TOKEN_SECRET, TOKEN_SECRET),
        (ENV_DB_PATH, db),
    ]);

    let (document_id, token) = {
        let layer = ProtectionLayer::from_config(&config).await.unwrap();
        let record = layer
            .documents
            .ingest(w2_upload("client-2", &sample_pdf()))
            .await
            .unwrap();
        let issued = layer
            .tokens
            .issue(TokenPurpose::PasswordSetup, "user-2", Duration::hours(1), None)
            .await
            .unwrap();
        (record.id, issued.token)
    };

    assert!(dir.path().join("records.blobs.duckdb").exists());

    // Same secrets after restart derive the same keys.
    let layer = ProtectionLayer::from_config(&config).await.unwrap();
    assert_eq!(layer.documents.retrieve(document_id).await.unwrap().data, sample_pdf());
    assert!(layer.tokens.redeem(&token, TokenPurpose::PasswordSetup).await.is_ok());
}
