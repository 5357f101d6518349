//! PII protect/reveal with its audit trail.

mod support;

use intake_protect::{AuditEvent, AuditRecorder, PiiService, ProtectedField, RevealedValue};
use intake_storage::RecordStore;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use support::{test_keys, ReadOnlyRecords};

fn pii() -> (PiiService, AuditRecorder) {
    let records = RecordStore::open_in_memory().unwrap();
    let audit = AuditRecorder::new(Arc::new(records));
    (PiiService::new(test_keys().field_cipher(), audit.clone()), audit)
}

#[tokio::test]
async fn ssn_end_to_end() {
    let (pii, audit) = pii();

    let stored = pii.protect(Some("123-45-6789")).unwrap();
    let encrypted = stored.encrypted.clone().unwrap();
    assert!(!encrypted.contains("123-45"));
    assert_eq!(stored.last4.as_deref(), Some("6789"));
    assert_eq!(stored.masked(), "•••• 6789");

    let revealed = pii
        .reveal("admin:1", "ssn", "client", "42", "tax filing", Some(&encrypted))
        .await;
    assert_eq!(revealed, RevealedValue::Value("123-45-6789".into()));

    let history = audit.history("client", "42").await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].action, "decrypt");
    assert_eq!(history[0].actor, "admin:1");
    assert_eq!(history[0].details, json!({"field": "ssn", "reason": "tax filing"}));
}

#[tokio::test]
async fn protect_absent_and_empty() {
    let (pii, _) = pii();
    assert_eq!(pii.protect(None).unwrap(), ProtectedField::default());

    let empty = pii.protect(Some("")).unwrap();
    assert!(empty.encrypted.is_none());
    assert!(empty.last4.is_none());

    let short = pii.protect(Some("12")).unwrap();
    assert!(short.encrypted.is_some());
    assert!(short.last4.is_none());
}

#[tokio::test]
async fn same_value_encrypts_differently() {
    let (pii, _) = pii();
    let a = pii.protect(Some("987-65-4321")).unwrap();
    let b = pii.protect(Some("987-65-4321")).unwrap();
    assert_ne!(a.encrypted, b.encrypted);
    assert_eq!(a.last4, b.last4);
}

#[tokio::test]
async fn corrupt_value_degrades_but_is_audited() {
    let (pii, audit) = pii();
    let stored = pii.protect(Some("123-45-6789")).unwrap().encrypted.unwrap();
    let mut tampered = stored.into_bytes();
    // Inside the ciphertext, clear of the trailing padding
    let at = tampered.len() - 6;
    tampered[at] = if tampered[at] == b'A' { b'B' } else { b'A' };
    let tampered = String::from_utf8(tampered).unwrap();

    let revealed = pii
        .reveal("admin:1", "ssn", "client", "7", "support ticket", Some(&tampered))
        .await;
    assert_eq!(revealed, RevealedValue::Unavailable);
    assert_eq!(revealed.to_string(), "value unavailable");
    assert_eq!(audit.history("client", "7").await.unwrap().len(), 1);
}

#[tokio::test]
async fn garbage_value_degrades() {
    let (pii, _) = pii();
    let revealed = pii
        .reveal("admin:1", "ein", "business", "3", "review", Some("not base64 at all!"))
        .await;
    assert_eq!(revealed, RevealedValue::Unavailable);
}

#[tokio::test]
async fn nothing_stored_is_empty_and_unaudited() {
    let (pii, audit) = pii();
    assert_eq!(
        pii.reveal("admin:1", "ssn", "client", "9", "r", None).await,
        RevealedValue::Empty
    );
    assert_eq!(
        pii.reveal("admin:1", "ssn", "client", "9", "r", Some("")).await,
        RevealedValue::Empty
    );
    assert!(audit.history("client", "9").await.unwrap().is_empty());
}

// ── Audit failures ──

#[tokio::test]
async fn audit_failure_does_not_block_reveal() {
    let failing = AuditRecorder::new(Arc::new(ReadOnlyRecords));
    let pii = PiiService::new(test_keys().field_cipher(), failing);

    let stored = pii.protect(Some("123-45-6789")).unwrap().encrypted.unwrap();
    let revealed = pii
        .reveal("admin:1", "ssn", "client", "42", "filing", Some(&stored))
        .await;
    assert_eq!(revealed.as_deref(), Some("123-45-6789"));
}

#[tokio::test]
async fn record_swallows_store_errors() {
    let failing = AuditRecorder::new(Arc::new(ReadOnlyRecords));
    failing
        .record(AuditEvent::new("system", "purge", "access_token", "*"))
        .await;
    failing
        .record_decryption("admin:1", "ssn", "client", "1", "test")
        .await;
}

#[tokio::test]
async fn record_persists_custom_events() {
    let (_, audit) = pii();
    audit
        .record(
            AuditEvent::new("staff:4", "export", "client", "11")
                .with_details(json!({"format": "csv"})),
        )
        .await;

    let history = audit.history("client", "11").await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].details["format"], "csv");
}
