//! Fire-and-forget audit recorder.
//!
//! Audit writes never fail the operation being audited: a persistence error
//! is logged and dropped.

use crate::error::ProtectResult;
use chrono::Utc;
use intake_storage::AuditRepository;
use intake_types::{AuditEntry, AuditEvent};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

pub const ACTION_DECRYPT: &str = "decrypt";
pub const ENTITY_DOCUMENT: &str = "document";

#[derive(Clone)]
pub struct AuditRecorder {
    repo: Arc<dyn AuditRepository>,
}

impl AuditRecorder {
    pub fn new(repo: Arc<dyn AuditRepository>) -> Self {
        Self { repo }
    }

    pub async fn record(&self, event: AuditEvent) {
        let entry = AuditEntry {
            id: Uuid::new_v4(),
            actor: event.actor,
            action: event.action,
            entity: event.entity,
            entity_id: event.entity_id,
            details: event.details,
            timestamp: Utc::now(),
        };

        match self.repo.append_audit(&entry).await {
            Ok(()) => debug!(action = %entry.action, entity = %entry.entity, "audit recorded"),
            Err(e) => warn!(
                action = %entry.action,
                entity = %entry.entity,
                entity_id = %entry.entity_id,
                error = %e,
                "audit write failed; continuing"
            ),
        }
    }

    /// Records that `actor` saw the plaintext of `field` on an entity.
    pub async fn record_decryption(
        &self,
        actor: &str,
        field: &str,
        entity: &str,
        entity_id: &str,
        reason: &str,
    ) {
        let event = AuditEvent::new(actor, ACTION_DECRYPT, entity, entity_id)
            .with_details(json!({ "field": field, "reason": reason }));
        self.record(event).await;
    }

    pub async fn record_document_access(&self, actor: &str, document_id: Uuid, action: &str) {
        let event = AuditEvent::new(actor, action, ENTITY_DOCUMENT, document_id.to_string());
        self.record(event).await;
    }

    /// Entries for one entity, oldest first.
    pub async fn history(&self, entity: &str, entity_id: &str) -> ProtectResult<Vec<AuditEntry>> {
        Ok(self.repo.audit_for_entity(entity, entity_id).await?)
    }
}
