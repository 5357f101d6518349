//! Append-only audit log. There is deliberately no update or delete path.

use crate::error::{StorageError, StorageResult};
use crate::record_store::{from_millis, to_millis, RecordStore};
use crate::repository::AuditRepository;
use async_trait::async_trait;
use duckdb::params;
use intake_types::AuditEntry;
use uuid::Uuid;

const TABLE: &str = "audit_log";

#[async_trait]
impl AuditRepository for RecordStore {
    async fn append_audit(&self, entry: &AuditEntry) -> StorageResult<()> {
        let details_json = serde_json::to_string(&entry.details)?;
        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT INTO audit_log (id, actor, action, entity, entity_id, details_json, occurred_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                entry.id.to_string(),
                entry.actor,
                entry.action,
                entry.entity,
                entry.entity_id,
                details_json,
                to_millis(entry.timestamp),
            ],
        )?;
        Ok(())
    }

    async fn audit_for_entity(
        &self,
        entity: &str,
        entity_id: &str,
    ) -> StorageResult<Vec<AuditEntry>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, actor, action, entity, entity_id, details_json, occurred_at \
             FROM audit_log WHERE entity = ? AND entity_id = ? ORDER BY occurred_at, id",
        )?;

        let rows = stmt
            .query_map(params![entity, entity_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, i64>(6)?,
                ))
            })?
            .collect::<duckdb::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(id, actor, action, entity, entity_id, details_json, occurred_at)| {
                Ok(AuditEntry {
                    id: id.parse::<Uuid>().map_err(|e| StorageError::CorruptRow {
                        table: TABLE,
                        reason: format!("bad id: {e}"),
                    })?,
                    actor,
                    action,
                    entity,
                    entity_id,
                    details: serde_json::from_str(&details_json)?,
                    timestamp: from_millis(TABLE, occurred_at)?,
                })
            })
            .collect()
    }
}
