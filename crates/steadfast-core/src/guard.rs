//! Optimistic concurrency guard: the only path that mutates a record.

use serde::Serialize;
use std::sync::Arc;

use steadfast_types::{
    AuditDraft, AuditEntry, ConflictDescriptor, DataError, DataResult, Fields, VersionedRecord,
    RESERVED_FIELDS,
};

use crate::metrics;
use crate::router::{unexpected_output, TransportRouter};
use crate::transport::{CasOutcome, ConditionalUpdate, Operation};

/// A write that landed, with the audit entry committed alongside it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommittedWrite {
    pub record: VersionedRecord,
    pub audit: Option<AuditEntry>,
}

/// Outcome of a conditional write. A conflict is a value, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome {
    Updated(CommittedWrite),
    Conflict(ConflictDescriptor),
}

impl WriteOutcome {
    pub fn into_result(self) -> DataResult<CommittedWrite> {
        match self {
            Self::Updated(write) => Ok(write),
            Self::Conflict(descriptor) => Err(DataError::VersionConflict(descriptor)),
        }
    }
}

/// Reject change sets the store must never see.
pub fn validate_changes(changes: &Fields) -> DataResult<()> {
    if changes.is_empty() {
        return Err(DataError::validation("changes must not be empty"));
    }
    if let Some(reserved) = RESERVED_FIELDS.iter().find(|name| changes.contains_key(**name)) {
        return Err(DataError::validation(format!("field '{}' is managed by the store", reserved)));
    }
    Ok(())
}

pub struct ConcurrencyGuard {
    router: Arc<TransportRouter>,
}

impl ConcurrencyGuard {
    pub fn new(router: Arc<TransportRouter>) -> Self {
        Self { router }
    }

    /// Compare-and-set `changes` onto the record at `expected_version`.
    ///
    /// On zero matched rows the record is re-read: a missing record is
    /// `NotFound`, an existing one yields a [`ConflictDescriptor`] carrying
    /// the stored version.
    pub async fn conditional_update(
        &self,
        record_type: &str,
        record_id: &str,
        expected_version: u64,
        changes: Fields,
        audit: Option<AuditDraft>,
    ) -> DataResult<WriteOutcome> {
        if expected_version < 1 {
            return Err(DataError::validation("expected_version must be at least 1"));
        }
        validate_changes(&changes)?;
        if let Some(draft) = &audit {
            if draft.justification.trim().is_empty() {
                return Err(DataError::validation("justification must not be empty"));
            }
        }

        let update = ConditionalUpdate {
            record_type: record_type.to_string(),
            record_id: record_id.to_string(),
            expected_version,
            changes,
            audit,
        };
        let outcome = self
            .router
            .execute(Operation::ConditionalUpdate(update))
            .await?
            .into_update()
            .map_err(unexpected_output)?;

        match outcome {
            CasOutcome::Applied { record, audit } => {
                tracing::debug!(
                    record_type = %record_type,
                    record_id = %record_id,
                    version = record.version,
                    "Conditional update applied"
                );
                if let Some(entry) = &audit {
                    metrics::record_audit(entry.action);
                }
                Ok(WriteOutcome::Updated(CommittedWrite { record, audit }))
            },
            CasOutcome::NoMatch => {
                let current = self.fetch(record_type, record_id).await?;
                let descriptor = ConflictDescriptor {
                    record_type: record_type.to_string(),
                    record_id: record_id.to_string(),
                    expected_version,
                    actual_version: current.version,
                };
                metrics::record_conflict(record_type);
                tracing::info!(
                    record_type = %record_type,
                    record_id = %record_id,
                    expected = expected_version,
                    actual = current.version,
                    "Version conflict"
                );
                Ok(WriteOutcome::Conflict(descriptor))
            },
        }
    }

    /// Insert a new record at version 1.
    pub async fn create(
        &self,
        record_type: &str,
        record_id: &str,
        fields: Fields,
    ) -> DataResult<VersionedRecord> {
        if record_id.trim().is_empty() {
            return Err(DataError::validation("record id must not be empty"));
        }
        if let Some(reserved) = RESERVED_FIELDS.iter().find(|name| fields.contains_key(**name)) {
            return Err(DataError::validation(format!("field '{}' is managed by the store", reserved)));
        }

        let insert = Operation::Insert {
            record_type: record_type.to_string(),
            record_id: record_id.to_string(),
            fields,
        };
        self.router.execute(insert).await?.into_record().map_err(unexpected_output)
    }

    async fn fetch(&self, record_type: &str, record_id: &str) -> DataResult<VersionedRecord> {
        let fetch = Operation::Fetch {
            record_type: record_type.to_string(),
            record_id: record_id.to_string(),
        };
        self.router.execute(fetch).await?.into_record().map_err(unexpected_output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::HealthMonitor;
    use crate::transport::{MemoryStore, MemoryTransport};
    use serde_json::{json, Value};
    use steadfast_types::models::config::HealthConfig;
    use steadfast_types::AuditAction;

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            _ => Fields::new(),
        }
    }

    fn guard() -> (ConcurrencyGuard, Arc<MemoryStore>) {
        let (primary, secondary, store) = MemoryTransport::pair();
        let monitor = HealthMonitor::new(primary.clone(), HealthConfig::default());
        let router = Arc::new(TransportRouter::new(primary, secondary, monitor));
        store.seed(VersionedRecord::new("job", "J-1", fields(json!({"status": "open"}))));
        (ConcurrencyGuard::new(router), store)
    }

    #[tokio::test]
    async fn test_update_advances_version_by_one() {
        let (guard, store) = guard();
        let outcome = guard
            .conditional_update("job", "J-1", 1, fields(json!({"status": "done"})), None)
            .await
            .unwrap();

        let write = outcome.into_result().unwrap();
        assert_eq!(write.record.version, 2);
        assert!(write.audit.is_none());
        assert_eq!(store.get("job", "J-1").unwrap().field("status"), Some(&json!("done")));
    }

    #[tokio::test]
    async fn test_stale_version_is_conflict_value() {
        let (guard, _) = guard();
        guard.conditional_update("job", "J-1", 1, fields(json!({"status": "done"})), None).await.unwrap();

        let outcome = guard
            .conditional_update("job", "J-1", 1, fields(json!({"status": "cancelled"})), None)
            .await
            .unwrap();
        match outcome {
            WriteOutcome::Conflict(descriptor) => {
                assert_eq!(descriptor.expected_version, 1);
                assert_eq!(descriptor.actual_version, 2);
            },
            WriteOutcome::Updated(_) => panic!("stale write must not land"),
        }
    }

    #[tokio::test]
    async fn test_missing_record_is_not_found() {
        let (guard, _) = guard();
        let err = guard
            .conditional_update("job", "J-404", 1, fields(json!({"status": "done"})), None)
            .await
            .unwrap_err();
        assert!(matches!(err, DataError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_noop_change_still_increments() {
        let (guard, _) = guard();
        let write = guard
            .conditional_update("job", "J-1", 1, fields(json!({"status": "open"})), None)
            .await
            .unwrap()
            .into_result()
            .unwrap();
        assert_eq!(write.record.version, 2);
    }

    #[tokio::test]
    async fn test_invalid_input_rejected_before_write() {
        let (guard, store) = guard();

        for (version, changes) in [
            (0, fields(json!({"status": "done"}))),
            (1, Fields::new()),
            (1, fields(json!({"version": 9}))),
        ] {
            let err = guard.conditional_update("job", "J-1", version, changes, None).await.unwrap_err();
            assert!(matches!(err, DataError::Validation { .. }));
        }
        assert_eq!(store.get("job", "J-1").unwrap().version, 1);
    }

    #[tokio::test]
    async fn test_audit_commits_with_write() {
        let (guard, store) = guard();
        let draft = AuditDraft::new("user-1", AuditAction::ForceOverwrite, "confirmed by phone");

        let write = guard
            .conditional_update("job", "J-1", 1, fields(json!({"status": "done"})), Some(draft))
            .await
            .unwrap()
            .into_result()
            .unwrap();

        let entry = write.audit.unwrap();
        assert_eq!(entry.old_value, json!({"status": "open"}));
        assert_eq!(store.audit_entries(), vec![entry]);
    }

    #[tokio::test]
    async fn test_create_starts_at_version_one() {
        let (guard, _) = guard();
        let record = guard.create("job", "J-2", fields(json!({"status": "open"}))).await.unwrap();
        assert_eq!(record.version, 1);

        let err = guard.create("job", "J-2", Fields::new()).await.unwrap_err();
        assert!(matches!(err, DataError::Validation { .. }));
    }
}
