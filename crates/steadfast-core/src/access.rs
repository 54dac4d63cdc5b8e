//! Caller-facing data-access contract.
//!
//! Reads are routed and retried. Writes are routed and version-guarded, and
//! never retried. Health state and conflict resolution are exposed here so
//! callers never touch the monitor or the transports directly.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::task::JoinHandle;

use steadfast_types::{
    AuditAction, AuditDraft, AuditEntry, ConflictDescriptor, DataError, DataResult, Fields,
    HealthSnapshot, Query, SteadfastConfig, VersionedRecord,
};

use crate::guard::{ConcurrencyGuard, WriteOutcome};
use crate::health::HealthMonitor;
use crate::protected::ProtectedFields;
use crate::resolution::{ConflictResolver, Decision, Resolution};
use crate::retry::{with_retry, RetryPolicy};
use crate::router::{unexpected_output, TransportRouter};
use crate::transport::{Operation, Transport};

pub struct DataAccess {
    monitor: Arc<HealthMonitor>,
    router: Arc<TransportRouter>,
    guard: Arc<ConcurrencyGuard>,
    resolver: ConflictResolver,
    protected: ProtectedFields,
    retry: RetryPolicy,
    probe_task: Mutex<Option<JoinHandle<()>>>,
}

impl DataAccess {
    pub fn new(
        primary: Arc<dyn Transport>,
        secondary: Arc<dyn Transport>,
        config: &SteadfastConfig,
    ) -> Self {
        let monitor = HealthMonitor::new(Arc::clone(&primary), config.health.clone());
        let router = Arc::new(TransportRouter::new(primary, secondary, Arc::clone(&monitor)));
        let guard = Arc::new(ConcurrencyGuard::new(Arc::clone(&router)));
        let protected = ProtectedFields::from_config(config);
        let retry = RetryPolicy::from_config(&config.retry);
        let resolver =
            ConflictResolver::new(Arc::clone(&guard), Arc::clone(&router), protected.clone(), retry);

        Self { monitor, router, guard, resolver, protected, retry, probe_task: Mutex::new(None) }
    }

    pub fn monitor(&self) -> &Arc<HealthMonitor> {
        &self.monitor
    }

    pub fn protected_fields(&self) -> &ProtectedFields {
        &self.protected
    }

    /// Records of `record_type` matching `query`.
    pub async fn read(&self, record_type: &str, query: Query) -> DataResult<Vec<VersionedRecord>> {
        let label = format!("read {}", record_type);
        with_retry(&self.retry, &label, || {
            let operation = Operation::Query { record_type: record_type.to_string(), query: query.clone() };
            async move { self.router.execute(operation).await?.into_records().map_err(unexpected_output) }
        })
        .await
    }

    pub async fn fetch(&self, record_type: &str, record_id: &str) -> DataResult<VersionedRecord> {
        let label = format!("fetch {}/{}", record_type, record_id);
        with_retry(&self.retry, &label, || {
            let operation = Operation::Fetch {
                record_type: record_type.to_string(),
                record_id: record_id.to_string(),
            };
            async move { self.router.execute(operation).await?.into_record().map_err(unexpected_output) }
        })
        .await
    }

    /// Entries for one record, oldest first.
    pub async fn audit_trail(&self, record_type: &str, record_id: &str) -> DataResult<Vec<AuditEntry>> {
        let label = format!("audit {}/{}", record_type, record_id);
        with_retry(&self.retry, &label, || {
            let operation = Operation::AuditTrail {
                record_type: record_type.to_string(),
                record_id: record_id.to_string(),
            };
            async move {
                self.router.execute(operation).await?.into_audit_entries().map_err(unexpected_output)
            }
        })
        .await
    }

    pub async fn create(&self, record_type: &str, record_id: &str, fields: Fields) -> DataResult<VersionedRecord> {
        self.guard.create(record_type, record_id, fields).await
    }

    /// Version-guarded write. Changes naming a protected field are rejected;
    /// use [`write_justified`](Self::write_justified) for those.
    pub async fn write(
        &self,
        record_type: &str,
        record_id: &str,
        expected_version: u64,
        changes: Fields,
    ) -> DataResult<WriteOutcome> {
        let touched = self.protected.touched(record_type, &changes);
        if !touched.is_empty() {
            return Err(DataError::validation(format!(
                "protected field(s) {} require a justification",
                touched.join(", ")
            )));
        }
        self.guard.conditional_update(record_type, record_id, expected_version, changes, None).await
    }

    /// Version-guarded write that may change protected fields.
    ///
    /// When protected fields are touched, a `protected-field-change` entry
    /// scoped to those fields commits with the write.
    pub async fn write_justified(
        &self,
        actor_id: &str,
        record_type: &str,
        record_id: &str,
        expected_version: u64,
        changes: Fields,
        justification: &str,
    ) -> DataResult<WriteOutcome> {
        let touched = self.protected.touched(record_type, &changes);
        if touched.is_empty() {
            return self.guard.conditional_update(record_type, record_id, expected_version, changes, None).await;
        }
        if justification.trim().is_empty() {
            return Err(DataError::validation(format!(
                "protected field(s) {} require a justification",
                touched.join(", ")
            )));
        }
        if actor_id.trim().is_empty() {
            return Err(DataError::validation("actor id must not be empty"));
        }

        tracing::warn!(
            actor = %actor_id,
            record_type = %record_type,
            record_id = %record_id,
            fields = %touched.join(","),
            "Protected field change requested"
        );
        let draft = AuditDraft::new(actor_id, AuditAction::ProtectedFieldChange, justification)
            .with_scope(touched);
        self.guard
            .conditional_update(record_type, record_id, expected_version, changes, Some(draft))
            .await
    }

    pub async fn resolve_conflict(
        &self,
        actor_id: &str,
        descriptor: &ConflictDescriptor,
        decision: Decision,
    ) -> DataResult<Resolution> {
        self.resolver.resolve(actor_id, descriptor, decision).await
    }

    pub fn resolver(&self) -> &ConflictResolver {
        &self.resolver
    }

    pub fn current_health_mode(&self) -> HealthSnapshot {
        self.monitor.snapshot()
    }

    pub async fn manual_health_check(&self) -> bool {
        self.monitor.manual_probe().await
    }

    /// Start the periodic probe. A second call keeps the running task.
    pub fn start_background_probe(&self) {
        let mut task = self.probe_task.lock();
        if task.is_none() {
            tracing::info!(
                interval_secs = self.monitor.config().probe_interval_secs,
                "Starting periodic health probe"
            );
            *task = Some(self.monitor.start_probe_task());
        }
    }

    /// Stop the periodic probe and wait for it to exit.
    pub async fn shutdown(&self) {
        self.monitor.shutdown();
        let task = self.probe_task.lock().take();
        if let Some(task) = task {
            if let Err(err) = task.await {
                tracing::warn!(error = %err, "Health probe task ended abnormally");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{MemoryStore, MemoryTransport};
    use serde_json::{json, Value};
    use steadfast_types::{HealthMode, TransportError};

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            _ => Fields::new(),
        }
    }

    fn access() -> (DataAccess, Arc<MemoryTransport>, Arc<MemoryTransport>, Arc<MemoryStore>) {
        let (primary, secondary, store) = MemoryTransport::pair();
        let mut config = SteadfastConfig::new();
        config
            .protected_fields
            .insert("customer".to_string(), vec!["billing_contact".to_string()]);
        let access = DataAccess::new(primary.clone(), secondary.clone(), &config);
        store.seed(VersionedRecord::new(
            "customer",
            "C-1",
            fields(json!({"name": "Acme", "billing_contact": "ap@acme.test"})),
        ));
        (access, primary, secondary, store)
    }

    #[tokio::test]
    async fn test_read_filters_records() {
        let (access, _, _, store) = access();
        store.seed(VersionedRecord::new("customer", "C-2", fields(json!({"name": "Birch"}))));

        let found = access.read("customer", Query::new().filter("name", "Birch")).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "C-2");
    }

    #[tokio::test]
    async fn test_plain_write_rejects_protected_field() {
        let (access, primary, _, _) = access();
        let err = access
            .write("customer", "C-1", 1, fields(json!({"billing_contact": "new@acme.test"})))
            .await
            .unwrap_err();
        assert!(matches!(err, DataError::Validation { .. }));
        assert_eq!(primary.calls(), 0);
    }

    #[tokio::test]
    async fn test_justified_write_audits_protected_fields_only() {
        let (access, _, _, store) = access();
        let outcome = access
            .write_justified(
                "user-3",
                "customer",
                "C-1",
                1,
                fields(json!({"billing_contact": "new@acme.test", "name": "Acme Ltd"})),
                "contact changed per email",
            )
            .await
            .unwrap();

        let write = outcome.into_result().unwrap();
        assert_eq!(write.record.version, 2);
        let entry = write.audit.unwrap();
        assert_eq!(entry.action, AuditAction::ProtectedFieldChange);
        assert_eq!(entry.old_value, json!({"billing_contact": "ap@acme.test"}));
        assert_eq!(entry.new_value, json!({"billing_contact": "new@acme.test"}));
        assert_eq!(store.audit_entries().len(), 1);
    }

    #[tokio::test]
    async fn test_justified_write_without_protected_fields_is_plain() {
        let (access, _, _, store) = access();
        access
            .write_justified("user-3", "customer", "C-1", 1, fields(json!({"name": "Acme Ltd"})), "")
            .await
            .unwrap()
            .into_result()
            .unwrap();
        assert!(store.audit_entries().is_empty());
    }

    #[tokio::test]
    async fn test_protected_change_needs_justification() {
        let (access, primary, _, store) = access();
        let err = access
            .write_justified(
                "user-3",
                "customer",
                "C-1",
                1,
                fields(json!({"billing_contact": "new@acme.test"})),
                " ",
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DataError::Validation { .. }));
        assert_eq!(primary.calls(), 0);
        assert_eq!(store.get("customer", "C-1").unwrap().version, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_retries_through_fallback() {
        let (access, primary, secondary, _) = access();
        primary.fail_with(TransportError::Timeout { duration_ms: 5000 });

        // First attempt fails on the primary and demotes; the retry lands on the secondary
        let record = access.fetch("customer", "C-1").await.unwrap();

        assert_eq!(record.id, "C-1");
        assert_eq!(access.current_health_mode().mode, HealthMode::FallbackActive);
        assert!(secondary.calls() >= 1);
    }

    #[tokio::test]
    async fn test_fetch_not_found_is_not_retried() {
        let (access, primary, _, _) = access();
        let err = access.fetch("customer", "C-404").await.unwrap_err();
        assert!(matches!(err, DataError::NotFound { .. }));
        assert_eq!(primary.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_probe_starts_once_and_stops() {
        let (access, primary, _, _) = access();
        access.start_background_probe();
        access.start_background_probe();

        tokio::time::sleep(std::time::Duration::from_secs(31)).await;
        assert_eq!(primary.calls(), 1);

        access.shutdown().await;
        tokio::time::sleep(std::time::Duration::from_secs(120)).await;
        assert_eq!(primary.calls(), 1);
    }
}
