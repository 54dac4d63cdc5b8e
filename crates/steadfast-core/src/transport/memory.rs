//! In-memory transport for tests and local development.
//!
//! Several `MemoryTransport` handles can share one `MemoryStore`, so a test
//! can break the primary path while the secondary keeps serving the same data.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use steadfast_types::{AuditEntry, Fields, TransportError, VersionedRecord};

use super::{CasOutcome, ConditionalUpdate, Operation, OperationOutput, Transport};

type RecordKey = (String, String);

/// Shared backing data: records plus the append-only audit log.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<BTreeMap<RecordKey, VersionedRecord>>,
    audit: Mutex<Vec<AuditEntry>>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Put a record in place directly, bypassing version checks.
    pub fn seed(&self, record: VersionedRecord) {
        self.records.lock().insert((record.record_type.clone(), record.id.clone()), record);
    }

    pub fn get(&self, record_type: &str, record_id: &str) -> Option<VersionedRecord> {
        self.records.lock().get(&(record_type.to_string(), record_id.to_string())).cloned()
    }

    pub fn audit_entries(&self) -> Vec<AuditEntry> {
        self.audit.lock().clone()
    }

    fn query(&self, record_type: &str, query: &steadfast_types::Query) -> Vec<VersionedRecord> {
        let records = self.records.lock();
        let matching = records
            .values()
            .filter(|record| record.record_type == record_type && query.matches(&record.fields))
            .cloned();
        match query.limit {
            Some(limit) => matching.take(limit).collect(),
            None => matching.collect(),
        }
    }

    fn insert(
        &self,
        record_type: String,
        record_id: String,
        fields: Fields,
    ) -> Result<VersionedRecord, TransportError> {
        let mut records = self.records.lock();
        let key = (record_type, record_id);
        if records.contains_key(&key) {
            return Err(TransportError::Duplicate { record_type: key.0, record_id: key.1 });
        }
        let record = VersionedRecord::new(key.0.clone(), key.1.clone(), fields);
        records.insert(key, record.clone());
        Ok(record)
    }

    /// Compare-and-set under a single lock; the audit entry lands in the same critical section.
    fn conditional_update(&self, update: ConditionalUpdate) -> CasOutcome {
        let mut records = self.records.lock();
        let key = (update.record_type, update.record_id);
        let Some(current) = records.get_mut(&key) else {
            return CasOutcome::NoMatch;
        };
        if current.version != update.expected_version {
            return CasOutcome::NoMatch;
        }

        let audit = update
            .audit
            .map(|draft| draft.materialize(&key.0, &key.1, &current.fields, &update.changes));
        *current = current.advanced(&update.changes);
        let record = current.clone();
        drop(records);

        if let Some(entry) = &audit {
            self.audit.lock().push(entry.clone());
        }
        CasOutcome::Applied { record, audit }
    }

    fn audit_trail(&self, record_type: &str, record_id: &str) -> Vec<AuditEntry> {
        let mut entries: Vec<AuditEntry> = self
            .audit
            .lock()
            .iter()
            .filter(|entry| entry.record_type == record_type && entry.record_id == record_id)
            .cloned()
            .collect();
        entries.sort_by_key(|entry| entry.timestamp);
        entries
    }
}

#[derive(Debug, Clone)]
enum Fault {
    None,
    Always(TransportError),
    Next { remaining: u32, error: TransportError },
}

/// Transport handle over a [`MemoryStore`] with fault injection.
#[derive(Debug)]
pub struct MemoryTransport {
    name: String,
    store: Arc<MemoryStore>,
    fault: Mutex<Fault>,
    latency: Mutex<Option<Duration>>,
    calls: AtomicU64,
}

impl MemoryTransport {
    pub fn new(name: impl Into<String>, store: Arc<MemoryStore>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            store,
            fault: Mutex::new(Fault::None),
            latency: Mutex::new(None),
            calls: AtomicU64::new(0),
        })
    }

    /// Primary and secondary handles over one fresh store.
    pub fn pair() -> (Arc<Self>, Arc<Self>, Arc<MemoryStore>) {
        let store = MemoryStore::new();
        let primary = Self::new("memory-primary", Arc::clone(&store));
        let secondary = Self::new("memory-secondary", Arc::clone(&store));
        (primary, secondary, store)
    }

    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }

    /// Fail every call with `error` until [`heal`](Self::heal).
    pub fn fail_with(&self, error: TransportError) {
        *self.fault.lock() = Fault::Always(error);
    }

    /// Fail the next `count` calls, then behave normally.
    pub fn fail_next(&self, count: u32, error: TransportError) {
        *self.fault.lock() = Fault::Next { remaining: count, error };
    }

    pub fn heal(&self) {
        *self.fault.lock() = Fault::None;
    }

    /// Delay every call, e.g. to push probes past their deadline.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock() = latency;
    }

    /// Number of operations this handle has received.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    fn take_fault(&self) -> Option<TransportError> {
        let mut fault = self.fault.lock();
        match &mut *fault {
            Fault::None => None,
            Fault::Always(error) => Some(error.clone()),
            Fault::Next { remaining, error } => {
                let error = error.clone();
                *remaining = remaining.saturating_sub(1);
                if *remaining == 0 {
                    *fault = Fault::None;
                }
                Some(error)
            },
        }
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, operation: Operation) -> Result<OperationOutput, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if let Some(error) = self.take_fault() {
            return Err(error);
        }

        match operation {
            Operation::Ping => Ok(OperationOutput::Pong),
            Operation::Query { record_type, query } => {
                Ok(OperationOutput::Records(self.store.query(&record_type, &query)))
            },
            Operation::Fetch { record_type, record_id } => self
                .store
                .get(&record_type, &record_id)
                .map(OperationOutput::Record)
                .ok_or(TransportError::NotFound { record_type, record_id }),
            Operation::Insert { record_type, record_id, fields } => {
                self.store.insert(record_type, record_id, fields).map(OperationOutput::Record)
            },
            Operation::ConditionalUpdate(update) => {
                Ok(OperationOutput::Update(self.store.conditional_update(update)))
            },
            Operation::AuditTrail { record_type, record_id } => {
                Ok(OperationOutput::AuditEntries(self.store.audit_trail(&record_type, &record_id)))
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn update(expected_version: u64) -> ConditionalUpdate {
        let mut changes = Fields::new();
        changes.insert("status".to_string(), json!("done"));
        ConditionalUpdate {
            record_type: "job".to_string(),
            record_id: "J-1".to_string(),
            expected_version,
            changes,
            audit: None,
        }
    }

    #[tokio::test]
    async fn test_cas_applies_only_on_matching_version() {
        let (primary, _, store) = MemoryTransport::pair();
        store.seed(VersionedRecord::new("job", "J-1", Fields::new()));

        let stale = primary.execute(Operation::ConditionalUpdate(update(2))).await.unwrap();
        assert_eq!(stale, OperationOutput::Update(CasOutcome::NoMatch));

        let applied = primary.execute(Operation::ConditionalUpdate(update(1))).await.unwrap();
        match applied.into_update().unwrap() {
            CasOutcome::Applied { record, audit } => {
                assert_eq!(record.version, 2);
                assert!(audit.is_none());
            },
            CasOutcome::NoMatch => panic!("expected the write to apply"),
        }
    }

    #[tokio::test]
    async fn test_missing_record_is_no_match() {
        let (primary, _, _) = MemoryTransport::pair();
        let outcome = primary.execute(Operation::ConditionalUpdate(update(1))).await.unwrap();
        assert_eq!(outcome, OperationOutput::Update(CasOutcome::NoMatch));
    }

    #[tokio::test]
    async fn test_fail_next_recovers() {
        let (primary, secondary, _) = MemoryTransport::pair();
        primary.fail_next(2, TransportError::Timeout { duration_ms: 10 });

        assert!(primary.execute(Operation::Ping).await.is_err());
        assert!(primary.execute(Operation::Ping).await.is_err());
        assert!(primary.execute(Operation::Ping).await.is_ok());
        assert!(secondary.execute(Operation::Ping).await.is_ok());
        assert_eq!(primary.calls(), 3);
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicates() {
        let (primary, _, _) = MemoryTransport::pair();
        let insert = || Operation::Insert {
            record_type: "job".to_string(),
            record_id: "J-1".to_string(),
            fields: Fields::new(),
        };
        assert!(primary.execute(insert()).await.is_ok());
        assert!(matches!(
            primary.execute(insert()).await,
            Err(TransportError::Duplicate { .. })
        ));
    }
}
