//! Transport capability shared by the primary and secondary query paths.
//!
//! ```text
//! ┌────────────────────┐      ┌───────────────────────────┐
//! │  TransportRouter   │─────▶│ primary: PostgresTransport │
//! │  (match on mode)   │      └───────────────────────────┘
//! │                    │      ┌───────────────────────────┐
//! │                    │─────▶│ secondary: RpcTransport    │
//! └────────────────────┘      └───────────────────────────┘
//! ```
//!
//! Both paths reach the same backing store. `MemoryTransport` stands in for
//! either one in tests and local development.

mod memory;
mod postgres;
mod rpc;

pub use memory::{MemoryStore, MemoryTransport};
pub use postgres::{redact_credentials, PostgresTransport};
pub use rpc::RpcTransport;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use steadfast_types::{AuditDraft, AuditEntry, Fields, Query, TransportError, VersionedRecord};

/// One named operation against the backing store.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// Side-effect-free liveness check
    Ping,
    Query { record_type: String, query: Query },
    Fetch { record_type: String, record_id: String },
    /// Create a record at version 1
    Insert { record_type: String, record_id: String, fields: Fields },
    ConditionalUpdate(ConditionalUpdate),
    AuditTrail { record_type: String, record_id: String },
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ping => "ping",
            Self::Query { .. } => "query",
            Self::Fetch { .. } => "fetch",
            Self::Insert { .. } => "insert",
            Self::ConditionalUpdate(_) => "conditional_update",
            Self::AuditTrail { .. } => "audit_trail",
        }
    }

    /// Whether replaying this operation can double-apply a change.
    pub fn is_mutation(&self) -> bool {
        matches!(self, Self::Insert { .. } | Self::ConditionalUpdate(_))
    }
}

/// Compare-and-set write: applies only if the stored version equals `expected_version`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionalUpdate {
    pub record_type: String,
    pub record_id: String,
    pub expected_version: u64,
    pub changes: Fields,
    /// Committed atomically with the write when present
    #[serde(default)]
    pub audit: Option<AuditDraft>,
}

/// Result of a compare-and-set write.
#[derive(Debug, Clone, PartialEq)]
pub enum CasOutcome {
    /// Exactly one row matched and now carries `expected_version + 1`
    Applied { record: VersionedRecord, audit: Option<AuditEntry> },
    /// Zero rows matched; the record may or may not exist
    NoMatch,
}

/// Successful output of an [`Operation`].
#[derive(Debug, Clone, PartialEq)]
pub enum OperationOutput {
    Pong,
    Records(Vec<VersionedRecord>),
    Record(VersionedRecord),
    Update(CasOutcome),
    AuditEntries(Vec<AuditEntry>),
}

impl OperationOutput {
    fn variant(&self) -> &'static str {
        match self {
            Self::Pong => "pong",
            Self::Records(_) => "records",
            Self::Record(_) => "record",
            Self::Update(_) => "update",
            Self::AuditEntries(_) => "audit entries",
        }
    }

    fn unexpected(self, wanted: &str) -> TransportError {
        TransportError::Malformed { message: format!("expected {}, got {}", wanted, self.variant()) }
    }

    pub fn into_records(self) -> Result<Vec<VersionedRecord>, TransportError> {
        match self {
            Self::Records(records) => Ok(records),
            other => Err(other.unexpected("records")),
        }
    }

    pub fn into_record(self) -> Result<VersionedRecord, TransportError> {
        match self {
            Self::Record(record) => Ok(record),
            other => Err(other.unexpected("record")),
        }
    }

    pub fn into_update(self) -> Result<CasOutcome, TransportError> {
        match self {
            Self::Update(outcome) => Ok(outcome),
            other => Err(other.unexpected("update")),
        }
    }

    pub fn into_audit_entries(self) -> Result<Vec<AuditEntry>, TransportError> {
        match self {
            Self::AuditEntries(entries) => Ok(entries),
            other => Err(other.unexpected("audit entries")),
        }
    }
}

/// A backing query path.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Short name for logs and metrics
    fn name(&self) -> &str;

    async fn execute(&self, operation: Operation) -> Result<OperationOutput, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mutations_are_flagged() {
        let update = Operation::ConditionalUpdate(ConditionalUpdate {
            record_type: "job".to_string(),
            record_id: "J-1".to_string(),
            expected_version: 1,
            changes: Fields::new(),
            audit: None,
        });
        assert!(update.is_mutation());
        assert!(!Operation::Ping.is_mutation());
        assert!(!Operation::Fetch { record_type: "job".to_string(), record_id: "J-1".to_string() }
            .is_mutation());
    }

    #[test]
    fn test_output_mismatch_is_malformed() {
        let err = OperationOutput::Pong.into_record().unwrap_err();
        assert!(matches!(err, TransportError::Malformed { .. }));
        assert!(!err.is_transport_failure());
    }
}
