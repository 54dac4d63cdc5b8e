//! Domain models shared between the core and its callers.

mod audit;
pub mod config;
mod conflict;
mod health;
mod record;

pub use audit::{AuditAction, AuditDraft, AuditEntry};
pub use config::SteadfastConfig;
pub use conflict::{ConflictDescriptor, ConflictView};
pub use health::{HealthMode, HealthSnapshot, TransportKind};
pub use record::{Fields, Query, VersionedRecord, RESERVED_FIELDS};
