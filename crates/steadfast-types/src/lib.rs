//! # Steadfast Types
//!
//! Core types, models, and error definitions for the Steadfast data-access core.
//!
//! - **`error`** - Typed error hierarchy for transports, data access, and configuration
//! - **`models`** - Domain models (health mode, versioned records, conflicts, audit entries)
//!
//! ## Architecture Role
//!
//! `steadfast-types` sits at the bottom of the dependency graph:
//!
//! ```text
//!        steadfast-types (this crate)
//!                 │
//!                 ▼
//!          steadfast-core
//!                 │
//!                 ▼
//!         steadfast-server
//! ```
//!
//! All types are serializable via serde so they can cross the HTTP boundary
//! unchanged, and `Clone` for cheap sharing across async tasks.

pub mod error;
pub mod models;

// Re-export error types for convenience
pub use error::{ConfigError, DataError, DataResult, TransportError};

// Re-export core model types
pub use models::{
    AuditAction, AuditDraft, AuditEntry, ConflictDescriptor, ConflictView, Fields, HealthMode,
    HealthSnapshot, Query, SteadfastConfig, TransportKind, VersionedRecord, RESERVED_FIELDS,
};
