//! Caller-facing data-access errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{ConflictDescriptor, TransportKind};

/// Errors surfaced by the data-access contract.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "details")]
pub enum DataError {
    /// The primary transport failed this call; a health re-check is under way
    #[error("Primary transport unavailable: {reason}")]
    PrimaryUnavailable { reason: String },

    /// A transport failed with no further fallback tier
    #[error("{transport} transport unavailable: {reason}")]
    TransportUnavailable { transport: TransportKind, reason: String },

    /// The addressed record does not exist
    #[error("{record_type} {record_id} not found")]
    NotFound { record_type: String, record_id: String },

    /// The stored version moved on since the caller last read the record
    #[error(
        "Version conflict on {} {}: expected v{}, found v{}",
        .0.record_type, .0.record_id, .0.expected_version, .0.actual_version
    )]
    VersionConflict(ConflictDescriptor),

    /// Caller input was rejected before any write was attempted
    #[error("Validation failed: {message}")]
    Validation { message: String },

    /// The store refused the request or answered with something unusable
    #[error("Storage error: {message}")]
    Storage { message: String },
}

impl DataError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation { message: message.into() }
    }

    /// Check if a read that failed with this error may be attempted again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::PrimaryUnavailable { .. } | Self::TransportUnavailable { .. })
    }

    /// Get HTTP status code for this error.
    pub fn http_status_code(&self) -> u16 {
        match self {
            Self::PrimaryUnavailable { .. } | Self::TransportUnavailable { .. } => 503,
            Self::NotFound { .. } => 404,
            Self::VersionConflict(_) => 409,
            Self::Validation { .. } => 422,
            Self::Storage { .. } => 502,
        }
    }
}
