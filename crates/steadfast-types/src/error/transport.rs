//! Transport-level errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors a single transport can report for one operation.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "details")]
pub enum TransportError {
    /// The call did not complete in time
    #[error("Transport timeout after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// The backing endpoint refused or dropped the connection
    #[error("Connection refused by {endpoint}")]
    ConnectionRefused { endpoint: String },

    /// Upstream gateway answered with a server-side failure (5xx)
    #[error("Upstream gateway error {status}: {message}")]
    Gateway { status: u16, message: String },

    /// Transport is unusable for another infrastructure reason (pool closed, I/O)
    #[error("Transport unavailable: {message}")]
    Unavailable { message: String },

    /// The addressed record does not exist
    #[error("{record_type} {record_id} not found")]
    NotFound { record_type: String, record_id: String },

    /// A record with the same identity already exists
    #[error("{record_type} {record_id} already exists")]
    Duplicate { record_type: String, record_id: String },

    /// The store understood the request but refused it
    #[error("Request rejected: {message}")]
    Rejected { message: String },

    /// The store answered with something that could not be decoded
    #[error("Malformed response: {message}")]
    Malformed { message: String },
}

impl TransportError {
    /// Check if this is an infrastructure failure rather than a domain answer.
    ///
    /// Only these failures demote the primary transport.
    pub fn is_transport_failure(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. }
                | Self::ConnectionRefused { .. }
                | Self::Gateway { .. }
                | Self::Unavailable { .. }
        )
    }

    /// Classify an HTTP status code returned by a REST/RPC style store.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            408 | 504 => Self::Timeout { duration_ms: 0 },
            500..=599 => Self::Gateway { status, message },
            _ => Self::Rejected { message: format!("HTTP {}: {}", status, message) },
        }
    }
}
