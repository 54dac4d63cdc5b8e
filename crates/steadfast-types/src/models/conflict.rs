//! Version conflict descriptors.

use serde::{Deserialize, Serialize};

/// Produced when a conditional write matched zero rows on an existing record.
///
/// Ephemeral: handed to the caller, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictDescriptor {
    pub record_type: String,
    pub record_id: String,
    pub expected_version: u64,
    pub actual_version: u64,
}

impl ConflictDescriptor {
    /// Number of writes that landed since the caller's read.
    pub fn changes_missed(&self) -> u64 {
        self.actual_version.saturating_sub(self.expected_version)
    }

    pub fn view(&self) -> ConflictView {
        ConflictView {
            record_type: self.record_type.clone(),
            record_id: self.record_id.clone(),
            expected_version: self.expected_version,
            actual_version: self.actual_version,
            changes_missed: self.changes_missed(),
        }
    }
}

/// What a resolution UI shows for a presented conflict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictView {
    pub record_type: String,
    pub record_id: String,
    pub expected_version: u64,
    pub actual_version: u64,
    pub changes_missed: u64,
}
