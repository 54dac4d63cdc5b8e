//! Per-record-type protected field lists.

use std::collections::{BTreeMap, BTreeSet};

use steadfast_types::{Fields, SteadfastConfig};

/// Fields whose change always needs a justification and an audit entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProtectedFields {
    by_type: BTreeMap<String, BTreeSet<String>>,
}

impl ProtectedFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &SteadfastConfig) -> Self {
        let mut protected = Self::new();
        for (record_type, fields) in &config.protected_fields {
            for field in fields {
                protected = protected.with(record_type, field);
            }
        }
        protected
    }

    pub fn with(mut self, record_type: impl Into<String>, field: impl Into<String>) -> Self {
        self.by_type.entry(record_type.into()).or_default().insert(field.into());
        self
    }

    pub fn is_protected(&self, record_type: &str, field: &str) -> bool {
        self.by_type.get(record_type).is_some_and(|fields| fields.contains(field))
    }

    /// Protected field names present in `changes`, sorted.
    pub fn touched(&self, record_type: &str, changes: &Fields) -> Vec<String> {
        let Some(fields) = self.by_type.get(record_type) else {
            return Vec::new();
        };
        fields.iter().filter(|field| changes.contains_key(field.as_str())).cloned().collect()
    }
}
