//! Versioned business records and read queries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Free-form business fields of a record.
pub type Fields = serde_json::Map<String, Value>;

/// Field names owned by the store. Callers may never write them.
pub const RESERVED_FIELDS: &[&str] = &["id", "version"];

/// A mutable business entity guarded by optimistic concurrency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionedRecord {
    pub record_type: String,
    pub id: String,
    /// Compare-and-set token; starts at 1 and grows by exactly 1 per write
    pub version: u64,
    pub fields: Fields,
    pub updated_at: DateTime<Utc>,
}

impl VersionedRecord {
    /// A freshly created record at version 1.
    pub fn new(record_type: impl Into<String>, id: impl Into<String>, fields: Fields) -> Self {
        Self {
            record_type: record_type.into(),
            id: id.into(),
            version: 1,
            fields,
            updated_at: Utc::now(),
        }
    }

    /// Fields after shallow-merging `changes` over the current values.
    ///
    /// An explicit `null` stores `null`; it does not remove the key.
    pub fn merged_fields(&self, changes: &Fields) -> Fields {
        let mut merged = self.fields.clone();
        for (key, value) in changes {
            merged.insert(key.clone(), value.clone());
        }
        merged
    }

    /// The record as it looks after a successful conditional write.
    pub fn advanced(&self, changes: &Fields) -> Self {
        Self {
            record_type: self.record_type.clone(),
            id: self.id.clone(),
            version: self.version + 1,
            fields: self.merged_fields(changes),
            updated_at: Utc::now(),
        }
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

/// Equality-filtered read over one record type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Query {
    /// Field name -> required value
    #[serde(default)]
    pub filters: BTreeMap<String, Value>,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.insert(field.into(), value.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Check whether a record's fields satisfy every filter.
    pub fn matches(&self, fields: &Fields) -> bool {
        self.filters.iter().all(|(key, expected)| fields.get(key) == Some(expected))
    }
}
