//! Audit trail models for overrides and protected-field changes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::record::Fields;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuditAction {
    Merge,
    ForceOverwrite,
    ProtectedFieldChange,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Merge => "merge",
            Self::ForceOverwrite => "force-overwrite",
            Self::ProtectedFieldChange => "protected-field-change",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "merge" => Some(Self::Merge),
            "force-overwrite" => Some(Self::ForceOverwrite),
            "protected-field-change" => Some(Self::ProtectedFieldChange),
            _ => None,
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable record of who overrode what, and why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub actor_id: String,
    pub record_type: String,
    pub record_id: String,
    pub action: AuditAction,
    pub justification: String,
    /// Previous values of the audited fields
    pub old_value: Value,
    /// Values of the audited fields after the write
    pub new_value: Value,
    pub timestamp: DateTime<Utc>,
}

/// Audit intent attached to a conditional update.
///
/// Transports materialize it into an [`AuditEntry`] in the same atomic step
/// as the write, so an entry exists if and only if the write landed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditDraft {
    pub actor_id: String,
    pub action: AuditAction,
    pub justification: String,
    /// Fields to capture; `None` captures every changed field
    #[serde(default)]
    pub scope: Option<Vec<String>>,
}

impl AuditDraft {
    pub fn new(actor_id: impl Into<String>, action: AuditAction, justification: impl Into<String>) -> Self {
        Self {
            actor_id: actor_id.into(),
            action,
            justification: justification.into(),
            scope: None,
        }
    }

    pub fn with_scope(mut self, fields: Vec<String>) -> Self {
        self.scope = Some(fields);
        self
    }

    /// Build the entry from the record state around the write.
    pub fn materialize(
        &self,
        record_type: &str,
        record_id: &str,
        before: &Fields,
        changes: &Fields,
    ) -> AuditEntry {
        let keys: Vec<String> = match &self.scope {
            Some(scope) => scope.clone(),
            None => changes.keys().cloned().collect(),
        };

        let mut old_value = Fields::new();
        let mut new_value = Fields::new();
        for key in keys {
            old_value.insert(key.clone(), before.get(&key).cloned().unwrap_or(Value::Null));
            let after = changes.get(&key).or_else(|| before.get(&key)).cloned();
            new_value.insert(key, after.unwrap_or(Value::Null));
        }

        AuditEntry {
            id: Uuid::new_v4(),
            actor_id: self.actor_id.clone(),
            record_type: record_type.to_string(),
            record_id: record_id.to_string(),
            action: self.action,
            justification: self.justification.clone(),
            old_value: Value::Object(old_value),
            new_value: Value::Object(new_value),
            timestamp: Utc::now(),
        }
    }
}
