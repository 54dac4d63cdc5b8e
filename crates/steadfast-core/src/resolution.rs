//! Conflict resolution: the decision surface for a detected version conflict.
//!
//! ```text
//!  Idle ──present──▶ ConflictPresented ──resolve──▶ Reloaded | ForcedOverwrite | Merged
//!   ▲                      ▲     │                          │
//!   │                      └─────┘ new conflict             │
//!   └─────────────────────────── finish ◀───────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use steadfast_types::{
    AuditAction, AuditDraft, ConflictDescriptor, ConflictView, DataError, DataResult, Fields,
    VersionedRecord,
};

use crate::guard::{validate_changes, CommittedWrite, ConcurrencyGuard, WriteOutcome};
use crate::protected::ProtectedFields;
use crate::retry::{with_retry, RetryPolicy};
use crate::router::{unexpected_output, TransportRouter};
use crate::transport::Operation;

/// What the caller chose to do about a conflict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "kebab-case")]
pub enum Decision {
    /// Drop the local edit and take the stored record
    Reload,
    /// Write `changes` over whatever is stored now
    ForceOverwrite { justification: String, changes: Fields },
    /// Apply the fields nobody else touched since `base`
    Merge { base: Fields, changes: Fields, justification: String },
}

impl Decision {
    fn justification(&self) -> Option<&str> {
        match self {
            Self::Reload => None,
            Self::ForceOverwrite { justification, .. } | Self::Merge { justification, .. } => {
                Some(justification)
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum Resolution {
    Reloaded { record: VersionedRecord },
    Overwritten { write: CommittedWrite },
    Merged {
        record: VersionedRecord,
        /// `None` when nothing was applicable and no write happened
        write: Option<CommittedWrite>,
        applied: Vec<String>,
        contested: Vec<String>,
    },
    /// The record moved again before the override landed
    Conflict { conflict: ConflictDescriptor },
}

pub struct ConflictResolver {
    guard: Arc<ConcurrencyGuard>,
    router: Arc<TransportRouter>,
    protected: ProtectedFields,
    retry: RetryPolicy,
}

impl ConflictResolver {
    pub fn new(
        guard: Arc<ConcurrencyGuard>,
        router: Arc<TransportRouter>,
        protected: ProtectedFields,
        retry: RetryPolicy,
    ) -> Self {
        Self { guard, router, protected, retry }
    }

    pub async fn resolve(
        &self,
        actor_id: &str,
        descriptor: &ConflictDescriptor,
        decision: Decision,
    ) -> DataResult<Resolution> {
        if let Some(justification) = decision.justification() {
            if justification.trim().is_empty() {
                return Err(DataError::validation("a justification is required to override a conflict"));
            }
            if actor_id.trim().is_empty() {
                return Err(DataError::validation("actor id must not be empty"));
            }
        }

        match decision {
            Decision::Reload => {
                let record = self.fetch(&descriptor.record_type, &descriptor.record_id).await?;
                tracing::info!(
                    record_type = %descriptor.record_type,
                    record_id = %descriptor.record_id,
                    version = record.version,
                    "Conflict resolved by reload"
                );
                Ok(Resolution::Reloaded { record })
            },
            Decision::ForceOverwrite { justification, changes } => {
                self.force_overwrite(actor_id, descriptor, justification, changes).await
            },
            Decision::Merge { base, changes, justification } => {
                self.merge(actor_id, descriptor, base, changes, justification).await
            },
        }
    }

    async fn force_overwrite(
        &self,
        actor_id: &str,
        descriptor: &ConflictDescriptor,
        justification: String,
        changes: Fields,
    ) -> DataResult<Resolution> {
        validate_changes(&changes)?;
        let draft = AuditDraft::new(actor_id, AuditAction::ForceOverwrite, justification);

        let outcome = self
            .guard
            .conditional_update(
                &descriptor.record_type,
                &descriptor.record_id,
                descriptor.actual_version,
                changes,
                Some(draft),
            )
            .await?;

        match outcome {
            WriteOutcome::Updated(write) => {
                tracing::warn!(
                    actor = %actor_id,
                    record_type = %descriptor.record_type,
                    record_id = %descriptor.record_id,
                    overwritten_version = descriptor.actual_version,
                    "Forced overwrite committed"
                );
                Ok(Resolution::Overwritten { write })
            },
            WriteOutcome::Conflict(conflict) => Ok(Resolution::Conflict { conflict }),
        }
    }

    async fn merge(
        &self,
        actor_id: &str,
        descriptor: &ConflictDescriptor,
        base: Fields,
        changes: Fields,
        justification: String,
    ) -> DataResult<Resolution> {
        validate_changes(&changes)?;
        let live = self.fetch(&descriptor.record_type, &descriptor.record_id).await?;
        let plan = plan_merge(&self.protected, &live, &base, changes);

        if plan.changes.is_empty() {
            tracing::info!(
                record_type = %descriptor.record_type,
                record_id = %descriptor.record_id,
                contested = plan.contested.len(),
                "Merge had nothing to apply"
            );
            return Ok(Resolution::Merged {
                record: live,
                write: None,
                applied: Vec::new(),
                contested: plan.contested,
            });
        }

        let applied: Vec<String> = plan.changes.keys().cloned().collect();
        let draft = AuditDraft::new(actor_id, AuditAction::Merge, justification);
        let outcome = self
            .guard
            .conditional_update(&live.record_type, &live.id, live.version, plan.changes, Some(draft))
            .await?;

        match outcome {
            WriteOutcome::Updated(write) => {
                tracing::info!(
                    actor = %actor_id,
                    record_type = %descriptor.record_type,
                    record_id = %descriptor.record_id,
                    applied = applied.len(),
                    contested = plan.contested.len(),
                    "Merge committed"
                );
                Ok(Resolution::Merged {
                    record: write.record.clone(),
                    write: Some(write),
                    applied,
                    contested: plan.contested,
                })
            },
            WriteOutcome::Conflict(conflict) => Ok(Resolution::Conflict { conflict }),
        }
    }

    async fn fetch(&self, record_type: &str, record_id: &str) -> DataResult<VersionedRecord> {
        with_retry(&self.retry, "conflict-reload", || async move {
            let fetch = Operation::Fetch {
                record_type: record_type.to_string(),
                record_id: record_id.to_string(),
            };
            self.router.execute(fetch).await?.into_record().map_err(unexpected_output)
        })
        .await
    }
}

struct MergePlan {
    changes: Fields,
    contested: Vec<String>,
}

/// Three-way field merge of the caller's `changes` against `live`, relative to `base`.
///
/// Protected fields are never merged automatically.
fn plan_merge(
    protected: &ProtectedFields,
    live: &VersionedRecord,
    base: &Fields,
    changes: Fields,
) -> MergePlan {
    let mut plan = MergePlan { changes: Fields::new(), contested: Vec::new() };

    for (field, ours) in changes {
        let theirs = live.fields.get(&field);
        if theirs == Some(&ours) {
            continue;
        }
        let moved_since_base = theirs != base.get(&field);
        if moved_since_base || protected.is_protected(&live.record_type, &field) {
            plan.contested.push(field);
        } else {
            plan.changes.insert(field, ours);
        }
    }
    plan
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Idle,
    ConflictPresented(ConflictView),
    Reloaded,
    ForcedOverwrite,
    Merged,
}

/// Tracks one caller's path through a conflict.
#[derive(Debug)]
pub struct ConflictSession {
    state: SessionState,
    descriptor: Option<ConflictDescriptor>,
}

impl Default for ConflictSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ConflictSession {
    pub fn new() -> Self {
        Self { state: SessionState::Idle, descriptor: None }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn present(&mut self, descriptor: ConflictDescriptor) -> ConflictView {
        let view = descriptor.view();
        self.state = SessionState::ConflictPresented(view.clone());
        self.descriptor = Some(descriptor);
        view
    }

    /// Apply `decision` to the presented conflict.
    ///
    /// A new conflict during an override re-presents it; the caller decides again.
    pub async fn resolve(
        &mut self,
        resolver: &ConflictResolver,
        actor_id: &str,
        decision: Decision,
    ) -> DataResult<Resolution> {
        let Some(descriptor) = self.descriptor.clone() else {
            return Err(DataError::validation("no conflict is presented"));
        };

        let resolution = resolver.resolve(actor_id, &descriptor, decision).await?;
        match &resolution {
            Resolution::Reloaded { .. } => self.settle(SessionState::Reloaded),
            Resolution::Overwritten { .. } => self.settle(SessionState::ForcedOverwrite),
            Resolution::Merged { .. } => self.settle(SessionState::Merged),
            Resolution::Conflict { conflict } => {
                self.present(conflict.clone());
            },
        }
        Ok(resolution)
    }

    /// Return to `Idle` after a resolution was shown.
    pub fn finish(&mut self) {
        self.state = SessionState::Idle;
        self.descriptor = None;
    }

    fn settle(&mut self, state: SessionState) {
        self.state = state;
        self.descriptor = None;
    }
}
