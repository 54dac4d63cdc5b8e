//! Conflict resolution and audit trail handlers

use axum::{
    extract::{Path, State},
    response::Json,
};
use serde::Deserialize;

use steadfast_core::{Decision, Resolution};
use steadfast_types::{AuditEntry, ConflictDescriptor, DataError};

use super::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ResolveConflictRequest {
    pub actor: String,
    pub conflict: ConflictDescriptor,
    #[serde(flatten)]
    pub decision: Decision,
}

/// A resolution that meets a newer conflict answers 409 with that conflict.
pub async fn resolve_conflict(
    State(state): State<AppState>,
    Json(request): Json<ResolveConflictRequest>,
) -> Result<Json<Resolution>, ApiError> {
    let resolution =
        state.access().resolve_conflict(&request.actor, &request.conflict, request.decision).await?;

    match resolution {
        Resolution::Conflict { conflict } => Err(ApiError(DataError::VersionConflict(conflict))),
        other => Ok(Json(other)),
    }
}

pub async fn get_audit_trail(
    State(state): State<AppState>,
    Path((record_type, record_id)): Path<(String, String)>,
) -> Result<Json<Vec<AuditEntry>>, ApiError> {
    let entries = state.access().audit_trail(&record_type, &record_id).await?;
    Ok(Json(entries))
}
