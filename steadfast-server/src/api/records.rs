//! Record handlers: query, fetch, create, version-guarded update

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;

use steadfast_core::CommittedWrite;
use steadfast_types::{Fields, Query, VersionedRecord};

use super::ApiError;
use crate::state::AppState;

pub async fn query_records(
    State(state): State<AppState>,
    Path(record_type): Path<String>,
    Json(query): Json<Query>,
) -> Result<Json<Vec<VersionedRecord>>, ApiError> {
    let records = state.access().read(&record_type, query).await?;
    Ok(Json(records))
}

pub async fn get_record(
    State(state): State<AppState>,
    Path((record_type, record_id)): Path<(String, String)>,
) -> Result<Json<VersionedRecord>, ApiError> {
    let record = state.access().fetch(&record_type, &record_id).await?;
    Ok(Json(record))
}

#[derive(Deserialize)]
pub struct CreateRecordRequest {
    pub id: String,
    #[serde(default)]
    pub fields: Fields,
}

pub async fn create_record(
    State(state): State<AppState>,
    Path(record_type): Path<String>,
    Json(request): Json<CreateRecordRequest>,
) -> Result<(StatusCode, Json<VersionedRecord>), ApiError> {
    let record = state.access().create(&record_type, &request.id, request.fields).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

#[derive(Deserialize)]
pub struct UpdateRecordRequest {
    pub expected_version: u64,
    pub changes: Fields,
    #[serde(default)]
    pub actor: Option<String>,
    /// Required when `changes` names a protected field
    #[serde(default)]
    pub justification: Option<String>,
}

/// A stale `expected_version` answers 409 with the conflict view.
pub async fn update_record(
    State(state): State<AppState>,
    Path((record_type, record_id)): Path<(String, String)>,
    Json(request): Json<UpdateRecordRequest>,
) -> Result<Json<CommittedWrite>, ApiError> {
    let access = state.access();
    let outcome = match request.justification {
        Some(justification) => {
            let actor = request.actor.unwrap_or_default();
            access
                .write_justified(
                    &actor,
                    &record_type,
                    &record_id,
                    request.expected_version,
                    request.changes,
                    &justification,
                )
                .await?
        },
        None => {
            access.write(&record_type, &record_id, request.expected_version, request.changes).await?
        },
    };
    Ok(Json(outcome.into_result()?))
}
