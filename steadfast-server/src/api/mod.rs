//! API Routes
//!
//! REST endpoints for the data-access contract, mounted under `/api`.

mod conflicts;
mod error;
mod health;
mod records;

#[cfg(test)]
mod health_tests;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};

pub use error::ApiError;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        // Health
        .route("/health-mode", get(health::get_health_mode))
        .route("/health-check", post(health::manual_health_check))
        // Records
        .route("/records/:record_type", post(records::create_record))
        .route("/records/:record_type/query", post(records::query_records))
        .route(
            "/records/:record_type/:record_id",
            get(records::get_record).put(records::update_record),
        )
        // Conflicts and audit
        .route("/conflicts/resolve", post(conflicts::resolve_conflict))
        .route("/audit/:record_type/:record_id", get(conflicts::get_audit_trail))
        // Prometheus metrics
        .route("/metrics", get(health::get_metrics))
        // API fallback: return 404 for unknown API endpoints
        .fallback(api_not_found)
}

async fn api_not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(serde_json::json!({"error": "Not found"})))
}
