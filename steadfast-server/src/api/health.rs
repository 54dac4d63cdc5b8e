use axum::{extract::State, response::Json};
use serde::Serialize;

use steadfast_types::HealthSnapshot;

use crate::state::AppState;

pub async fn get_health_mode(State(state): State<AppState>) -> Json<HealthSnapshot> {
    Json(state.access().current_health_mode())
}

#[derive(Serialize)]
pub struct HealthCheckResponse {
    pub healthy: bool,
    #[serde(flatten)]
    pub snapshot: HealthSnapshot,
}

pub async fn manual_health_check(State(state): State<AppState>) -> Json<HealthCheckResponse> {
    let healthy = state.access().manual_health_check().await;
    Json(HealthCheckResponse { healthy, snapshot: state.access().current_health_mode() })
}

pub async fn get_metrics() -> axum::response::Response<axum::body::Body> {
    use axum::http::header;
    use axum::response::IntoResponse;

    let metrics = steadfast_core::metrics::render_metrics();

    ([(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")], metrics).into_response()
}
