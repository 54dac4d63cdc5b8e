use axum::extract::State;
use axum::response::Json;

use steadfast_types::{HealthMode, TransportError};

use super::health::{get_health_mode, manual_health_check};
use crate::test_helpers::test_app_state;

#[tokio::test]
async fn test_health_mode_starts_primary() {
    let app = test_app_state();
    let Json(snapshot) = get_health_mode(State(app.state)).await;
    assert_eq!(snapshot.mode, HealthMode::PrimaryActive);
    assert!(snapshot.last_checked_at.is_none());
    assert!(!snapshot.checking);
}

#[tokio::test]
async fn test_manual_health_check_reports_and_flips() {
    let app = test_app_state();
    app.primary.fail_with(TransportError::Timeout { duration_ms: 5000 });

    let Json(response) = manual_health_check(State(app.state.clone())).await;
    assert!(!response.healthy);
    assert_eq!(response.snapshot.mode, HealthMode::FallbackActive);
    assert!(response.snapshot.last_checked_at.is_some());

    app.primary.heal();
    let Json(response) = manual_health_check(State(app.state)).await;
    assert!(response.healthy);
    assert_eq!(response.snapshot.mode, HealthMode::PrimaryActive);
}
