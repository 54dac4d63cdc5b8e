//! Mapping of data-access errors onto HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;

use steadfast_types::DataError;

/// Handler error: a [`DataError`] rendered with its status code.
#[derive(Debug)]
pub struct ApiError(pub DataError);

impl From<DataError> for ApiError {
    fn from(err: DataError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let message = self.0.to_string();

        let body = match &self.0 {
            DataError::VersionConflict(descriptor) => json!({
                "error": self.0,
                "message": message,
                "conflict": descriptor.view(),
            }),
            _ => json!({ "error": self.0, "message": message }),
        };
        if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), "{}", message);
        }
        (status, Json(body)).into_response()
    }
}
