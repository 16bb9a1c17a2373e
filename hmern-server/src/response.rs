//! JSON envelopes returned by every route.
//!
//! Successful responses carry `success: true`; failures carry
//! `success: false`, a human-readable `message` and, where useful, a
//! machine-readable `error` kind.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use hmern_license::LicenseError;
use serde_json::json;

/// Failure envelope with the given status.
pub fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(json!({
            "success": false,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// HTTP form of a [`LicenseError`].
///
/// Rejections replay the license server's payload verbatim with 403;
/// configuration errors answer 500 and unreachable servers 503.
#[derive(Debug)]
pub struct LicenseErrorResponse(pub LicenseError);

impl From<LicenseError> for LicenseErrorResponse {
    fn from(err: LicenseError) -> Self {
        Self(err)
    }
}

impl IntoResponse for LicenseErrorResponse {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        match self.0 {
            LicenseError::Rejected(payload) => (status, Json(payload)).into_response(),
            err => (
                status,
                Json(json!({
                    "success": false,
                    "message": err.to_string(),
                    "error": err.kind(),
                })),
            )
                .into_response(),
        }
    }
}
