//! The license gate as axum middleware.

use crate::response::LicenseErrorResponse;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use hmern_license::LicenseValidator;
use std::sync::Arc;

/// Lets the request through only while the license is valid.
///
/// On success the [`hmern_license::LicenseInfo`] is inserted into the
/// request extensions, so handlers can take `Extension<LicenseInfo>`.
/// Mount with `axum::middleware::from_fn_with_state(validator, require_license)`.
pub async fn require_license(
    State(validator): State<Arc<LicenseValidator>>,
    mut request: Request,
    next: Next,
) -> Response {
    match validator.validate().await {
        Ok(info) => {
            request.extensions_mut().insert(info);
            next.run(request).await
        }
        Err(err) => LicenseErrorResponse(err).into_response(),
    }
}
