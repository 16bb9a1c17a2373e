//! Licensing plugin: health, smoke-test, info and status routes.
//!
//! None of these routes sit behind the license gate. `/info` only reads
//! the cache; `/status` runs the validator unless the dev bypass applies.

use super::{Plugin, PluginManifest};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use chrono::Utc;
use hmern_license::{LicenseError, LicenseValidator};
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

/// Default mount point.
pub const DEFAULT_BASE_PATH: &str = "/api/plugins/licensing";

const NAME: &str = "licensing";

/// Exposes the license state of this deployment.
#[derive(Debug, Clone)]
pub struct LicensingPlugin {
    validator: Arc<LicenseValidator>,
    base_path: String,
}

impl LicensingPlugin {
    /// Creates the plugin, mounted at `base_path`.
    pub fn new(validator: Arc<LicenseValidator>, base_path: impl Into<String>) -> Self {
        Self {
            validator,
            base_path: base_path.into(),
        }
    }
}

#[derive(Clone)]
struct LicensingState {
    validator: Arc<LicenseValidator>,
    manifest: Arc<PluginManifest>,
}

impl Plugin for LicensingPlugin {
    fn manifest(&self) -> PluginManifest {
        PluginManifest {
            name: NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            description: "License validation status for this deployment".to_string(),
            base_path: self.base_path.clone(),
            requires_license: false,
        }
    }

    fn router(&self) -> Router {
        let state = LicensingState {
            validator: Arc::clone(&self.validator),
            manifest: Arc::new(self.manifest()),
        };

        Router::new()
            .route("/health", get(health_handler))
            .route("/test", get(test_handler))
            .route("/info", get(info_handler))
            .route("/status", get(status_handler))
            .with_state(state)
    }
}

async fn health_handler(State(state): State<LicensingState>) -> Json<serde_json::Value> {
    Json(json!({
        "success": true,
        "plugin": state.manifest.name,
        "version": state.manifest.version,
        "status": "healthy",
        "timestamp": Utc::now(),
    }))
}

async fn test_handler() -> Json<serde_json::Value> {
    Json(json!({
        "success": true,
        "message": "Licensing plugin routes are working",
        "timestamp": Utc::now(),
    }))
}

async fn info_handler(State(state): State<LicensingState>) -> Json<serde_json::Value> {
    let config = state.validator.config();
    let cache = state.validator.cache_status().await;
    let environment = if config.production { "production" } else { "development" };

    Json(json!({
        "success": true,
        "plugin": *state.manifest,
        "license": {
            "serverUrl": config.server_url,
            "domain": config.domain,
            "keyConfigured": config.has_license_key(),
            "cacheDurationSeconds": config.cache_duration.as_secs(),
            "requestTimeoutSeconds": config.request_timeout.as_secs(),
            "environment": environment,
            "devBypass": config.dev_bypass(),
        },
        "cache": cache,
    }))
}

async fn status_handler(State(state): State<LicensingState>) -> Response {
    let config = state.validator.config();
    if config.dev_bypass() {
        debug!(domain = ?config.domain, "Development domain, skipping license validation");
        return Json(json!({
            "success": true,
            "isValid": true,
            "devMode": true,
            "message": "Development mode: license validation bypassed for localhost",
        }))
        .into_response();
    }

    match state.validator.validate().await {
        Ok(info) => Json(json!({
            "success": true,
            "isValid": true,
            "message": "License is valid",
            "data": info.data,
            "source": info.source,
            "fetchedAt": info.fetched_at,
        }))
        .into_response(),
        Err(LicenseError::Rejected(verdict)) => Json(json!({
            "success": true,
            "isValid": false,
            "message": verdict.message.as_deref().unwrap_or("License is invalid"),
            "data": verdict.data,
        }))
        .into_response(),
        Err(err) => {
            let status = StatusCode::from_u16(err.status_code())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (
                status,
                Json(json!({
                    "success": false,
                    "isValid": false,
                    "message": err.to_string(),
                    "error": err.kind(),
                })),
            )
                .into_response()
        }
    }
}
