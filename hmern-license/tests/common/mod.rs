//! Shared test helpers for license tests.

#![allow(dead_code)]

use chrono::{TimeZone, Utc};
use hmern_license::{
    HttpLicenseClient, LicenseCache, LicenseConfig, LicenseValidator, ManualClock,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TEST_KEY: &str = "HMERN-TEST-0001";
pub const TEST_DOMAIN: &str = "app.example.com";
pub const VALIDATE_PATH: &str = "/api/license/validate";

/// A fixed starting instant so ages are deterministic.
pub fn test_clock() -> ManualClock {
    ManualClock::new(Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap())
}

/// Fully configured license pointing at `server`.
pub fn test_config(server: &MockServer) -> LicenseConfig {
    LicenseConfig {
        server_url: server.uri(),
        license_key: Some(TEST_KEY.to_string()),
        domain: Some(TEST_DOMAIN.to_string()),
        request_timeout: Duration::from_millis(300),
        ..Default::default()
    }
}

/// Builds a validator over the HTTP client with a manual clock.
pub fn validator_with(config: LicenseConfig, clock: &ManualClock) -> LicenseValidator {
    let client = HttpLicenseClient::new(&config).unwrap();
    LicenseValidator::new(
        config,
        LicenseCache::new(),
        Arc::new(client),
        Arc::new(clock.clone()),
    )
}

/// Mounts a 200 response with a valid "pro" license, expected `times` times.
pub async fn mount_valid(server: &MockServer, times: u64) {
    Mock::given(method("POST"))
        .and(path(VALIDATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "message": "License is valid",
            "data": { "plan": "pro", "seats": 5 }
        })))
        .expect(times)
        .mount(server)
        .await;
}

/// Mounts a 200 response rejecting the license, expected `times` times.
pub async fn mount_rejected(server: &MockServer, times: u64) {
    Mock::given(method("POST"))
        .and(path(VALIDATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "message": "License expired"
        })))
        .expect(times)
        .mount(server)
        .await;
}

/// Mounts a response slower than the test timeout, expected `times` times.
pub async fn mount_slow(server: &MockServer, times: u64) {
    Mock::given(method("POST"))
        .and(path(VALIDATE_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "success": true }))
                .set_delay(Duration::from_secs(2)),
        )
        .expect(times)
        .mount(server)
        .await;
}

/// Mounts an HTTP error status, expected `times` times.
pub async fn mount_status(server: &MockServer, status: u16, times: u64) {
    Mock::given(method("POST"))
        .and(path(VALIDATE_PATH))
        .respond_with(ResponseTemplate::new(status).set_body_string("upstream failure"))
        .expect(times)
        .mount(server)
        .await;
}
