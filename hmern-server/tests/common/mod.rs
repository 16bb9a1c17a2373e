//! Shared helpers for server tests.

#![allow(dead_code)]

use axum::Router;
use chrono::{TimeZone, Utc};
use hmern_license::{
    HttpLicenseClient, LicenseCache, LicenseConfig, LicenseValidator, ManualClock,
};
use hmern_server::{build_router, FirewallConfig, RouterOptions};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const LICENSING: &str = "/api/plugins/licensing";
pub const FIREWALL: &str = "/api/plugins/firewall";
pub const VALIDATE_PATH: &str = "/api/license/validate";

pub fn test_clock() -> ManualClock {
    ManualClock::new(Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap())
}

/// License settings pointing at the mock license server.
pub fn license_config(server: &MockServer) -> LicenseConfig {
    LicenseConfig {
        server_url: server.uri(),
        license_key: Some("HMERN-TEST-0001".to_string()),
        domain: Some("app.example.com".to_string()),
        request_timeout: Duration::from_millis(300),
        production: true,
        ..Default::default()
    }
}

pub fn validator(config: LicenseConfig, clock: &ManualClock) -> Arc<LicenseValidator> {
    let client = HttpLicenseClient::new(&config).unwrap();
    Arc::new(LicenseValidator::new(
        config,
        LicenseCache::new(),
        Arc::new(client),
        Arc::new(clock.clone()),
    ))
}

/// Router options with rate limiting off, so tests only see what they set up.
pub fn quiet_options() -> RouterOptions {
    RouterOptions {
        firewall: FirewallConfig {
            rate_limit: 0,
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Spin up `app` on an OS-assigned port, returning the base URL.
pub async fn spawn(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });
    format!("http://127.0.0.1:{}", port)
}

/// Builds the full app around `validator` and serves it.
pub async fn spawn_app(validator: Arc<LicenseValidator>, options: RouterOptions) -> String {
    spawn(build_router(validator, options).unwrap()).await
}

pub async fn mount_valid(server: &MockServer, times: u64) {
    Mock::given(method("POST"))
        .and(path(VALIDATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "message": "License is valid",
            "data": { "plan": "pro" }
        })))
        .expect(times)
        .mount(server)
        .await;
}

pub async fn mount_rejected(server: &MockServer, times: u64) {
    Mock::given(method("POST"))
        .and(path(VALIDATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "message": "License key not found",
            "data": { "code": "LICENSE_NOT_FOUND" }
        })))
        .expect(times)
        .mount(server)
        .await;
}

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
