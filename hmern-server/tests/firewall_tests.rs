mod common;

use common::*;
use hmern_license::LicenseConfig;
use hmern_server::{FirewallConfig, RouterOptions};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::time::Duration;
use wiremock::MockServer;

fn proxied(rate_limit: u32, blocked: &[&str]) -> RouterOptions {
    RouterOptions {
        firewall: FirewallConfig {
            rate_limit,
            window: Duration::from_secs(60),
            blocked_ips: blocked.iter().map(|ip| ip.parse().unwrap()).collect(),
            trust_proxy: true,
            ..Default::default()
        },
        ..Default::default()
    }
}

async fn get_from(url: &str, ip: &str) -> reqwest::Response {
    reqwest::Client::new()
        .get(url)
        .header("x-forwarded-for", ip)
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn configured_ip_is_blocked_everywhere() {
    let license_server = MockServer::start().await;
    let base = spawn_app(
        validator(license_config(&license_server), &test_clock()),
        proxied(0, &["203.0.113.9"]),
    )
    .await;

    let resp = get_from(&format!("{base}{LICENSING}/health"), "203.0.113.9").await;
    assert_eq!(resp.status(), 403);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({ "success": false, "message": "Access denied" }));

    let resp = get_from(&format!("{base}{LICENSING}/health"), "203.0.113.10").await;
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn rate_limit_returns_429_with_retry_after() {
    let license_server = MockServer::start().await;
    let base = spawn_app(
        validator(license_config(&license_server), &test_clock()),
        proxied(3, &[]),
    )
    .await;
    let url = format!("{base}{LICENSING}/test");

    for _ in 0..3 {
        assert_eq!(get_from(&url, "198.51.100.1").await.status(), 200);
    }
    let resp = get_from(&url, "198.51.100.1").await;
    assert_eq!(resp.status(), 429);
    let retry_after: u64 = resp.headers()["retry-after"].to_str().unwrap().parse().unwrap();
    assert!((1..=60).contains(&retry_after));

    // Other clients are unaffected.
    assert_eq!(get_from(&url, "198.51.100.2").await.status(), 200);
}

#[tokio::test]
async fn socket_address_is_used_without_proxy_trust() {
    let license_server = MockServer::start().await;
    let options = RouterOptions {
        firewall: FirewallConfig {
            blocked_ips: vec!["127.0.0.1".parse().unwrap()],
            trust_proxy: false,
            ..Default::default()
        },
        ..Default::default()
    };
    let base = spawn_app(validator(license_config(&license_server), &test_clock()), options).await;

    // The spoofed header is ignored; the socket peer is 127.0.0.1.
    let resp = get_from(&format!("{base}{LICENSING}/health"), "203.0.113.50").await;
    assert_eq!(resp.status(), 403);
}

#[tokio::test]
async fn admin_routes_require_license() {
    let license_server = MockServer::start().await;
    mount_valid(&license_server, 0).await;
    let config = LicenseConfig {
        license_key: None,
        ..license_config(&license_server)
    };
    let base = spawn_app(validator(config, &test_clock()), proxied(0, &[])).await;

    let resp = get_from(&format!("{base}{FIREWALL}/rules"), "192.0.2.1").await;
    assert_eq!(resp.status(), 500);
}

#[tokio::test]
async fn admin_routes_refuse_rejected_license() {
    let license_server = MockServer::start().await;
    mount_rejected(&license_server, 1).await;
    let base = spawn_app(
        validator(license_config(&license_server), &test_clock()),
        proxied(0, &[]),
    )
    .await;

    let resp = get_from(&format!("{base}{FIREWALL}/stats"), "192.0.2.1").await;
    assert_eq!(resp.status(), 403);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "License key not found");
}

#[tokio::test]
async fn block_list_and_unblock_through_admin_routes() {
    let license_server = MockServer::start().await;
    mount_valid(&license_server, 1).await;
    let base = spawn_app(
        validator(license_config(&license_server), &test_clock()),
        proxied(0, &[]),
    )
    .await;
    let client = reqwest::Client::new();
    let admin = "192.0.2.1";

    let resp = client
        .post(format!("{base}{FIREWALL}/block"))
        .header("x-forwarded-for", admin)
        .json(&json!({ "ip": "203.0.113.77", "reason": "scraping" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);

    let resp = client
        .post(format!("{base}{FIREWALL}/block"))
        .header("x-forwarded-for", admin)
        .json(&json!({ "ip": "203.0.113.77" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["created"], false);

    let rules: Value = get_from(&format!("{base}{FIREWALL}/rules"), admin)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(rules["blocked"][0]["ip"], "203.0.113.77");
    assert_eq!(rules["blocked"][0]["reason"], "scraping");

    let resp = get_from(&format!("{base}{LICENSING}/health"), "203.0.113.77").await;
    assert_eq!(resp.status(), 403);

    let resp = client
        .delete(format!("{base}{FIREWALL}/block/203.0.113.77"))
        .header("x-forwarded-for", admin)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = client
        .delete(format!("{base}{FIREWALL}/block/203.0.113.77"))
        .header("x-forwarded-for", admin)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    let resp = get_from(&format!("{base}{LICENSING}/health"), "203.0.113.77").await;
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn invalid_ip_is_rejected() {
    let license_server = MockServer::start().await;
    mount_valid(&license_server, 1).await;
    let base = spawn_app(
        validator(license_config(&license_server), &test_clock()),
        proxied(0, &[]),
    )
    .await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}{FIREWALL}/block"))
        .header("x-forwarded-for", "192.0.2.1")
        .json(&json!({ "ip": "999.1.1.1" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let resp = client
        .delete(format!("{base}{FIREWALL}/block/not-an-ip"))
        .header("x-forwarded-for", "192.0.2.1")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn stats_count_traffic() {
    let license_server = MockServer::start().await;
    mount_valid(&license_server, 1).await;
    let base = spawn_app(
        validator(license_config(&license_server), &test_clock()),
        proxied(1, &["203.0.113.1"]),
    )
    .await;

    get_from(&format!("{base}{LICENSING}/test"), "203.0.113.1").await;
    get_from(&format!("{base}{LICENSING}/test"), "203.0.113.2").await;
    get_from(&format!("{base}{LICENSING}/test"), "203.0.113.2").await;

    let resp = get_from(&format!("{base}{FIREWALL}/stats"), "203.0.113.3").await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let stats = &body["stats"];
    assert_eq!(stats["blocked"], 1);
    assert_eq!(stats["rateLimited"], 1);
    // 203.0.113.2 once, plus the stats request itself.
    assert_eq!(stats["allowed"], 2);
    assert_eq!(stats["blockedIps"], 1);
}

#[tokio::test]
async fn disabled_firewall_mounts_nothing() {
    let license_server = MockServer::start().await;
    mount_valid(&license_server, 0).await;
    let options = RouterOptions {
        firewall: FirewallConfig {
            enabled: false,
            blocked_ips: vec!["127.0.0.1".parse().unwrap()],
            ..Default::default()
        },
        ..Default::default()
    };
    let base = spawn_app(validator(license_config(&license_server), &test_clock()), options).await;

    let resp = reqwest::get(format!("{base}{LICENSING}/health")).await.unwrap();
    assert_eq!(resp.status(), 200);
    let resp = reqwest::get(format!("{base}{FIREWALL}/rules")).await.unwrap();
    assert_eq!(resp.status(), 404);
}
