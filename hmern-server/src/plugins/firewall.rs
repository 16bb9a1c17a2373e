//! Firewall plugin: IP blocklist and per-IP rate limiting.
//!
//! [`firewall_guard`] wraps the whole application. The admin routes
//! (`/rules`, `/block`, `/block/{ip}`, `/stats`) sit behind the license gate.
//! All state is process memory.

use super::{Plugin, PluginManifest};
use crate::middleware::require_license;
use crate::response::error_response;
use axum::extract::{ConnectInfo, Path, Request, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::middleware::{from_fn_with_state, Next};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{delete, get, post};
use axum::Router;
use chrono::{DateTime, Utc};
use governor::clock::Clock;
use governor::middleware::NoOpMiddleware;
use governor::state::keyed::DashMapStateStore;
use governor::{Quota, RateLimiter};
use hmern_license::LicenseValidator;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Default mount point.
pub const DEFAULT_BASE_PATH: &str = "/api/plugins/firewall";

/// Idle rate-limit state is dropped every this many checks.
const PRUNE_INTERVAL: u64 = 1024;

const NAME: &str = "firewall";

/// Firewall settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirewallConfig {
    /// Whether the guard and admin routes are active.
    pub enabled: bool,
    /// Requests allowed per client per window. Zero disables rate limiting.
    pub rate_limit: u32,
    /// Length of a rate-limit window.
    pub window: Duration,
    /// IPs blocked from startup.
    pub blocked_ips: Vec<IpAddr>,
    /// Take the client IP from `X-Forwarded-For` instead of the socket.
    pub trust_proxy: bool,
}

impl Default for FirewallConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rate_limit: 100,
            window: Duration::from_secs(60),
            blocked_ips: Vec::new(),
            trust_proxy: false,
        }
    }
}

/// What to do with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirewallDecision {
    /// Let it through.
    Allow,
    /// The client IP is on the blocklist.
    Blocked,
    /// The client exceeded its window; retry after the given delay.
    RateLimited {
        /// Time until the window resets.
        retry_after: Duration,
    },
}

/// A blocklist entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockedIp {
    /// The blocked address.
    pub ip: IpAddr,
    /// Why it was blocked.
    pub reason: String,
    /// When it was blocked.
    pub blocked_at: DateTime<Utc>,
}

/// Counters since startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FirewallStats {
    /// Requests let through.
    pub allowed: u64,
    /// Requests refused by the blocklist.
    pub blocked: u64,
    /// Requests refused by rate limiting.
    pub rate_limited: u64,
    /// Clients with rate-limit state.
    pub tracked_clients: usize,
    /// Size of the blocklist.
    pub blocked_ips: usize,
}

/// Governor clock on tokio time, so paused-time tests drive the limiter.
#[derive(Debug, Clone, Copy, Default)]
struct TokioClock;

impl Clock for TokioClock {
    type Instant = std::time::Instant;

    fn now(&self) -> Self::Instant {
        tokio::time::Instant::now().into_std()
    }
}

type IpRateLimiter =
    RateLimiter<IpAddr, DashMapStateStore<IpAddr>, TokioClock, NoOpMiddleware<std::time::Instant>>;

/// `limit` requests per `window` as a burst, refilled one every `window / limit`.
fn quota(config: &FirewallConfig) -> Option<Quota> {
    let burst = NonZeroU32::new(config.rate_limit)?;
    Quota::with_period(config.window / config.rate_limit).map(|q| q.allow_burst(burst))
}

/// In-memory firewall state.
pub struct Firewall {
    config: FirewallConfig,
    blocklist: RwLock<HashMap<IpAddr, BlockedIp>>,
    limiter: Option<IpRateLimiter>,
    checks: AtomicU64,
    allowed: AtomicU64,
    blocked: AtomicU64,
    rate_limited: AtomicU64,
}

impl Firewall {
    /// Creates a firewall seeded with the configured blocklist.
    pub fn new(config: FirewallConfig) -> Self {
        let now = Utc::now();
        let blocklist = config
            .blocked_ips
            .iter()
            .map(|&ip| {
                let entry = BlockedIp {
                    ip,
                    reason: "configured".to_string(),
                    blocked_at: now,
                };
                (ip, entry)
            })
            .collect();

        let limiter = quota(&config).map(|q| RateLimiter::dashmap_with_clock(q, TokioClock));

        Self {
            config,
            blocklist: RwLock::new(blocklist),
            limiter,
            checks: AtomicU64::new(0),
            allowed: AtomicU64::new(0),
            blocked: AtomicU64::new(0),
            rate_limited: AtomicU64::new(0),
        }
    }

    /// The settings this firewall was built with.
    #[must_use]
    pub fn config(&self) -> &FirewallConfig {
        &self.config
    }

    /// Decides on one request from `ip` and counts it.
    pub async fn check(&self, ip: IpAddr) -> FirewallDecision {
        if self.blocklist.read().await.contains_key(&ip) {
            self.blocked.fetch_add(1, Ordering::Relaxed);
            return FirewallDecision::Blocked;
        }

        if let Some(limiter) = &self.limiter {
            if self.checks.fetch_add(1, Ordering::Relaxed) % PRUNE_INTERVAL == PRUNE_INTERVAL - 1 {
                limiter.retain_recent();
                limiter.shrink_to_fit();
            }

            if let Err(not_until) = limiter.check_key(&ip) {
                self.rate_limited.fetch_add(1, Ordering::Relaxed);
                let retry_after = not_until.wait_time_from(limiter.clock().now());
                return FirewallDecision::RateLimited { retry_after };
            }
        }

        self.allowed.fetch_add(1, Ordering::Relaxed);
        FirewallDecision::Allow
    }

    /// Adds `ip` to the blocklist. Returns false if it was already there.
    pub async fn block(&self, ip: IpAddr, reason: impl Into<String>) -> bool {
        let mut blocklist = self.blocklist.write().await;
        if blocklist.contains_key(&ip) {
            return false;
        }
        let entry = BlockedIp {
            ip,
            reason: reason.into(),
            blocked_at: Utc::now(),
        };
        info!(ip = %ip, reason = %entry.reason, "IP blocked");
        blocklist.insert(ip, entry);
        true
    }

    /// Removes `ip` from the blocklist. Returns false if it was not there.
    pub async fn unblock(&self, ip: IpAddr) -> bool {
        let removed = self.blocklist.write().await.remove(&ip).is_some();
        if removed {
            info!(ip = %ip, "IP unblocked");
        }
        removed
    }

    /// Current blocklist, ordered by address.
    pub async fn blocked_ips(&self) -> Vec<BlockedIp> {
        let mut entries: Vec<_> = self.blocklist.read().await.values().cloned().collect();
        entries.sort_by_key(|e| e.ip);
        entries
    }

    /// Snapshot of the counters.
    pub async fn stats(&self) -> FirewallStats {
        FirewallStats {
            allowed: self.allowed.load(Ordering::Relaxed),
            blocked: self.blocked.load(Ordering::Relaxed),
            rate_limited: self.rate_limited.load(Ordering::Relaxed),
            tracked_clients: self.limiter.as_ref().map_or(0, |l| l.len()),
            blocked_ips: self.blocklist.read().await.len(),
        }
    }
}

impl std::fmt::Debug for Firewall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Firewall")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Client address: first `X-Forwarded-For` hop when trusted, else the peer.
pub fn client_ip(request: &Request, trust_proxy: bool) -> Option<IpAddr> {
    if trust_proxy {
        let forwarded = request
            .headers()
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|v| v.trim().parse().ok());
        if forwarded.is_some() {
            return forwarded;
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
}

/// Middleware applying the blocklist and rate limit to every request.
///
/// Requests without an identifiable client address pass.
pub async fn firewall_guard(
    State(firewall): State<Arc<Firewall>>,
    request: Request,
    next: Next,
) -> Response {
    let Some(ip) = client_ip(&request, firewall.config.trust_proxy) else {
        debug!("No client address, skipping firewall");
        return next.run(request).await;
    };

    match firewall.check(ip).await {
        FirewallDecision::Allow => next.run(request).await,
        FirewallDecision::Blocked => {
            warn!(ip = %ip, path = %request.uri().path(), "Blocked IP refused");
            error_response(StatusCode::FORBIDDEN, "Access denied")
        }
        FirewallDecision::RateLimited { retry_after } => {
            // Round up so clients never retry early.
            let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
            let secs = secs.max(1);
            warn!(ip = %ip, retry_after_secs = secs, "Rate limit exceeded");
            let mut response = (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({
                    "success": false,
                    "message": "Too many requests",
                    "retryAfter": secs,
                })),
            )
                .into_response();
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
            response
        }
    }
}

/// Admin routes for the firewall, gated by the license.
#[derive(Debug, Clone)]
pub struct FirewallPlugin {
    firewall: Arc<Firewall>,
    validator: Arc<LicenseValidator>,
    base_path: String,
}

impl FirewallPlugin {
    /// Creates the plugin, mounted at `base_path`.
    pub fn new(
        firewall: Arc<Firewall>,
        validator: Arc<LicenseValidator>,
        base_path: impl Into<String>,
    ) -> Self {
        Self {
            firewall,
            validator,
            base_path: base_path.into(),
        }
    }
}

impl Plugin for FirewallPlugin {
    fn manifest(&self) -> PluginManifest {
        PluginManifest {
            name: NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            description: "IP blocking and rate limiting".to_string(),
            base_path: self.base_path.clone(),
            requires_license: true,
        }
    }

    fn is_enabled(&self) -> bool {
        self.firewall.config.enabled
    }

    fn router(&self) -> Router {
        Router::new()
            .route("/rules", get(rules_handler))
            .route("/block", post(block_handler))
            .route("/block/{ip}", delete(unblock_handler))
            .route("/stats", get(stats_handler))
            .route_layer(from_fn_with_state(Arc::clone(&self.validator), require_license))
            .with_state(Arc::clone(&self.firewall))
    }
}

#[derive(Debug, Deserialize)]
struct BlockRequest {
    ip: String,
    #[serde(default)]
    reason: Option<String>,
}

async fn rules_handler(State(firewall): State<Arc<Firewall>>) -> Json<serde_json::Value> {
    let config = firewall.config();
    Json(json!({
        "success": true,
        "rateLimit": {
            "limit": config.rate_limit,
            "windowSeconds": config.window.as_secs(),
        },
        "trustProxy": config.trust_proxy,
        "blocked": firewall.blocked_ips().await,
    }))
}

async fn block_handler(
    State(firewall): State<Arc<Firewall>>,
    Json(body): Json<BlockRequest>,
) -> Response {
    let Ok(ip) = body.ip.trim().parse::<IpAddr>() else {
        return error_response(StatusCode::BAD_REQUEST, "Invalid IP address");
    };
    let reason = body
        .reason
        .filter(|r| !r.trim().is_empty())
        .unwrap_or_else(|| "manual".to_string());

    let created = firewall.block(ip, reason).await;
    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    (
        status,
        Json(json!({
            "success": true,
            "created": created,
            "ip": ip,
        })),
    )
        .into_response()
}

async fn unblock_handler(
    State(firewall): State<Arc<Firewall>>,
    Path(ip): Path<String>,
) -> Response {
    let Ok(ip) = ip.parse::<IpAddr>() else {
        return error_response(StatusCode::BAD_REQUEST, "Invalid IP address");
    };
    if firewall.unblock(ip).await {
        Json(json!({ "success": true, "ip": ip })).into_response()
    } else {
        error_response(StatusCode::NOT_FOUND, "IP is not blocked")
    }
}

async fn stats_handler(State(firewall): State<Arc<Firewall>>) -> Json<serde_json::Value> {
    Json(json!({
        "success": true,
        "stats": firewall.stats().await,
    }))
}
