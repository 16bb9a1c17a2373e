//! The license gate.
//!
//! [`LicenseValidator::validate`] decides, per request, between a cache
//! hit, a configuration error, a fresh call to the license server and a
//! stale fallback:
//!
//! ```text
//! fresh entry?  ── success ──> Ok(Cached)
//!      │         └ failure ──> Err(Rejected)   (replayed verbatim)
//!      no
//! key + domain? ── no ───────> Err(Configuration)
//!      yes
//! server call  ── verdict ───> store, Ok(Fresh) | Err(Rejected)
//!      │
//!   transport error ── cached success (any age) ──> Ok(Stale)
//!                   └─ otherwise ───────────────> Err(Unavailable)
//! ```
//!
//! The cache lock is never held across the server call, so concurrent
//! requests that all see an expired entry may each call the server.

use crate::cache::{Clock, LicenseCache, LicenseCacheEntry, SystemClock};
use crate::client::{HttpLicenseClient, LicenseClient};
use crate::config::LicenseConfig;
use crate::error::{LicenseError, LicenseResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Where a passing verdict came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LicenseSource {
    /// Just fetched from the license server.
    Fresh,
    /// Served from a cache entry within its freshness window.
    Cached,
    /// Served from an expired cache entry because the server was unreachable.
    Stale,
}

/// License data attached to a request that passed the gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseInfo {
    /// Opaque license payload from the server.
    pub data: Value,
    /// Where the verdict came from.
    pub source: LicenseSource,
    /// When the verdict was received from the server.
    pub fetched_at: DateTime<Utc>,
}

impl LicenseInfo {
    fn from_entry(entry: LicenseCacheEntry, source: LicenseSource) -> Self {
        Self {
            data: entry.data,
            source,
            fetched_at: entry.fetched_at,
        }
    }

    /// Looks up a top-level field of the license payload.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.data.get(field)
    }

    /// The license plan, if the payload has one.
    #[must_use]
    pub fn plan(&self) -> Option<&str> {
        self.get("plan").and_then(Value::as_str)
    }
}

/// Read-only view of the cache for status reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatus {
    /// Whether any verdict is cached.
    pub cached: bool,
    /// Cached verdict, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    /// Cached message, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// When the verdict was received.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetched_at: Option<DateTime<Utc>>,
    /// Age of the verdict in whole seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age_seconds: Option<u64>,
    /// Whether the verdict is still within the cache duration.
    pub fresh: bool,
}

/// Validates the configured license against the license server, with caching.
pub struct LicenseValidator {
    config: LicenseConfig,
    cache: LicenseCache,
    client: Arc<dyn LicenseClient>,
    clock: Arc<dyn Clock>,
}

impl LicenseValidator {
    /// Creates a validator from explicit parts.
    pub fn new(
        config: LicenseConfig,
        cache: LicenseCache,
        client: Arc<dyn LicenseClient>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            cache,
            client,
            clock,
        }
    }

    /// Creates a validator using the HTTP client, a fresh cache and the wall clock.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::Configuration`] if the HTTP client cannot be built.
    pub fn from_config(config: LicenseConfig) -> LicenseResult<Self> {
        let client = HttpLicenseClient::new(&config)?;
        Ok(Self::new(
            config,
            LicenseCache::new(),
            Arc::new(client),
            Arc::new(SystemClock),
        ))
    }

    /// The configuration this validator was built with.
    #[must_use]
    pub fn config(&self) -> &LicenseConfig {
        &self.config
    }

    /// The shared cache.
    #[must_use]
    pub fn cache(&self) -> &LicenseCache {
        &self.cache
    }

    fn cache_duration(&self) -> Duration {
        self.config.cache_duration
    }

    /// Decides whether the configured license is currently valid.
    ///
    /// # Errors
    ///
    /// - [`LicenseError::Rejected`] when the server (now or within the cache
    ///   duration) said the license is invalid.
    /// - [`LicenseError::Configuration`] when the key or domain is missing.
    /// - [`LicenseError::Unavailable`] when the server could not be reached
    ///   and there is no cached success to fall back on.
    pub async fn validate(&self) -> LicenseResult<LicenseInfo> {
        let cached = self.cache.get().await;

        if let Some(entry) = &cached {
            if entry.is_fresh(self.clock.now(), self.cache_duration()) {
                debug!(success = entry.success, "License cache hit");
                return verdict(entry.clone(), LicenseSource::Cached);
            }
        }

        let request = self.config.validation_request().inspect_err(|e| {
            error!(error = %e, "License validation is not configured");
        })?;

        match self.client.validate(&request).await {
            Ok(response) => {
                let entry = LicenseCacheEntry::from_response(response, self.clock.now());
                if entry.success {
                    info!(domain = %request.domain, "License validated");
                } else {
                    warn!(
                        domain = %request.domain,
                        message = entry.message.as_deref().unwrap_or_default(),
                        "License rejected by server"
                    );
                }
                self.cache.store(entry.clone()).await;
                verdict(entry, LicenseSource::Fresh)
            }
            Err(err) => match cached {
                Some(entry) if entry.success => {
                    warn!(
                        error = %err,
                        age_secs = entry.age(self.clock.now()).as_secs(),
                        "License server unreachable, using stale cached license"
                    );
                    Ok(LicenseInfo::from_entry(entry, LicenseSource::Stale))
                }
                _ => {
                    warn!(error = %err, "License server unreachable and no valid cached license");
                    Err(LicenseError::Unavailable(err))
                }
            },
        }
    }

    /// Reports the cached verdict without contacting the server.
    pub async fn cache_status(&self) -> CacheStatus {
        match self.cache.get().await {
            Some(entry) => {
                let now = self.clock.now();
                CacheStatus {
                    cached: true,
                    success: Some(entry.success),
                    fresh: entry.is_fresh(now, self.cache_duration()),
                    age_seconds: Some(entry.age(now).as_secs()),
                    fetched_at: Some(entry.fetched_at),
                    message: entry.message,
                }
            }
            None => CacheStatus {
                cached: false,
                success: None,
                message: None,
                fetched_at: None,
                age_seconds: None,
                fresh: false,
            },
        }
    }
}

impl std::fmt::Debug for LicenseValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LicenseValidator")
            .field("server_url", &self.config.server_url)
            .field("domain", &self.config.domain)
            .field("cache_duration", &self.config.cache_duration)
            .finish_non_exhaustive()
    }
}

fn verdict(entry: LicenseCacheEntry, source: LicenseSource) -> LicenseResult<LicenseInfo> {
    if entry.success {
        Ok(LicenseInfo::from_entry(entry, source))
    } else {
        Err(LicenseError::Rejected(entry.to_response()))
    }
}
