//! The license cache and its clock.
//!
//! A [`LicenseCache`] holds at most one [`LicenseCacheEntry`]: the last
//! verdict the license server gave. Storing a new verdict replaces the
//! old one wholesale. Clones share the same slot.

use crate::client::ValidationResponse;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// The last verdict received from the license server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseCacheEntry {
    /// Whether the license was valid.
    pub success: bool,
    /// Message from the server, replayed for cached failures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Opaque license payload.
    #[serde(default)]
    pub data: Value,
    /// When the verdict was received.
    pub fetched_at: DateTime<Utc>,
}

impl LicenseCacheEntry {
    /// Captures a server verdict at `fetched_at`.
    #[must_use]
    pub fn from_response(response: ValidationResponse, fetched_at: DateTime<Utc>) -> Self {
        Self {
            success: response.success,
            message: response.message,
            data: response.data,
            fetched_at,
        }
    }

    /// Rebuilds the verdict exactly as the server sent it.
    #[must_use]
    pub fn to_response(&self) -> ValidationResponse {
        ValidationResponse {
            success: self.success,
            message: self.message.clone(),
            data: self.data.clone(),
        }
    }

    /// Time elapsed since the verdict was received. Zero if `now` is earlier.
    #[must_use]
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.fetched_at).to_std().unwrap_or(Duration::ZERO)
    }

    /// Returns true while the entry is younger than `max_age`.
    #[must_use]
    pub fn is_fresh(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        self.age(now) < max_age
    }
}

/// Shared single-slot cache for the license verdict.
#[derive(Debug, Clone, Default)]
pub struct LicenseCache {
    slot: Arc<RwLock<Option<LicenseCacheEntry>>>,
}

impl LicenseCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the current entry.
    pub async fn get(&self) -> Option<LicenseCacheEntry> {
        self.slot.read().await.clone()
    }

    /// Replaces the current entry.
    pub async fn store(&self, entry: LicenseCacheEntry) {
        *self.slot.write().await = Some(entry);
    }

    /// Drops the current entry.
    pub async fn clear(&self) {
        *self.slot.write().await = None;
    }
}
