//! License validation for hMERN plugins.
//!
//! This crate handles:
//! - Calling the remote license server (`POST /api/license/validate`)
//! - Caching the last verdict for a bounded duration
//! - Falling back to the last valid verdict when the server is unreachable
//!
//! # Design Principles
//!
//! - **Injectable state**: the cache and clock are passed in, never global
//! - **Availability over freshness**: a known-good license survives outages
//! - **No hidden retries**: one bounded call per request; the next request retries
//!
//! The HTTP-facing gate lives in `hmern-server`; this crate only decides.

mod cache;
mod client;
mod config;
mod error;
#[cfg(feature = "test-util")]
mod testing;
mod validator;

pub use cache::{Clock, LicenseCache, LicenseCacheEntry, SystemClock};
pub use client::{HttpLicenseClient, LicenseClient, LicenseValidationRequest, ValidationResponse};
pub use config::{
    domain_from_url, LicenseConfig, DEFAULT_CACHE_DURATION, DEFAULT_REQUEST_TIMEOUT,
    DEFAULT_SERVER_URL,
};
pub use error::{LicenseError, LicenseResult, TransportError};
pub use validator::{CacheStatus, LicenseInfo, LicenseSource, LicenseValidator};

#[cfg(feature = "test-util")]
pub use testing::ManualClock;
