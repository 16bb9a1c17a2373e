//! License validation configuration.
//!
//! The domain sent to the license server is host[:port] only. It is
//! usually derived from the configured frontend URL with
//! [`domain_from_url`], but can be set directly.

use crate::client::LicenseValidationRequest;
use crate::error::{LicenseError, LicenseResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default freshness window for a cached verdict (1 hour).
pub const DEFAULT_CACHE_DURATION: Duration = Duration::from_secs(60 * 60);

/// Default timeout for the outbound validation call.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Default license server base URL.
pub const DEFAULT_SERVER_URL: &str = "http://localhost:4000";

/// Hosts for which the status endpoint bypasses validation outside production.
const LOCAL_HOSTS: [&str; 3] = ["localhost", "127.0.0.1", "::1"];

/// Inputs to license validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LicenseConfig {
    /// License server base URL (without the `/api/license/validate` path).
    pub server_url: String,
    /// License key issued to this deployment.
    pub license_key: Option<String>,
    /// Domain the license is bound to (host[:port]).
    pub domain: Option<String>,
    /// How long a verdict stays fresh.
    #[serde(with = "duration_secs")]
    pub cache_duration: Duration,
    /// Timeout for the outbound validation call.
    #[serde(with = "duration_secs")]
    pub request_timeout: Duration,
    /// Whether the process runs in production mode.
    pub production: bool,
}

impl Default for LicenseConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            license_key: None,
            domain: None,
            cache_duration: DEFAULT_CACHE_DURATION,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            production: false,
        }
    }
}

impl LicenseConfig {
    /// Sets the domain from a frontend URL such as `https://app.example.com/`.
    #[must_use]
    pub fn with_frontend_url(mut self, frontend_url: &str) -> Self {
        self.domain = domain_from_url(frontend_url);
        self
    }

    /// Full URL of the validation endpoint.
    #[must_use]
    pub fn validate_url(&self) -> String {
        format!("{}/api/license/validate", self.server_url.trim_end_matches('/'))
    }

    /// Returns true if a non-blank license key is configured.
    #[must_use]
    pub fn has_license_key(&self) -> bool {
        non_blank(self.license_key.as_deref()).is_some()
    }

    /// Returns true if the configured domain points at the local machine.
    #[must_use]
    pub fn is_localhost(&self) -> bool {
        non_blank(self.domain.as_deref())
            .map(|domain| LOCAL_HOSTS.contains(&host_of(domain)))
            .unwrap_or(false)
    }

    /// Returns true if `/status` should report a valid license without
    /// contacting the license server.
    #[must_use]
    pub fn dev_bypass(&self) -> bool {
        !self.production && self.is_localhost()
    }

    /// Builds the outbound request body.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::Configuration`] if the key or domain is missing.
    pub fn validation_request(&self) -> LicenseResult<LicenseValidationRequest> {
        let license_key = non_blank(self.license_key.as_deref())
            .ok_or_else(|| LicenseError::Configuration("license key is not configured".into()))?;
        let domain = non_blank(self.domain.as_deref())
            .ok_or_else(|| LicenseError::Configuration("license domain is not configured".into()))?;

        Ok(LicenseValidationRequest {
            license_key: license_key.to_string(),
            domain: domain.to_string(),
        })
    }
}

/// Extracts `host[:port]` from a URL-ish string.
///
/// Strips the scheme, any `user:password@` prefix, anything after the
/// first `/`, `?` or `#`, and surrounding whitespace. Returns `None` when
/// nothing is left.
#[must_use]
pub fn domain_from_url(url: &str) -> Option<String> {
    let url = url.trim();
    let without_scheme = match url.find("://") {
        Some(idx) => &url[idx + 3..],
        None => url,
    };
    let end = without_scheme
        .find(['/', '?', '#'])
        .unwrap_or(without_scheme.len());
    let authority = &without_scheme[..end];
    let host = match authority.rfind('@') {
        Some(idx) => &authority[idx + 1..],
        None => authority,
    };
    let domain = host.trim();

    if domain.is_empty() {
        None
    } else {
        Some(domain.to_string())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Host part of `host[:port]`, handling bracketed IPv6 (`[::1]:3000`).
fn host_of(domain: &str) -> &str {
    if let Some(rest) = domain.strip_prefix('[') {
        return rest.split(']').next().unwrap_or(rest);
    }
    // Bare IPv6 has more than one colon and no port.
    if domain.matches(':').count() > 1 {
        return domain;
    }
    domain.split(':').next().unwrap_or(domain)
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
