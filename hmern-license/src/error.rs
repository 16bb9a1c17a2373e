//! Error types for license validation.

use crate::client::ValidationResponse;
use thiserror::Error;

/// Why the license server could not produce a verdict.
///
/// All variants are treated the same by the validator; they only differ
/// in what gets logged.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request did not complete within the configured timeout.
    #[error("license server request timed out")]
    Timeout,

    /// Connection or protocol failure.
    #[error("network error: {0}")]
    Network(String),

    /// The server answered with a non-2xx status.
    #[error("license server returned HTTP {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly truncated.
        body: String,
    },

    /// The response body was not a validation response.
    #[error("invalid license server response: {0}")]
    Decode(String),
}

/// Licensing errors surfaced to request handlers.
#[derive(Debug, Error)]
pub enum LicenseError {
    /// License key or domain missing, or the HTTP client could not be built.
    #[error("license configuration error: {0}")]
    Configuration(String),

    /// The license server rejected the license.
    #[error("license validation failed: {}", .0.message.as_deref().unwrap_or("license rejected"))]
    Rejected(ValidationResponse),

    /// No verdict could be obtained and there is no valid cached license.
    #[error("license server unavailable: {0}")]
    Unavailable(#[from] TransportError),
}

impl LicenseError {
    /// HTTP status code this error maps to.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Configuration(_) => 500,
            Self::Rejected(_) => 403,
            Self::Unavailable(_) => 503,
        }
    }

    /// Stable machine-readable kind, used in JSON envelopes.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration_error",
            Self::Rejected(_) => "validation_failed",
            Self::Unavailable(_) => "server_unavailable",
        }
    }
}

/// Result type for license operations.
pub type LicenseResult<T> = Result<T, LicenseError>;
