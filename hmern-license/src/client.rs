//! Outbound calls to the license server.
//!
//! `POST {server_url}/api/license/validate` with `{ license_key, domain }`,
//! answered by `{ success, message, data }`.

use crate::config::LicenseConfig;
use crate::error::{LicenseError, LicenseResult, TransportError};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Longest slice of an error body kept for logging.
const MAX_ERROR_BODY: usize = 512;

/// Request body sent to the license server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseValidationRequest {
    /// The license key.
    pub license_key: String,
    /// Domain the license is bound to (host[:port]).
    pub domain: String,
}

/// Verdict returned by the license server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResponse {
    /// Whether the license is valid.
    pub success: bool,
    /// Human-readable explanation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Opaque license payload (plan, expiry, features...).
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,
}

/// Something that can ask a license server for a verdict.
#[async_trait]
pub trait LicenseClient: Send + Sync {
    /// Performs one validation call. No retries.
    async fn validate(
        &self,
        request: &LicenseValidationRequest,
    ) -> Result<ValidationResponse, TransportError>;
}

/// [`LicenseClient`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpLicenseClient {
    client: Client,
    validate_url: String,
}

impl HttpLicenseClient {
    /// Creates a client using the server URL and timeout from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::Configuration`] if the HTTP client cannot be built.
    pub fn new(config: &LicenseConfig) -> LicenseResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| LicenseError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            validate_url: config.validate_url(),
        })
    }

    /// The endpoint this client posts to.
    #[must_use]
    pub fn validate_url(&self) -> &str {
        &self.validate_url
    }
}

#[async_trait]
impl LicenseClient for HttpLicenseClient {
    async fn validate(
        &self,
        request: &LicenseValidationRequest,
    ) -> Result<ValidationResponse, TransportError> {
        debug!(url = %self.validate_url, domain = %request.domain, "Validating license");

        let response = self
            .client
            .post(&self.validate_url)
            .json(request)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            if body.len() > MAX_ERROR_BODY {
                let mut cut = MAX_ERROR_BODY;
                while !body.is_char_boundary(cut) {
                    cut -= 1;
                }
                body.truncate(cut);
            }
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response.json::<ValidationResponse>().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout
            } else {
                TransportError::Decode(e.to_string())
            }
        })
    }
}

fn classify(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Network(err.to_string())
    }
}
