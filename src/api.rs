//! HTTP transport for the domain-intelligence API.
//!
//! The API is SecurityTrails compatible: `GET {base}domain/{domain}` with the
//! credential in an `apikey` header. Status handling and key rotation live in
//! [`crate::rotator`]; this layer only moves bytes.

use crate::{config::Config, errors::CheckerError};
use async_trait::async_trait;
use tracing::debug;
use url::Url;

/// Raw answer from the API before any status interpretation.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

#[async_trait]
pub trait DomainApi: Send + Sync {
    async fn get_domain(&self, domain: &str, api_key: &str) -> Result<ApiResponse, CheckerError>;
}

pub struct SecurityTrailsApi {
    client: reqwest::Client,
    base_url: Url,
}

impl SecurityTrailsApi {
    pub fn new(config: &Config) -> Result<Self, CheckerError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .user_agent(concat!("domain-checker-bot/", env!("CARGO_PKG_VERSION")))
            .gzip(true)
            .build()?;

        Ok(Self {
            client,
            base_url: Self::normalize_base_url(&config.api_base_url)?,
        })
    }

    // Url::join drops the last path segment unless the base ends with '/'
    fn normalize_base_url(raw: &str) -> Result<Url, CheckerError> {
        let mut raw = raw.trim().to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        Url::parse(&raw)
            .map_err(|e| CheckerError::Internal(format!("Invalid API base URL '{}': {}", raw, e)))
    }

    pub fn domain_url(&self, domain: &str) -> Result<Url, CheckerError> {
        self.base_url
            .join(&format!("domain/{}", domain))
            .map_err(|e| CheckerError::Internal(format!("Failed to construct API URL: {}", e)))
    }
}

#[async_trait]
impl DomainApi for SecurityTrailsApi {
    async fn get_domain(&self, domain: &str, api_key: &str) -> Result<ApiResponse, CheckerError> {
        let url = self.domain_url(domain)?;
        debug!("Querying domain API: {}", url);

        let response = self
            .client
            .get(url)
            .header("apikey", api_key)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(map_transport_error)?;

        debug!("Domain API answered {} ({} bytes)", status, body.len());
        Ok(ApiResponse { status, body })
    }
}

fn map_transport_error(error: reqwest::Error) -> CheckerError {
    if error.is_timeout() {
        CheckerError::Timeout
    } else {
        CheckerError::HttpError(error)
    }
}
