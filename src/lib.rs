//! # Domain Checker
//!
//! Telegram bot front-end for a domain-intelligence API.
//!
//! ## Features
//!
//! - Domain syntax validation
//! - Per-user fixed-window quotas
//! - API key pool with sticky rotation on 429/403
//! - Optional in-memory caching of lookup results
//! - Markdown reports of DNS records and subdomain counts
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use domain_checker::{format_report, DomainChecker};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let checker = DomainChecker::new()?;
//!     let result = checker.lookup("example.com").await?;
//!
//!     println!("{}", format_report(&result));
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod bot;
pub mod cache;
pub mod config;
pub mod errors;
pub mod formatter;
pub mod metrics;
pub mod rate_limit;
pub mod rotator;
pub mod telegram;
pub mod validator;

#[cfg(test)]
pub(crate) mod test_mocks;

// Re-export main types for easy access
pub use api::{ApiResponse, DomainApi, SecurityTrailsApi};
pub use bot::{BotService, Command};
pub use cache::CacheService;
pub use config::Config;
pub use errors::CheckerError;
pub use formatter::{format_report, format_report_messages, DomainReport};
pub use rate_limit::{RateDecision, RateLimiter};
pub use rotator::KeyRotator;
pub use validator::{is_valid_domain, validate_domain};

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Decoded domain API payload. Only the fields the report uses are kept.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DomainQueryResult {
    pub hostname: Option<String>,
    pub apex_domain: Option<String>,
    #[serde(default)]
    pub current_dns: CurrentDns,
    pub subdomain_count: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CurrentDns {
    #[serde(default)]
    pub a: RecordSet<ARecord>,
    #[serde(default)]
    pub aaaa: RecordSet<AaaaRecord>,
    #[serde(default)]
    pub mx: RecordSet<MxRecord>,
    #[serde(default)]
    pub ns: RecordSet<NsRecord>,
    #[serde(default)]
    pub soa: RecordSet<SoaRecord>,
    #[serde(default)]
    pub txt: RecordSet<TxtRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordSet<T> {
    #[serde(default = "Vec::new")]
    pub values: Vec<T>,
}

impl<T> Default for RecordSet<T> {
    fn default() -> Self {
        Self { values: Vec::new() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ARecord {
    pub ip: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AaaaRecord {
    pub ipv6: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MxRecord {
    pub hostname: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NsRecord {
    pub nameserver: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoaRecord {
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxtRecord {
    pub value: String,
}

/// High-level lookup client: validation, optional caching and key rotation
#[derive(Clone)]
pub struct DomainChecker {
    rotator: Arc<KeyRotator>,
    cache: Option<Arc<CacheService>>,
}

impl DomainChecker {
    /// Create a new checker from environment configuration
    pub fn new() -> Result<Self, CheckerError> {
        let config = Arc::new(Config::load()?);
        Self::new_with_config(config)
    }

    /// Create a new checker talking to the configured API over HTTP
    pub fn new_with_config(config: Arc<Config>) -> Result<Self, CheckerError> {
        let api: Arc<dyn DomainApi> = Arc::new(SecurityTrailsApi::new(&config)?);
        let rotator = Arc::new(KeyRotator::new(config.api_keys.clone(), api));
        Ok(Self::from_parts(rotator, CacheService::from_config(&config).map(Arc::new)))
    }

    pub fn from_parts(rotator: Arc<KeyRotator>, cache: Option<Arc<CacheService>>) -> Self {
        Self { rotator, cache }
    }

    pub fn rotator(&self) -> &Arc<KeyRotator> {
        &self.rotator
    }

    /// Look up a domain, serving from cache when possible
    pub async fn lookup(&self, domain: &str) -> Result<DomainQueryResult, CheckerError> {
        self.lookup_with_options(domain, false).await
    }

    /// Look up a domain, bypassing the cache
    pub async fn lookup_fresh(&self, domain: &str) -> Result<DomainQueryResult, CheckerError> {
        self.lookup_with_options(domain, true).await
    }

    pub async fn lookup_with_options(&self, domain: &str, fresh: bool) -> Result<DomainQueryResult, CheckerError> {
        let start_time = std::time::Instant::now();
        let domain = validate_domain(domain)?;

        if !fresh {
            if let Some(cache) = &self.cache {
                if let Some(cached) = cache.get(&domain).await {
                    metrics::increment_cache_hits();
                    return Ok(cached);
                }
                metrics::increment_cache_misses();
            }
        }

        let result = self.rotator.fetch(&domain).await?;
        metrics::record_lookup_time(start_time.elapsed());

        if let Some(cache) = &self.cache {
            cache.set(&domain, &result).await;
        }

        Ok(result)
    }

    pub fn cache_enabled(&self) -> bool {
        self.cache.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_mocks::{sample_body, test_config, MockDomainApi};
    use tokio_test::{assert_err, assert_ok};

    fn checker(api: Arc<MockDomainApi>, with_cache: bool) -> DomainChecker {
        let config = test_config();
        let rotator = Arc::new(KeyRotator::new(config.api_keys.clone(), api));
        let cache = if with_cache {
            CacheService::from_config(&config).map(Arc::new)
        } else {
            None
        };
        DomainChecker::from_parts(rotator, cache)
    }

    #[test]
    fn test_decodes_partial_payload() {
        let result: DomainQueryResult = serde_json::from_str(
            r#"{"hostname":"example.com","current_dns":{"a":{"values":[{"ip":"1.2.3.4","ip_count":3}]},"mx":{}}}"#,
        )
        .unwrap();

        assert_eq!(result.hostname.as_deref(), Some("example.com"));
        assert!(result.apex_domain.is_none());
        assert_eq!(result.current_dns.a.values[0].ip, "1.2.3.4");
        assert!(result.current_dns.mx.values.is_empty());
        assert!(result.current_dns.txt.values.is_empty());
        assert!(result.subdomain_count.is_none());
    }

    #[tokio::test]
    async fn test_lookup_rejects_invalid_domain_without_api_call() {
        let api = Arc::new(MockDomainApi::new());
        let checker = checker(api.clone(), false);

        let result = checker.lookup("not a domain").await;
        assert!(matches!(result, Err(CheckerError::InvalidDomain(_))));
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_lookup_uses_cache() {
        let api = Arc::new(MockDomainApi::new().respond("key-1", 200, &sample_body()));
        let checker = checker(api.clone(), true);
        assert!(checker.cache_enabled());

        assert_ok!(checker.lookup("Example.com").await);
        let cached = assert_ok!(checker.lookup("example.com").await);
        assert_eq!(cached.subdomain_count, Some(5));
        assert_eq!(api.calls().len(), 1);

        assert_ok!(checker.lookup_fresh("example.com").await);
        assert_eq!(api.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_lookup_is_not_cached() {
        let api = Arc::new(MockDomainApi::new().respond("key-1", 502, ""));
        let checker = checker(api.clone(), true);

        assert_err!(checker.lookup("example.com").await);
        assert_err!(checker.lookup("example.com").await);
        assert_eq!(api.calls().len(), 2);
    }
}
