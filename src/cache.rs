use crate::{config::Config, DomainQueryResult};
use moka::future::Cache;
use std::time::Duration;
use tracing::debug;

pub struct CacheService {
    cache: Cache<String, DomainQueryResult>,
}

impl CacheService {
    pub fn new(max_entries: u64, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(ttl)
            .build();

        Self { cache }
    }

    /// Returns `None` when caching is disabled (`cache_ttl_seconds = 0`).
    pub fn from_config(config: &Config) -> Option<Self> {
        if config.cache_ttl_seconds == 0 {
            return None;
        }
        Some(Self::new(
            config.cache_max_entries,
            Duration::from_secs(config.cache_ttl_seconds),
        ))
    }

    pub async fn get(&self, domain: &str) -> Option<DomainQueryResult> {
        let key = self.normalize_domain(domain);

        match self.cache.get(&key).await {
            Some(result) => {
                debug!("Cache hit for domain: {}", domain);
                Some(result)
            }
            None => {
                debug!("Cache miss for domain: {}", domain);
                None
            }
        }
    }

    pub async fn set(&self, domain: &str, result: &DomainQueryResult) {
        let key = self.normalize_domain(domain);
        self.cache.insert(key, result.clone()).await;
        debug!("Cached result for domain: {}", domain);
    }

    fn normalize_domain(&self, domain: &str) -> String {
        let normalized = domain.trim().to_lowercase();

        // Remove trailing dot if present (common in DNS contexts)
        match normalized.strip_suffix('.') {
            Some(stripped) => stripped.to_string(),
            None => normalized,
        }
    }
}
