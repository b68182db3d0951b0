//! API key pool with sticky rotation.
//!
//! The cursor is shared by every lookup. A 429 or 403 moves it to the next
//! key and the request is retried there; any other non-200 status, or a
//! transport failure, ends the request without rotating. Once the cursor has
//! walked past the last key every lookup fails with
//! [`CheckerError::ApiKeysExhausted`] until [`KeyRotator::reset`] is called.

use crate::{api::DomainApi, errors::CheckerError, metrics, DomainQueryResult};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use tracing::{debug, info, warn};

pub struct KeyRotator {
    keys: Vec<String>,
    cursor: AtomicUsize,
    api: Arc<dyn DomainApi>,
}

impl KeyRotator {
    pub fn new(keys: Vec<String>, api: Arc<dyn DomainApi>) -> Self {
        info!("KeyRotator initialized with {} API keys", keys.len());
        Self {
            keys,
            cursor: AtomicUsize::new(0),
            api,
        }
    }

    pub async fn fetch(&self, domain: &str) -> Result<DomainQueryResult, CheckerError> {
        loop {
            let index = self.cursor.load(Ordering::SeqCst);
            let Some(api_key) = self.keys.get(index) else {
                warn!("All {} API keys are exhausted, refusing lookup for {}", self.keys.len(), domain);
                return Err(CheckerError::ApiKeysExhausted);
            };

            debug!("Fetching {} with API key #{}", domain, index + 1);
            let response = self.api.get_domain(domain, api_key).await?;

            match response.status {
                200 => return Ok(serde_json::from_str(&response.body)?),
                403 | 429 => {
                    // Only the first request to see this key fail moves the cursor
                    if self
                        .cursor
                        .compare_exchange(index, index + 1, Ordering::SeqCst, Ordering::SeqCst)
                        .is_ok()
                    {
                        warn!(
                            "API key #{} rejected with status {}, rotating ({} left)",
                            index + 1,
                            response.status,
                            self.keys.len().saturating_sub(index + 1)
                        );
                        metrics::increment_key_rotations();
                    }
                }
                status => {
                    warn!("Domain API returned unexpected status {} for {}", status, domain);
                    return Err(CheckerError::UnexpectedApiStatus(status));
                }
            }
        }
    }

    /// Rewinds the cursor to the first key.
    pub fn reset(&self) {
        let previous = self.cursor.swap(0, Ordering::SeqCst);
        info!("API key cursor reset (was at #{})", previous + 1);
    }

    pub fn current_index(&self) -> usize {
        self.cursor.load(Ordering::SeqCst)
    }

    pub fn pool_size(&self) -> usize {
        self.keys.len()
    }

    pub fn remaining_keys(&self) -> usize {
        self.keys.len().saturating_sub(self.current_index())
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining_keys() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_mocks::{sample_body, MockDomainApi};
    use tokio_test::{assert_err, assert_ok};

    fn keys(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("key-{}", i)).collect()
    }

    #[tokio::test]
    async fn test_rotates_past_rate_limited_keys() {
        let api = Arc::new(
            MockDomainApi::new()
                .respond("key-1", 429, "")
                .respond("key-2", 429, "")
                .respond("key-3", 200, &sample_body()),
        );
        let rotator = KeyRotator::new(keys(3), api.clone());

        let result = assert_ok!(rotator.fetch("example.com").await);
        assert_eq!(result.hostname.as_deref(), Some("example.com"));
        assert_eq!(rotator.current_index(), 2);
        assert_eq!(api.calls(), vec!["key-1", "key-2", "key-3"]);

        // Rotation is sticky: the next lookup starts on the third key
        assert_ok!(rotator.fetch("example.com").await);
        assert_eq!(api.calls().last().map(String::as_str), Some("key-3"));
        assert_eq!(api.calls().len(), 4);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_rate_limits_rotate_once() {
        let api = Arc::new(
            MockDomainApi::new()
                .respond("key-1", 429, "")
                .respond("key-2", 200, &sample_body())
                .respond("key-3", 200, &sample_body()),
        );
        let rotator = Arc::new(KeyRotator::new(keys(3), api.clone()));

        let handles: Vec<_> = (0..32)
            .map(|_| {
                let rotator = rotator.clone();
                tokio::spawn(async move { rotator.fetch("example.com").await })
            })
            .collect();

        for handle in handles {
            assert_ok!(handle.await.unwrap());
        }
        // Every caller that saw the 429 on key 1 lands on key 2, never key 3
        assert_eq!(rotator.current_index(), 1);
        assert!(!api.calls().iter().any(|key| key == "key-3"));
    }

    #[tokio::test]
    async fn test_all_forbidden_exhausts_pool() {
        let api = Arc::new(
            MockDomainApi::new()
                .respond("key-1", 403, "")
                .respond("key-2", 403, "")
                .respond("key-3", 403, ""),
        );
        let rotator = KeyRotator::new(keys(3), api.clone());

        let err = assert_err!(rotator.fetch("example.com").await);
        assert!(matches!(err, CheckerError::ApiKeysExhausted));
        assert!(rotator.is_exhausted());
        assert_eq!(api.calls().len(), 3);

        // Stays exhausted without touching the API again
        let err = assert_err!(rotator.fetch("example.org").await);
        assert!(matches!(err, CheckerError::ApiKeysExhausted));
        assert_eq!(api.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_unexpected_status_does_not_rotate() {
        let api = Arc::new(
            MockDomainApi::new()
                .respond("key-1", 500, "oops")
                .respond("key-2", 200, &sample_body()),
        );
        let rotator = KeyRotator::new(keys(2), api.clone());

        let err = assert_err!(rotator.fetch("example.com").await);
        assert!(matches!(err, CheckerError::UnexpectedApiStatus(500)));
        assert_eq!(rotator.current_index(), 0);
        assert_eq!(api.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_network_error_does_not_rotate() {
        let api = Arc::new(MockDomainApi::new().fail_with_timeout("key-1"));
        let rotator = KeyRotator::new(keys(2), api.clone());

        let err = assert_err!(rotator.fetch("example.com").await);
        assert!(err.is_network());
        assert_eq!(rotator.current_index(), 0);
    }

    #[tokio::test]
    async fn test_undecodable_body_is_reported() {
        let api = Arc::new(MockDomainApi::new().respond("key-1", 200, "<html>"));
        let rotator = KeyRotator::new(keys(1), api);

        let err = assert_err!(rotator.fetch("example.com").await);
        assert!(matches!(err, CheckerError::JsonError(_)));
    }

    #[tokio::test]
    async fn test_reset_rewinds_cursor() {
        let api = Arc::new(
            MockDomainApi::new()
                .respond("key-1", 429, "")
                .respond("key-2", 429, ""),
        );
        let rotator = KeyRotator::new(keys(2), api.clone());
        assert_err!(rotator.fetch("example.com").await);
        assert!(rotator.is_exhausted());

        rotator.reset();
        assert_eq!(rotator.current_index(), 0);
        assert_eq!(rotator.remaining_keys(), 2);
        assert_err!(rotator.fetch("example.com").await);
        assert_eq!(api.calls().len(), 4);
    }

    #[tokio::test]
    async fn test_empty_pool_is_exhausted() {
        let rotator = KeyRotator::new(Vec::new(), Arc::new(MockDomainApi::new()));
        assert!(rotator.is_exhausted());
        assert!(matches!(
            rotator.fetch("example.com").await,
            Err(CheckerError::ApiKeysExhausted)
        ));
    }
}
