//! Per-user request quotas.
//!
//! Fixed-window counter: a user gets `max_requests` checks, and the count
//! resets once more than `window` has passed since the first request of the
//! window. A user can burst up to twice the limit across a window edge.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::debug;

pub type UserId = i64;

/// Requests counted for one user in the current window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserQuota {
    pub count: u32,
    pub window_start: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: u32 },
    Denied { resets_at: DateTime<Utc> },
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateDecision::Allowed { .. })
    }
}

pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    quotas: Mutex<HashMap<UserId, UserQuota>>,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: std::time::Duration) -> Self {
        Self {
            max_requests,
            window: Duration::from_std(window).unwrap_or_else(|_| Duration::days(36500)),
            quotas: Mutex::new(HashMap::new()),
        }
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    /// Counts one request for `user_id` if the quota allows it.
    pub async fn check_and_increment(&self, user_id: UserId, now: DateTime<Utc>) -> RateDecision {
        let mut quotas = self.quotas.lock().await;
        let quota = quotas.entry(user_id).or_insert(UserQuota {
            count: 0,
            window_start: now,
        });

        if now - quota.window_start > self.window {
            debug!("Quota window elapsed for user {}, resetting", user_id);
            quota.count = 0;
            quota.window_start = now;
        }

        if quota.count >= self.max_requests {
            return RateDecision::Denied {
                resets_at: quota.window_start + self.window,
            };
        }

        quota.count += 1;
        RateDecision::Allowed {
            remaining: self.max_requests - quota.count,
        }
    }

    /// Same decision as [`check_and_increment`](Self::check_and_increment)
    /// without touching any state.
    pub async fn peek(&self, user_id: UserId, now: DateTime<Utc>) -> RateDecision {
        let quotas = self.quotas.lock().await;
        match quotas.get(&user_id) {
            Some(quota) if now - quota.window_start <= self.window => {
                if quota.count >= self.max_requests {
                    RateDecision::Denied {
                        resets_at: quota.window_start + self.window,
                    }
                } else {
                    RateDecision::Allowed {
                        remaining: self.max_requests - quota.count,
                    }
                }
            }
            _ => RateDecision::Allowed {
                remaining: self.max_requests,
            },
        }
    }

    /// Drops entries whose window has elapsed. A dropped user starts a fresh
    /// window on the next request, same as a reset.
    pub async fn prune_expired(&self, now: DateTime<Utc>) -> usize {
        let mut quotas = self.quotas.lock().await;
        let before = quotas.len();
        quotas.retain(|_, quota| now - quota.window_start <= self.window);
        before - quotas.len()
    }

    pub async fn quota(&self, user_id: UserId) -> Option<UserQuota> {
        self.quotas.lock().await.get(&user_id).cloned()
    }

    pub async fn tracked_users(&self) -> usize {
        self.quotas.lock().await.len()
    }
}
