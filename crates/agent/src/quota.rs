//! Per-user query quota
//!
//! Counters live in a bounded moka cache whose time-to-live is the quota
//! window, so a user's allowance resets once their first counted query
//! ages out.

use moka::future::Cache;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use replica_config::ChatConfig;

/// Stand-in identity for requests without a user id
pub const ANONYMOUS: &str = "anonymous";

/// Quota identity: user id, else session id, else `anonymous`
pub fn quota_key(user_id: Option<&str>, session_id: Option<&str>) -> String {
    user_id
        .filter(|id| !id.is_empty())
        .or(session_id.filter(|id| !id.is_empty()))
        .unwrap_or(ANONYMOUS)
        .to_string()
}

pub struct QuotaLimiter {
    counters: Cache<String, Arc<AtomicU32>>,
    limit: u32,
}

impl QuotaLimiter {
    pub fn new(limit: u32, capacity: u64, window: Duration) -> Self {
        let counters = Cache::builder()
            .max_capacity(capacity)
            .time_to_live(window)
            .build();
        Self { counters, limit }
    }

    pub fn from_config(config: &ChatConfig) -> Self {
        Self::new(
            config.quota_limit,
            config.quota_capacity,
            Duration::from_secs(config.quota_window_secs),
        )
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Keys tracked before the least recently used one is evicted
    pub fn capacity(&self) -> Option<u64> {
        self.counters.policy().max_capacity()
    }

    /// Count one query against `key`.
    ///
    /// Returns false, without counting, once the limit has been reached.
    pub async fn try_acquire(&self, key: &str) -> bool {
        let counter = self
            .counters
            .get_with_by_ref(key, async { Arc::new(AtomicU32::new(0)) })
            .await;

        let limit = self.limit;
        let acquired = counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |used| {
                (used < limit).then_some(used + 1)
            })
            .is_ok();

        if !acquired {
            tracing::info!(user_key = %key, limit, "Query quota exceeded");
        }
        acquired
    }

    /// Queries counted for `key` in the current window
    pub async fn used(&self, key: &str) -> u32 {
        match self.counters.get(key).await {
            Some(counter) => counter.load(Ordering::SeqCst),
            None => 0,
        }
    }

    pub async fn reset(&self, key: &str) {
        self.counters.invalidate(key).await;
    }
}
