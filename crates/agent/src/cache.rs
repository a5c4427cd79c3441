//! Response cache
//!
//! Bounded moka cache keyed by user, session and normalized query. A hit
//! short-circuits retrieval and generation entirely.

use moka::future::Cache;
use serde::Serialize;
use std::time::Duration;

use replica_config::ChatConfig;

use crate::service::ChatResponse;

/// `chat_cache:{user}:{session}:{query}` with the query case-folded and trimmed
pub fn cache_key(user_id: Option<&str>, session_id: Option<&str>, query: &str) -> String {
    format!(
        "chat_cache:{}:{}:{}",
        user_id.unwrap_or_default(),
        session_id.unwrap_or_default(),
        query.trim().to_lowercase()
    )
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub entries: u64,
    pub capacity: u64,
    pub ttl_secs: u64,
}

#[derive(Clone)]
pub struct ResponseCache {
    cache: Cache<String, ChatResponse>,
    capacity: u64,
    ttl: Duration,
}

impl ResponseCache {
    pub fn new(capacity: u64, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(capacity)
            .time_to_live(ttl)
            .build();
        Self {
            cache,
            capacity,
            ttl,
        }
    }

    pub fn from_config(config: &ChatConfig) -> Self {
        Self::new(config.cache_capacity, Duration::from_secs(config.cache_ttl_secs))
    }

    pub async fn get(&self, key: &str) -> Option<ChatResponse> {
        self.cache.get(key).await
    }

    pub async fn insert(&self, key: String, response: ChatResponse) {
        self.cache.insert(key, response).await;
    }

    /// Drop every entry
    pub async fn clear(&self) {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
        tracing::info!("Response cache cleared");
    }

    pub async fn stats(&self) -> CacheStats {
        // entry_count lags until pending maintenance runs
        self.cache.run_pending_tasks().await;
        CacheStats {
            entries: self.cache.entry_count(),
            capacity: self.capacity,
            ttl_secs: self.ttl.as_secs(),
        }
    }
}

impl std::fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("capacity", &self.capacity)
            .field("entries", &self.cache.entry_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_response;

    #[test]
    fn test_key_normalizes_query() {
        assert_eq!(
            cache_key(Some("u1"), Some("s1"), "  What Do You Build?  "),
            "chat_cache:u1:s1:what do you build?"
        );
        assert_eq!(cache_key(None, None, "Hi"), "chat_cache:::hi");
    }

    #[tokio::test]
    async fn test_insert_get_clear() {
        let cache = ResponseCache::new(16, Duration::from_secs(60));
        let key = cache_key(Some("u1"), None, "hello");
        cache.insert(key.clone(), sample_response("hi there")).await;

        let hit = cache.get(&key).await;
        assert_eq!(hit.map(|r| r.response), Some("hi there".to_string()));
        assert_eq!(cache.stats().await.entries, 1);

        cache.clear().await;
        assert!(cache.get(&key).await.is_none());
        assert_eq!(cache.stats().await.entries, 0);
    }
}
