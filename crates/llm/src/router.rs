//! User-to-provider routing
//!
//! Spreads users across providers with small free quotas and keeps each
//! user on the same provider across interactions. Assignments are cached in
//! memory, persisted through a `ProviderMappingStore`, and the in-memory
//! state is cleared lazily once the rotation interval has elapsed.

use parking_lot::Mutex;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use replica_config::constants::FALLBACK_PROVIDER_LABEL;
use replica_config::RouterConfig;
use replica_persistence::ProviderMappingStore;

use crate::manager::ProviderManager;
use crate::model::ChatModel;
use crate::LlmError;

/// Routing key: `{user}_{session}` when a session is given, else the user
pub fn routing_key(user_id: &str, session_id: Option<&str>) -> String {
    match session_id {
        Some(session) if !session.is_empty() => format!("{}_{}", user_id, session),
        _ => user_id.to_string(),
    }
}

/// Stable across processes and platforms, unlike `DefaultHasher`
pub fn stable_hash(key: &str) -> u64 {
    let digest = Sha256::digest(key.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes)
}

/// Chat handle resolved for a specific provider
#[derive(Clone)]
pub struct RoutedModel {
    pub provider: String,
    pub model: Arc<dyn ChatModel>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProviderUsage {
    pub provider: String,
    pub assignments: u64,
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RouterStats {
    pub available_providers: Vec<String>,
    pub total_assignments: u64,
    /// Only providers with at least one assignment
    pub distribution: Vec<ProviderUsage>,
    pub cache_size: usize,
    pub seconds_since_rotation: u64,
}

struct RouterState {
    assignments: HashMap<String, String>,
    usage: HashMap<String, u64>,
    last_rotation: Instant,
    round_robin: usize,
}

impl RouterState {
    fn new() -> Self {
        Self {
            assignments: HashMap::new(),
            usage: HashMap::new(),
            last_rotation: Instant::now(),
            round_robin: 0,
        }
    }

    fn record(&mut self, key: &str, provider: &str) {
        self.assignments.insert(key.to_string(), provider.to_string());
        *self.usage.entry(provider.to_string()).or_insert(0) += 1;
    }
}

pub struct ProviderRouter {
    manager: Arc<ProviderManager>,
    store: Arc<dyn ProviderMappingStore>,
    preference: Vec<String>,
    rotation_interval: Duration,
    state: Mutex<RouterState>,
}

impl ProviderRouter {
    pub fn new(
        manager: Arc<ProviderManager>,
        store: Arc<dyn ProviderMappingStore>,
        config: &RouterConfig,
    ) -> Self {
        Self {
            manager,
            store,
            preference: config.preference.clone(),
            rotation_interval: Duration::from_secs(config.rotation_interval_secs),
            state: Mutex::new(RouterState::new()),
        }
    }

    pub fn with_rotation_interval(mut self, interval: Duration) -> Self {
        self.rotation_interval = interval;
        self
    }

    /// Preferred providers whose credentials are currently present
    pub fn available_providers(&self) -> Vec<String> {
        self.preference
            .iter()
            .filter(|name| self.manager.adapter(name).is_some_and(|a| a.is_available()))
            .cloned()
            .collect()
    }

    fn maybe_rotate(&self) {
        let mut state = self.state.lock();
        if state.last_rotation.elapsed() >= self.rotation_interval {
            tracing::info!(
                cleared = state.assignments.len(),
                "Rotating provider assignments"
            );
            state.assignments.clear();
            state.usage.clear();
            state.last_rotation = Instant::now();
        }
    }

    async fn persist(&self, key: &str, provider: &str) {
        if let Err(e) = self.store.set(key, provider).await {
            tracing::warn!(key = %key, provider = %provider, error = %e, "Failed to persist provider mapping");
        }
    }

    /// Known to the manager and currently available, whether or not it is
    /// in the preference order
    fn is_usable(&self, provider: &str) -> bool {
        self.manager.adapter(provider).is_some_and(|a| a.is_available())
    }

    async fn stored(&self, key: &str) -> Option<String> {
        match self.store.get(key).await {
            Ok(mapping) => mapping.map(|m| m.provider_name),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Provider mapping lookup failed");
                None
            }
        }
    }

    /// Provider for a user: an existing assignment (in memory, then
    /// persisted) when still usable, otherwise stable hash modulo the
    /// available set.
    ///
    /// Returns the fallback label when no provider is available.
    pub async fn route(&self, user_id: &str, session_id: Option<&str>) -> String {
        self.maybe_rotate();
        let key = routing_key(user_id, session_id);

        let cached = self.state.lock().assignments.get(&key).cloned();
        if let Some(cached) = cached.filter(|p| self.is_usable(p)) {
            return cached;
        }
        if let Some(stored) = self.stored(&key).await.filter(|p| self.is_usable(p)) {
            self.state.lock().assignments.insert(key, stored.clone());
            return stored;
        }

        let available = self.available_providers();
        if available.is_empty() {
            tracing::warn!("No providers available, using fallback");
            return FALLBACK_PROVIDER_LABEL.to_string();
        }

        let index = (stable_hash(&key) % available.len() as u64) as usize;
        let selected = available[index].clone();

        self.state.lock().record(&key, &selected);
        self.persist(&key, &selected).await;

        tracing::info!(user_id = %user_id, provider = %selected, "Assigned provider");
        selected
    }

    /// Next provider from the preference order, skipping unavailable ones
    fn assign_next(&self) -> Option<String> {
        let available = self.available_providers();
        if available.is_empty() {
            return None;
        }
        let mut state = self.state.lock();
        let selected = available[state.round_robin % available.len()].clone();
        state.round_robin = state.round_robin.wrapping_add(1);
        tracing::info!(provider = %selected, "Assigned provider via round-robin");
        Some(selected)
    }

    /// Resolve the chat model for a user.
    ///
    /// Lookup order: explicit request, in-memory cache, persisted store,
    /// fresh round-robin assignment. A requested name the manager does not
    /// know is ignored. The result bypasses the manager's fallback chain;
    /// callers fall back to `ProviderManager` on `None`.
    pub async fn chat_model_for_user(
        &self,
        user_id: &str,
        session_id: Option<&str>,
        requested: Option<&str>,
    ) -> Option<RoutedModel> {
        self.maybe_rotate();
        let key = routing_key(user_id, session_id);

        let requested = requested.filter(|name| {
            let known = self.manager.adapter(name).is_some();
            if !known {
                tracing::warn!(provider = %name, "Ignoring request for unknown provider");
            }
            known
        });

        let provider = if let Some(requested) = requested {
            self.persist(&key, requested).await;
            self.state
                .lock()
                .assignments
                .insert(key.clone(), requested.to_string());
            requested.to_string()
        } else {
            let cached = self.state.lock().assignments.get(&key).cloned();
            match cached {
                Some(provider) => provider,
                None => match self.stored(&key).await {
                    Some(provider) => {
                        self.state
                            .lock()
                            .assignments
                            .insert(key.clone(), provider.clone());
                        provider
                    }
                    None => {
                        let provider = self.assign_next()?;
                        self.persist(&key, &provider).await;
                        self.state.lock().record(&key, &provider);
                        provider
                    }
                },
            }
        };

        self.chat_model_by_name(&provider)
    }

    /// Model of one named provider, without the manager's fallback chain
    pub fn chat_model_by_name(&self, provider: &str) -> Option<RoutedModel> {
        let adapter = self.manager.adapter(provider)?;
        if !adapter.is_available() {
            tracing::debug!(provider = %provider, "Routed provider unavailable");
            return None;
        }
        adapter.chat_model().map(|model| RoutedModel {
            provider: provider.to_string(),
            model,
        })
    }

    /// Pin a user to a provider until cleared or rotated
    pub async fn force_provider_for_user(
        &self,
        user_id: &str,
        provider: &str,
        session_id: Option<&str>,
    ) -> Result<(), LlmError> {
        if self.manager.adapter(provider).is_none() {
            return Err(LlmError::ProviderNotFound(provider.to_string()));
        }
        let key = routing_key(user_id, session_id);
        self.state
            .lock()
            .assignments
            .insert(key.clone(), provider.to_string());
        self.store.set(&key, provider).await?;
        tracing::info!(user_id = %user_id, provider = %provider, "Forced provider for user");
        Ok(())
    }

    /// Drop the in-memory assignment for one user
    pub fn clear_user_cache(&self, user_id: &str, session_id: Option<&str>) -> bool {
        let key = routing_key(user_id, session_id);
        let removed = self.state.lock().assignments.remove(&key).is_some();
        if removed {
            tracing::info!(user_id = %user_id, "Cleared provider cache for user");
        }
        removed
    }

    pub fn stats(&self) -> RouterStats {
        let available_providers = self.available_providers();
        let state = self.state.lock();
        let total: u64 = state.usage.values().sum();

        let mut distribution: Vec<ProviderUsage> = state
            .usage
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(provider, count)| ProviderUsage {
                provider: provider.clone(),
                assignments: *count,
                percentage: *count as f64 / total as f64 * 100.0,
            })
            .collect();
        distribution.sort_by(|a, b| b.assignments.cmp(&a.assignments).then(a.provider.cmp(&b.provider)));

        RouterStats {
            available_providers,
            total_assignments: total,
            distribution,
            cache_size: state.assignments.len(),
            seconds_since_rotation: state.last_rotation.elapsed().as_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::ProviderAdapter;
    use crate::manager::tests::FakeAdapter;
    use replica_persistence::InMemoryMappingStore;

    fn setup(names: &[&str]) -> (Vec<Arc<FakeAdapter>>, Arc<InMemoryMappingStore>, ProviderRouter) {
        setup_with(names, names)
    }

    /// Adapters known to the manager, with a possibly narrower preference
    fn setup_with(
        names: &[&str],
        preference: &[&str],
    ) -> (Vec<Arc<FakeAdapter>>, Arc<InMemoryMappingStore>, ProviderRouter) {
        let adapters: Vec<Arc<FakeAdapter>> = names.iter().map(|n| FakeAdapter::new(n)).collect();
        let manager = Arc::new(ProviderManager::new(
            adapters
                .iter()
                .map(|a| a.clone() as Arc<dyn ProviderAdapter>)
                .collect(),
        ));
        let store = Arc::new(InMemoryMappingStore::new());
        let config = RouterConfig {
            rotation_interval_secs: 3600,
            preference: preference.iter().map(|s| s.to_string()).collect(),
        };
        let router = ProviderRouter::new(manager, store.clone(), &config);
        (adapters, store, router)
    }

    #[test]
    fn test_routing_key() {
        assert_eq!(routing_key("alice", Some("s1")), "alice_s1");
        assert_eq!(routing_key("alice", None), "alice");
        assert_eq!(routing_key("alice", Some("")), "alice");
    }

    #[test]
    fn test_stable_hash_is_fixed() {
        assert_eq!(stable_hash("alice"), stable_hash("alice"));
        assert_ne!(stable_hash("alice"), stable_hash("bob"));
    }

    #[tokio::test]
    async fn test_route_is_deterministic() {
        let (_, _, router) = setup(&["OpenAI", "Groq", "Ollama"]);
        let first = router.route("alice", None).await;
        for _ in 0..10 {
            assert_eq!(router.route("alice", None).await, first);
        }

        // a fresh router with the same available set computes the same answer
        let (_, _, other) = setup(&["OpenAI", "Groq", "Ollama"]);
        assert_eq!(other.route("alice", None).await, first);
    }

    #[tokio::test]
    async fn test_route_spreads_users() {
        let (_, _, router) = setup(&["OpenAI", "Groq", "Ollama"]);
        for i in 0..60 {
            router.route(&format!("user-{}", i), None).await;
        }
        let stats = router.stats();
        assert_eq!(stats.total_assignments, 60);
        assert_eq!(stats.cache_size, 60);
        assert!(stats.distribution.len() > 1);
        let total: f64 = stats.distribution.iter().map(|d| d.percentage).sum();
        assert!((total - 100.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_route_reassigns_when_provider_disappears() {
        let (adapters, _, router) = setup(&["OpenAI", "Groq"]);
        let first = router.route("carol", None).await;
        let idx = if first == "OpenAI" { 0 } else { 1 };

        adapters[idx].set_available(false);
        let second = router.route("carol", None).await;
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_route_without_providers_uses_fallback_label() {
        let (adapters, _, router) = setup(&["OpenAI", "Groq"]);
        for a in &adapters {
            a.set_available(false);
        }
        assert_eq!(router.route("dave", None).await, "Intent-based fallback");
        assert!(router.chat_model_for_user("dave", None, None).await.is_none());
    }

    #[tokio::test]
    async fn test_force_provider_overrides_and_persists() {
        let (_, store, router) = setup(&["OpenAI", "Groq", "Ollama"]);
        router.force_provider_for_user("erin", "Ollama", None).await.unwrap();

        assert_eq!(router.route("erin", None).await, "Ollama");
        let routed = router.chat_model_for_user("erin", None, None).await.unwrap();
        assert_eq!(routed.provider, "Ollama");
        assert_eq!(store.get("erin").await.unwrap().unwrap().provider_name, "Ollama");

        assert!(router.force_provider_for_user("erin", "Claude", None).await.is_err());
    }

    #[tokio::test]
    async fn test_chat_model_for_user_round_robin_and_persist() {
        let (_, store, router) = setup(&["OpenAI", "Groq"]);

        let a = router.chat_model_for_user("u1", None, None).await.unwrap();
        let b = router.chat_model_for_user("u2", None, None).await.unwrap();
        assert_eq!(a.provider, "OpenAI");
        assert_eq!(b.provider, "Groq");
        assert_eq!(store.len(), 2);

        // cached: same provider on repeat
        let again = router.chat_model_for_user("u1", None, None).await.unwrap();
        assert_eq!(again.provider, "OpenAI");
    }

    #[tokio::test]
    async fn test_persisted_mapping_survives_restart() {
        let (_, store, router) = setup(&["OpenAI", "Groq", "Ollama"]);
        store.set("frank", "Ollama").await.unwrap();

        let routed = router.chat_model_for_user("frank", None, None).await.unwrap();
        assert_eq!(routed.provider, "Ollama");
    }

    #[tokio::test]
    async fn test_requested_provider_is_persisted() {
        let (_, store, router) = setup(&["OpenAI", "Groq"]);
        let routed = router.chat_model_for_user("gina", Some("s"), Some("Groq")).await.unwrap();
        assert_eq!(routed.provider, "Groq");
        assert_eq!(store.get("gina_s").await.unwrap().unwrap().provider_name, "Groq");
    }

    #[tokio::test]
    async fn test_route_honors_persisted_mapping() {
        let (_, store, router) = setup(&["OpenAI", "Groq", "Ollama"]);
        let hashed = router.route("kate", None).await;
        let other = if hashed == "Ollama" { "Groq" } else { "Ollama" };

        let (_, store2, restarted) = setup(&["OpenAI", "Groq", "Ollama"]);
        store2.set("kate", other).await.unwrap();
        assert_eq!(restarted.route("kate", None).await, other);
        assert_eq!(restarted.stats().cache_size, 1);
        assert_eq!(store.get("kate").await.unwrap().unwrap().provider_name, hashed);
    }

    #[tokio::test]
    async fn test_route_ignores_persisted_mapping_to_unavailable_provider() {
        let (adapters, store, router) = setup(&["OpenAI", "Groq"]);
        store.set("liam", "Groq").await.unwrap();
        adapters[1].set_available(false);
        assert_eq!(router.route("liam", None).await, "OpenAI");
    }

    #[tokio::test]
    async fn test_forced_provider_outside_preference_is_kept() {
        let (_, store, router) = setup_with(&["OpenAI", "Groq", "Replicate"], &["OpenAI", "Groq"]);
        assert!(!router.available_providers().contains(&"Replicate".to_string()));

        router.force_provider_for_user("mona", "Replicate", None).await.unwrap();
        assert_eq!(router.route("mona", None).await, "Replicate");
        assert_eq!(store.get("mona").await.unwrap().unwrap().provider_name, "Replicate");

        // a restarted router reads the pin back from the store
        router.clear_user_cache("mona", None);
        assert_eq!(router.route("mona", None).await, "Replicate");
        let routed = router.chat_model_for_user("mona", None, None).await.unwrap();
        assert_eq!(routed.provider, "Replicate");
    }

    #[tokio::test]
    async fn test_unknown_requested_provider_is_not_persisted() {
        let (_, store, router) = setup(&["OpenAI", "Groq"]);
        let routed = router
            .chat_model_for_user("nina", Some("s"), Some("OpenAl"))
            .await
            .unwrap();
        assert_eq!(routed.provider, "OpenAI");
        assert_eq!(store.get("nina_s").await.unwrap().unwrap().provider_name, "OpenAI");
        assert_eq!(router.stats().total_assignments, 1);
    }

    #[tokio::test]
    async fn test_chat_model_by_name_bypasses_fallback() {
        let (adapters, _, router) = setup(&["OpenAI", "Groq"]);
        adapters[0].set_constructs(false);
        assert!(router.chat_model_by_name("OpenAI").is_none());
        assert!(router.chat_model_by_name("Unknown").is_none());
        assert_eq!(router.chat_model_by_name("Groq").unwrap().provider, "Groq");
    }

    #[tokio::test]
    async fn test_clear_user_cache() {
        let (_, _, router) = setup(&["OpenAI", "Groq"]);
        router.route("hank", None).await;
        assert!(router.clear_user_cache("hank", None));
        assert!(!router.clear_user_cache("hank", None));
        assert_eq!(router.stats().cache_size, 0);
    }

    #[tokio::test]
    async fn test_rotation_clears_assignments() {
        let (_, _, router) = setup(&["OpenAI", "Groq"]);
        let router = router.with_rotation_interval(Duration::from_millis(20));
        router.route("ivy", None).await;
        assert_eq!(router.stats().cache_size, 1);

        tokio::time::sleep(Duration::from_millis(40)).await;
        router.route("jack", None).await;

        let stats = router.stats();
        assert_eq!(stats.cache_size, 1);
        assert_eq!(stats.total_assignments, 1);
    }
}
