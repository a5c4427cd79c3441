//! Explicitly constructed request-handling context
//!
//! Everything a chat request touches lives here and is shared by `Arc`.
//! Tests build one from fakes with [`AssistantContext::new`].

use std::sync::Arc;

use replica_config::{ChatConfig, Settings};
use replica_llm::{default_adapters, EnvSecrets, ProviderManager, ProviderRouter, SecretSource};
use replica_rag::{ContextRetriever, QdrantIndex, RetrieverConfig, VectorStoreConfig};

use crate::cache::ResponseCache;
use crate::history::ConversationHistory;
use crate::intent::IntentDetector;
use crate::metrics::ChatMetrics;
use crate::quota::QuotaLimiter;
use crate::AgentError;

pub struct AssistantContext {
    pub manager: Arc<ProviderManager>,
    pub router: Arc<ProviderRouter>,
    pub retriever: Arc<ContextRetriever>,
    pub intents: IntentDetector,
    pub cache: ResponseCache,
    pub history: ConversationHistory,
    pub quota: QuotaLimiter,
    pub metrics: ChatMetrics,
}

impl AssistantContext {
    pub fn new(
        manager: Arc<ProviderManager>,
        router: Arc<ProviderRouter>,
        retriever: Arc<ContextRetriever>,
        chat: &ChatConfig,
    ) -> Self {
        Self {
            manager,
            router,
            retriever,
            intents: IntentDetector::from_config(chat),
            cache: ResponseCache::from_config(chat),
            history: ConversationHistory::from_config(chat),
            quota: QuotaLimiter::from_config(chat),
            metrics: ChatMetrics::new(),
        }
    }

    /// Wire the production stack: environment credentials, every known
    /// backend, the configured mapping store and Qdrant.
    pub async fn from_settings(settings: &Settings) -> Result<Self, AgentError> {
        let secrets: Arc<dyn SecretSource> = Arc::new(EnvSecrets);
        let manager = Arc::new(
            ProviderManager::new(default_adapters(secrets.clone(), &settings.providers))
                .with_secrets(secrets),
        );
        tracing::info!(
            chat = ?manager.current_chat_provider(),
            embeddings = ?manager.current_embeddings_provider(),
            "Provider manager initialized"
        );

        let store = replica_persistence::store_from_settings(&settings.persistence).await;
        let router = Arc::new(ProviderRouter::new(manager.clone(), store, &settings.router));

        let index = Arc::new(QdrantIndex::new(VectorStoreConfig::from(&settings.retrieval))?);
        match index.collection_exists().await {
            Ok(true) => {}
            Ok(false) => tracing::warn!(
                collection = %settings.retrieval.qdrant_collection,
                "Qdrant collection missing, answers will have no context"
            ),
            Err(e) => tracing::warn!(error = %e, "Qdrant unreachable, retrieval will degrade"),
        }

        let retriever = Arc::new(ContextRetriever::new(
            index,
            manager.clone(),
            RetrieverConfig::from(&settings.retrieval),
        ));

        Ok(Self::new(manager, router, retriever, &settings.chat))
    }
}
