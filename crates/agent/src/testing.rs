//! Fakes shared by the agent tests

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use replica_config::{ChatConfig, RouterConfig};
use replica_core::{Intent, ProviderDescriptor};
use replica_llm::{
    ChatModel, Embedder, HashEmbedder, LlmError, ProviderAdapter, ProviderManager, ProviderRouter,
};
use replica_persistence::InMemoryMappingStore;
use replica_rag::{ContextRetriever, QueryScope, RagError, RetrieverConfig, VectorHit, VectorIndex};

use crate::context::AssistantContext;
use crate::service::{ChatResponse, ChatService};

pub(crate) fn sample_response(text: &str) -> ChatResponse {
    ChatResponse {
        response: text.to_string(),
        intent: Intent::GeneralRag,
        confidence: 0.6,
        response_time_ms: 12,
        sources: vec![],
        provider: "Alpha".to_string(),
        context_used: false,
        cached: false,
        error: None,
    }
}

struct FakeChat {
    name: String,
    failing: Arc<AtomicBool>,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl ChatModel for FakeChat {
    async fn generate_for(
        &self,
        intent: Intent,
        query: &str,
        context: &str,
    ) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(LlmError::Api(format!("{} is down", self.name)));
        }
        Ok(format!("[{}/{}] {}\n{}", self.name, intent, query, context))
    }

    fn model_name(&self) -> &str {
        &self.name
    }
}

struct FakeEmbedder {
    failing: Arc<AtomicBool>,
}

#[async_trait]
impl Embedder for FakeEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(LlmError::Network("connection refused".to_string()));
        }
        Ok(HashEmbedder::new(8).embed_sync(text))
    }

    fn model_name(&self) -> &str {
        "fake-embedder"
    }
}

/// Provider whose availability, generation and embedding can each be
/// switched off at runtime
pub(crate) struct FakeProvider {
    name: String,
    available: AtomicBool,
    failing: Arc<AtomicBool>,
    embed_failing: Arc<AtomicBool>,
    calls: Arc<AtomicUsize>,
}

impl FakeProvider {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            available: AtomicBool::new(true),
            failing: Arc::new(AtomicBool::new(false)),
            embed_failing: Arc::new(AtomicBool::new(false)),
            calls: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn set_available(&self, value: bool) {
        self.available.store(value, Ordering::SeqCst);
    }

    pub fn set_failing(&self, value: bool) {
        self.failing.store(value, Ordering::SeqCst);
    }

    pub fn set_embed_failing(&self, value: bool) {
        self.embed_failing.store(value, Ordering::SeqCst);
    }

    /// Generation calls across every model handed out
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ProviderAdapter for FakeProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    fn chat_model(&self) -> Option<Arc<dyn ChatModel>> {
        Some(Arc::new(FakeChat {
            name: self.name.clone(),
            failing: self.failing.clone(),
            calls: self.calls.clone(),
        }))
    }

    fn embeddings(&self) -> Option<Arc<dyn Embedder>> {
        Some(Arc::new(FakeEmbedder {
            failing: self.embed_failing.clone(),
        }))
    }

    fn descriptor(&self) -> ProviderDescriptor {
        ProviderDescriptor {
            name: self.name.clone(),
            supports_chat: true,
            supports_embeddings: true,
        }
    }
}

/// Index that answers every query with one projects chunk
#[derive(Default)]
pub(crate) struct CountingIndex {
    calls: AtomicUsize,
}

impl CountingIndex {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VectorIndex for CountingIndex {
    async fn query(
        &self,
        _vector: &[f32],
        _top_k: usize,
        _scope: &QueryScope,
    ) -> Result<Vec<VectorHit>, RagError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![VectorHit {
            id: "chunk-1".to_string(),
            score: 0.9,
            text: "Built a retrieval-augmented assistant in Rust.".to_string(),
            metadata: HashMap::from([
                ("namespace".to_string(), "projects".to_string()),
                ("source".to_string(), "projects.md".to_string()),
            ]),
        }])
    }
}

pub(crate) fn harness(
    providers: &[Arc<FakeProvider>],
    chat: ChatConfig,
) -> (ChatService, Arc<CountingIndex>) {
    let manager = Arc::new(ProviderManager::new(
        providers
            .iter()
            .map(|p| p.clone() as Arc<dyn ProviderAdapter>)
            .collect(),
    ));
    let router_config = RouterConfig {
        preference: providers.iter().map(|p| p.name.clone()).collect(),
        ..RouterConfig::default()
    };
    let router = Arc::new(ProviderRouter::new(
        manager.clone(),
        Arc::new(InMemoryMappingStore::new()),
        &router_config,
    ));

    let index = Arc::new(CountingIndex::default());
    let retriever = Arc::new(ContextRetriever::new(
        index.clone(),
        manager.clone(),
        RetrieverConfig::default(),
    ));

    let ctx = AssistantContext::new(manager, router, retriever, &chat);
    (ChatService::new(Arc::new(ctx)), index)
}
