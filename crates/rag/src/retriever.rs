//! Intent-aware context retriever
//!
//! Strategies run in order until one yields chunks:
//! 1. Primary: metadata-filtered search over the whole corpus
//! 2. Namespace-scoped: the intent's namespaces in priority order
//! 3. Cross-namespace: every namespace, merged by score then namespace rank
//! 4. Unscoped: plain similarity search over the default partition
//!
//! A failing strategy counts as zero results; `retrieve` never errors.

use async_trait::async_trait;
use futures::future::join_all;
use std::cmp::Ordering;
use std::sync::Arc;

use replica_core::{Intent, Namespace, RetrievalChunk};
use replica_llm::{ChatModel, Embedder, LlmError, ProviderManager};

use crate::filters::{derive_filter, filter_instruction, parse_model_filter, MetadataFilter};
use crate::namespaces::{priority_for, tie_break_rank};
use crate::vector_store::{QueryScope, VectorIndex};

/// Where the retriever obtains its embedding and (optional) filter models
#[async_trait]
pub trait ModelSource: Send + Sync {
    fn embedder(&self) -> Option<Arc<dyn Embedder>>;

    fn chat_model(&self) -> Option<Arc<dyn ChatModel>> {
        None
    }

    /// Embed the query with the current embedder
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let embedder = self
            .embedder()
            .ok_or(LlmError::ProviderUnavailable("embeddings"))?;
        embedder.embed(text).await
    }
}

#[async_trait]
impl ModelSource for ProviderManager {
    fn embedder(&self) -> Option<Arc<dyn Embedder>> {
        self.embeddings()
    }

    fn chat_model(&self) -> Option<Arc<dyn ChatModel>> {
        ProviderManager::chat_model(self)
    }

    /// A failed call moves the manager on to the next embeddings provider
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        ProviderManager::embed(self, text).await
    }
}

/// Retriever configuration
#[derive(Debug, Clone)]
pub struct RetrieverConfig {
    /// Chunks returned to the caller
    pub top_k: usize,
    /// Namespace-scoped search stops once this many chunks are gathered
    pub target_count: usize,
    pub min_score: f32,
    /// Ask the chat model to propose the primary filter
    pub llm_filter: bool,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self::from(&replica_config::RetrievalConfig::default())
    }
}

impl From<&replica_config::RetrievalConfig> for RetrieverConfig {
    fn from(config: &replica_config::RetrievalConfig) -> Self {
        Self {
            top_k: config.top_k,
            target_count: config.target_count,
            min_score: config.min_score,
            llm_filter: config.llm_filter,
        }
    }
}

/// Order by descending score, ties broken by namespace rank
pub fn rank_chunks(chunks: &mut [RetrievalChunk]) {
    chunks.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| tie_break_rank(a.namespace).cmp(&tie_break_rank(b.namespace)))
    });
}

pub struct ContextRetriever {
    index: Arc<dyn VectorIndex>,
    models: Arc<dyn ModelSource>,
    config: RetrieverConfig,
}

impl ContextRetriever {
    pub fn new(
        index: Arc<dyn VectorIndex>,
        models: Arc<dyn ModelSource>,
        config: RetrieverConfig,
    ) -> Self {
        Self {
            index,
            models,
            config,
        }
    }

    pub fn config(&self) -> &RetrieverConfig {
        &self.config
    }

    /// Context chunks for `query`, at most `top_k`, possibly empty
    pub async fn retrieve(&self, query: &str, intent: Intent) -> Vec<RetrievalChunk> {
        let Some(vector) = self.embed(query).await else {
            return Vec::new();
        };

        let chunks = self.primary_search(query, intent, &vector).await;
        if !chunks.is_empty() {
            return self.finish("primary", chunks);
        }

        let chunks = self.namespace_search(&vector, priority_for(intent)).await;
        if !chunks.is_empty() {
            return self.finish("namespace", chunks);
        }

        let chunks = self.cross_namespace_search(&vector).await;
        if !chunks.is_empty() {
            return self.finish("cross_namespace", chunks);
        }

        let chunks = self.unscoped_search(&vector).await;
        self.finish("unscoped", chunks)
    }

    async fn embed(&self, query: &str) -> Option<Vec<f32>> {
        match self.models.embed(query).await {
            Ok(vector) => Some(vector),
            Err(e) => {
                tracing::warn!(error = %e, "Query embedding failed, skipping retrieval");
                None
            }
        }
    }

    fn finish(&self, strategy: &str, mut chunks: Vec<RetrievalChunk>) -> Vec<RetrievalChunk> {
        chunks.truncate(self.config.top_k);
        tracing::debug!(strategy, count = chunks.len(), "Retrieved context");
        chunks
    }

    async fn search(
        &self,
        strategy: &str,
        vector: &[f32],
        top_k: usize,
        scope: &QueryScope,
    ) -> Vec<RetrievalChunk> {
        let namespace = match scope {
            QueryScope::Namespace(ns) => Some(*ns),
            _ => None,
        };

        match self.index.query(vector, top_k, scope).await {
            Ok(hits) => hits
                .into_iter()
                .filter(|h| h.score >= self.config.min_score)
                .map(|h| h.into_chunk(namespace))
                .collect(),
            Err(e) => {
                tracing::warn!(strategy, error = %e, "Retrieval strategy failed");
                Vec::new()
            }
        }
    }

    async fn model_filter(&self, query: &str) -> Option<MetadataFilter> {
        let model = self.models.chat_model()?;
        match model.generate(&filter_instruction(query), "").await {
            Ok(reply) => parse_model_filter(&reply),
            Err(e) => {
                tracing::debug!(error = %e, "Model filter unavailable, using keyword filter");
                None
            }
        }
    }

    /// Metadata-filtered search over the whole corpus
    pub async fn primary_search(
        &self,
        query: &str,
        intent: Intent,
        vector: &[f32],
    ) -> Vec<RetrievalChunk> {
        let filter = if self.config.llm_filter {
            match self.model_filter(query).await {
                Some(filter) => filter,
                None => derive_filter(query, intent),
            }
        } else {
            derive_filter(query, intent)
        };
        tracing::debug!(namespaces = ?filter.tags(), "Primary retrieval filter");

        self.search("primary", vector, self.config.top_k, &QueryScope::Filtered(filter))
            .await
    }

    /// Each namespace in priority order until `target_count` chunks are gathered
    pub async fn namespace_search(
        &self,
        vector: &[f32],
        priority: &[Namespace],
    ) -> Vec<RetrievalChunk> {
        let mut gathered = Vec::new();
        for ns in priority {
            let remaining = self.config.target_count.saturating_sub(gathered.len());
            if remaining == 0 {
                break;
            }
            let chunks = self
                .search("namespace", vector, remaining, &QueryScope::Namespace(*ns))
                .await;
            tracing::debug!(namespace = %ns, count = chunks.len(), "Namespace search");
            gathered.extend(chunks);
        }
        gathered
    }

    /// One search per known namespace, merged and ranked
    pub async fn cross_namespace_search(&self, vector: &[f32]) -> Vec<RetrievalChunk> {
        let searches = Namespace::ALL.into_iter().map(|ns| async move {
            let mut chunks = self
                .search("cross_namespace", vector, self.config.top_k, &QueryScope::Namespace(ns))
                .await;
            for chunk in &mut chunks {
                chunk.namespace = ns;
            }
            chunks
        });

        let mut merged: Vec<RetrievalChunk> =
            join_all(searches).await.into_iter().flatten().collect();
        rank_chunks(&mut merged);
        merged
    }

    /// Unfiltered similarity search
    pub async fn unscoped_search(&self, vector: &[f32]) -> Vec<RetrievalChunk> {
        self.search("unscoped", vector, self.config.top_k, &QueryScope::Unscoped)
            .await
    }
}
