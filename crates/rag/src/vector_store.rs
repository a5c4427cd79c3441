//! Vector index boundary and its Qdrant implementation
//!
//! The corpus lives in one collection; each point's payload carries the
//! chunk `text`, a `namespace` tag and a `source`. Namespace partitions are
//! expressed as payload filters.

use async_trait::async_trait;
use qdrant_client::{
    qdrant::{
        condition::ConditionOneOf, point_id::PointIdOptions, r#match::MatchValue, value::Kind,
        Condition, FieldCondition, Filter, Match, RepeatedStrings, SearchPointsBuilder,
    },
    Qdrant,
};
use std::collections::HashMap;

use replica_core::{Namespace, RetrievalChunk};

use crate::filters::MetadataFilter;
use crate::RagError;

/// Vector store configuration
#[derive(Debug, Clone)]
pub struct VectorStoreConfig {
    pub endpoint: String,
    pub collection: String,
    /// API key (optional)
    pub api_key: Option<String>,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self::from(&replica_config::RetrievalConfig::default())
    }
}

impl From<&replica_config::RetrievalConfig> for VectorStoreConfig {
    fn from(config: &replica_config::RetrievalConfig) -> Self {
        Self {
            endpoint: config.qdrant_endpoint.clone(),
            collection: config.qdrant_collection.clone(),
            api_key: config.qdrant_api_key.clone(),
        }
    }
}

/// Which slice of the corpus a query searches
#[derive(Debug, Clone, PartialEq)]
pub enum QueryScope {
    /// Default partition, no namespace awareness
    Unscoped,
    Namespace(Namespace),
    Filtered(MetadataFilter),
}

/// One similarity hit with its payload
#[derive(Debug, Clone)]
pub struct VectorHit {
    pub id: String,
    pub score: f32,
    pub text: String,
    /// Remaining string payload fields
    pub metadata: HashMap<String, String>,
}

impl VectorHit {
    /// Convert to a chunk; `fallback_namespace` applies when the payload has no tag
    pub fn into_chunk(self, fallback_namespace: Option<Namespace>) -> RetrievalChunk {
        let namespace = self
            .metadata
            .get("namespace")
            .or_else(|| self.metadata.get("category"))
            .map(|tag| Namespace::from_tag(tag))
            .or(fallback_namespace)
            .unwrap_or(Namespace::General);
        let source = self
            .metadata
            .get("source")
            .cloned()
            .unwrap_or_else(|| self.id.clone());

        RetrievalChunk {
            text: self.text,
            namespace,
            score: self.score,
            source,
        }
    }
}

/// Similarity search over the partitioned corpus
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        scope: &QueryScope,
    ) -> Result<Vec<VectorHit>, RagError>;
}

/// Qdrant-backed index
pub struct QdrantIndex {
    client: Qdrant,
    config: VectorStoreConfig,
}

impl QdrantIndex {
    pub fn new(config: VectorStoreConfig) -> Result<Self, RagError> {
        let mut builder = Qdrant::from_url(&config.endpoint);

        if let Some(ref api_key) = config.api_key {
            builder = builder.api_key(api_key.clone());
            tracing::info!("Qdrant connection using API key authentication");
        }

        let client = builder
            .build()
            .map_err(|e| RagError::Connection(e.to_string()))?;

        Ok(Self { client, config })
    }

    pub async fn collection_exists(&self) -> Result<bool, RagError> {
        Ok(self.client.collection_exists(&self.config.collection).await?)
    }
}

fn keyword_condition(key: &str, value: MatchValue) -> Condition {
    Condition {
        condition_one_of: Some(ConditionOneOf::Field(FieldCondition {
            key: key.to_string(),
            r#match: Some(Match {
                match_value: Some(value),
            }),
            ..Default::default()
        })),
    }
}

fn scope_filter(scope: &QueryScope) -> Option<Filter> {
    let condition = match scope {
        QueryScope::Unscoped => return None,
        QueryScope::Namespace(ns) => {
            keyword_condition("namespace", MatchValue::Keyword(ns.as_str().to_string()))
        }
        QueryScope::Filtered(filter) if filter.is_empty() => return None,
        QueryScope::Filtered(filter) => keyword_condition(
            "namespace",
            MatchValue::Keywords(RepeatedStrings {
                strings: filter.tags(),
            }),
        ),
    };

    Some(Filter {
        must: vec![condition],
        ..Default::default()
    })
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        scope: &QueryScope,
    ) -> Result<Vec<VectorHit>, RagError> {
        let mut search_builder =
            SearchPointsBuilder::new(&self.config.collection, vector.to_vec(), top_k as u64)
                .with_payload(true);

        if let Some(filter) = scope_filter(scope) {
            search_builder = search_builder.filter(filter);
        }

        let results = self
            .client
            .search_points(search_builder)
            .await
            .map_err(|e| RagError::Search(e.to_string()))?;

        let hits = results
            .result
            .into_iter()
            .map(|point| {
                let mut metadata = HashMap::new();
                let mut text = String::new();

                for (k, v) in point.payload {
                    if let Some(Kind::StringValue(s)) = v.kind {
                        if k == "text" || k == "page_content" {
                            text = s;
                        } else {
                            metadata.insert(k, s);
                        }
                    }
                }

                let id = point
                    .id
                    .and_then(|pid| pid.point_id_options)
                    .map(|opt| match opt {
                        PointIdOptions::Uuid(u) => u,
                        PointIdOptions::Num(n) => n.to_string(),
                    })
                    .unwrap_or_default();

                VectorHit {
                    id,
                    score: point.score,
                    text,
                    metadata,
                }
            })
            .collect();

        Ok(hits)
    }
}
