//! Context retrieval for the replica assistant
//!
//! Features:
//! - Namespace priority per intent with a fixed tie-break ranking
//! - Metadata-filtered primary search, with optional model-proposed filters
//! - Layered fallbacks: namespace-scoped, cross-namespace, unfiltered
//! - Qdrant-backed vector index

pub mod filters;
pub mod namespaces;
pub mod retriever;
pub mod vector_store;

pub use filters::MetadataFilter;
pub use namespaces::{priority_for, tie_break_rank};
pub use retriever::{rank_chunks, ContextRetriever, ModelSource, RetrieverConfig};
pub use vector_store::{QdrantIndex, QueryScope, VectorHit, VectorIndex, VectorStoreConfig};

use thiserror::Error;

/// RAG errors
#[derive(Error, Debug)]
pub enum RagError {
    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("Search error: {0}")]
    Search(String),

    #[error("Connection error: {0}")]
    Connection(String),
}

impl From<replica_llm::LlmError> for RagError {
    fn from(err: replica_llm::LlmError) -> Self {
        RagError::Embedding(err.to_string())
    }
}

impl From<qdrant_client::QdrantError> for RagError {
    fn from(err: qdrant_client::QdrantError) -> Self {
        RagError::VectorStore(err.to_string())
    }
}
