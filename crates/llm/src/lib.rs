//! Model provider orchestration
//!
//! Features:
//! - One adapter per external backend (OpenAI, Groq, Together AI, Replicate,
//!   HuggingFace, Ollama, local embeddings)
//! - Priority-ordered fallback for chat and embeddings, tracked independently
//! - Deterministic, persisted user-to-provider routing with periodic rotation

pub mod adapter;
pub mod backend;
pub mod embeddings;
pub mod manager;
pub mod model;
pub mod prompt;
pub mod router;
pub mod secrets;

pub use adapter::{default_adapters, BackendAdapter, ProviderAdapter, ProviderKind};
pub use backend::{
    BackendConfig, HuggingFaceBackend, OllamaBackend, OpenAICompatibleBackend, ReplicateBackend,
};
pub use embeddings::{HashEmbedder, HuggingFaceEmbedder, OllamaEmbedder, OpenAIEmbedder};
pub use manager::{AdapterStatus, Generation, ProviderManager, ProviderStatus};
pub use model::{with_timeout, ChatModel, Embedder};
pub use router::{ProviderRouter, ProviderUsage, RoutedModel, RouterStats};
pub use secrets::{EnvSecrets, SecretSource, StaticSecrets};

use thiserror::Error;

/// LLM errors
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Generation error: {0}")]
    Generation(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout")]
    Timeout,

    #[error("Provider not found: {0}")]
    ProviderNotFound(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    /// No adapter could supply the requested capability
    #[error("No provider available for {0}")]
    ProviderUnavailable(&'static str),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout
        } else {
            LlmError::Network(err.to_string())
        }
    }
}

impl From<replica_persistence::PersistenceError> for LlmError {
    fn from(err: replica_persistence::PersistenceError) -> Self {
        LlmError::Storage(err.to_string())
    }
}
