//! Chat orchestration for the personal assistant
//!
//! Features:
//! - Keyword intent detection, optionally preceded by model classification
//! - Per-conversation history for questions about the conversation
//! - Per-user query quota
//! - Response cache keyed by user, session and normalized query
//! - Routed generation with manager fallback and canned replies
//! - Request metrics

pub mod cache;
pub mod context;
pub mod fallback;
pub mod history;
pub mod intent;
pub mod metrics;
pub mod quota;
pub mod service;

#[cfg(test)]
mod testing;

pub use cache::{cache_key, CacheStats, ResponseCache};
pub use context::AssistantContext;
pub use fallback::{canned_response, fallback_reply};
pub use history::{history_key, ConversationHistory, Turn};
pub use intent::{DetectedIntent, IntentDetector};
pub use metrics::{ChatMetrics, MetricsSnapshot};
pub use quota::{quota_key, QuotaLimiter, ANONYMOUS};
pub use service::{ChatOutcome, ChatRequest, ChatResponse, ChatService};

use thiserror::Error;

/// Agent errors
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("LLM error: {0}")]
    Llm(String),
}

impl From<replica_llm::LlmError> for AgentError {
    fn from(err: replica_llm::LlmError) -> Self {
        AgentError::Llm(err.to_string())
    }
}

impl From<replica_rag::RagError> for AgentError {
    fn from(err: replica_rag::RagError) -> Self {
        AgentError::VectorStore(err.to_string())
    }
}

impl From<replica_config::ConfigError> for AgentError {
    fn from(err: replica_config::ConfigError) -> Self {
        AgentError::Config(err.to_string())
    }
}
