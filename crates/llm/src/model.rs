//! Model handles returned by provider adapters

use async_trait::async_trait;

use replica_core::Intent;

use crate::LlmError;

/// Callable that turns a query plus retrieved context into free text.
///
/// `context` may be empty; implementations must then tell the model that
/// the requested information may be unavailable.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Generate with the system prompt template selected by `intent`
    async fn generate_for(
        &self,
        intent: Intent,
        query: &str,
        context: &str,
    ) -> Result<String, LlmError>;

    async fn generate(&self, query: &str, context: &str) -> Result<String, LlmError> {
        self.generate_for(Intent::GeneralRag, query, context).await
    }

    fn model_name(&self) -> &str;
}

/// Maps text to a fixed-length vector
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError>;

    fn model_name(&self) -> &str;
}

/// Bound an outbound call; elapsed time is reported as `LlmError::Timeout`
pub async fn with_timeout<T, F>(timeout: std::time::Duration, fut: F) -> Result<T, LlmError>
where
    F: std::future::Future<Output = Result<T, LlmError>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(LlmError::Timeout),
    }
}
