//! Chat request handling
//!
//! Order per request: quota, cache, intent, retrieval or history,
//! generation, cache store. A quota rejection or a cache hit makes no
//! retrieval or model call.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

use replica_config::constants::FALLBACK_PROVIDER_LABEL;
use replica_core::{join_context, Intent};
use replica_llm::{Generation, LlmError};

use crate::cache::{cache_key, CacheStats};
use crate::context::AssistantContext;
use crate::fallback::fallback_reply;
use crate::history::{history_key, render};
use crate::metrics::MetricsSnapshot;
use crate::quota::{quota_key, ANONYMOUS};
use crate::AgentError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    pub query: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    /// Pin this user to a named provider
    #[serde(default)]
    pub provider: Option<String>,
}

impl ChatRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    pub intent: Intent,
    pub confidence: f32,
    pub response_time_ms: u64,
    pub sources: Vec<String>,
    pub provider: String,
    pub context_used: bool,
    #[serde(default)]
    pub cached: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub enum ChatOutcome {
    Answered(ChatResponse),
    QuotaExceeded { user_key: String, limit: u32 },
}

impl ChatOutcome {
    /// User-facing text for either outcome
    pub fn message(&self) -> String {
        match self {
            ChatOutcome::Answered(response) => response.response.clone(),
            ChatOutcome::QuotaExceeded { limit, .. } => format!(
                "You have reached the maximum of {} free queries. \
                 Please contact the site owner for more access.",
                limit
            ),
        }
    }
}

pub struct ChatService {
    ctx: Arc<AssistantContext>,
}

impl ChatService {
    pub fn new(ctx: Arc<AssistantContext>) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &Arc<AssistantContext> {
        &self.ctx
    }

    /// Answer one query
    pub async fn process(&self, request: &ChatRequest) -> Result<ChatOutcome, AgentError> {
        let started = Instant::now();
        let query = request.query.trim();
        if query.is_empty() {
            return Err(AgentError::InvalidRequest("query must not be empty".to_string()));
        }

        let user_id = request.user_id.as_deref().filter(|id| !id.is_empty());
        let session_id = request.session_id.as_deref().filter(|id| !id.is_empty());

        let user_key = quota_key(user_id, session_id);
        if !self.ctx.quota.try_acquire(&user_key).await {
            self.ctx.metrics.record_quota_rejection();
            return Ok(ChatOutcome::QuotaExceeded {
                user_key,
                limit: self.ctx.quota.limit(),
            });
        }

        let conversation = history_key(user_id, session_id);
        let key = cache_key(user_id, session_id, query);
        if let Some(mut hit) = self.ctx.cache.get(&key).await {
            self.ctx.metrics.record_cache_hit();
            tracing::info!(user_key = %user_key, "Cache hit");
            self.ctx.history.record(&conversation, query, &hit.response).await;
            hit.cached = true;
            return Ok(ChatOutcome::Answered(hit));
        }

        let intent_model = if self.ctx.intents.uses_model() {
            self.ctx.manager.chat_model()
        } else {
            None
        };
        let detected = self.ctx.intents.classify(query, intent_model).await;

        let mut turns = Vec::new();
        let mut chunks = Vec::new();
        let context = if detected.intent.needs_history() {
            turns = self.ctx.history.turns(&conversation).await;
            render(&turns)
        } else if detected.intent.needs_context() {
            chunks = self.ctx.retriever.retrieve(query, detected.intent).await;
            join_context(&chunks)
        } else {
            String::new()
        };

        let routing_user = user_id.unwrap_or(ANONYMOUS);
        let (text, provider, error) = match self
            .generate(
                detected.intent,
                routing_user,
                session_id,
                request.provider.as_deref(),
                query,
                &context,
            )
            .await
        {
            Ok(generation) => (generation.text, generation.provider, None),
            Err(e) => {
                tracing::warn!(intent = %detected.intent, error = %e, "No provider could answer, using canned reply");
                (
                    fallback_reply(detected.intent, &turns),
                    FALLBACK_PROVIDER_LABEL.to_string(),
                    Some(e.to_string()),
                )
            }
        };

        let response = ChatResponse {
            response: text,
            intent: detected.intent,
            confidence: detected.confidence,
            response_time_ms: started.elapsed().as_millis() as u64,
            sources: chunks.iter().map(|c| c.source.clone()).collect(),
            provider,
            context_used: !context.is_empty(),
            cached: false,
            error,
        };

        tracing::info!(
            user_key = %user_key,
            intent = %response.intent,
            provider = %response.provider,
            chunks = chunks.len(),
            history_turns = turns.len(),
            response_time_ms = response.response_time_ms,
            "Query answered"
        );

        if response.error.is_none() {
            self.ctx.metrics.record_success(response.response_time_ms);
            // history answers go stale as soon as the conversation moves on
            if !detected.intent.needs_history() {
                self.ctx.cache.insert(key, response.clone()).await;
            }
        } else {
            self.ctx.metrics.record_failure(response.response_time_ms);
        }
        self.ctx.history.record(&conversation, query, &response.response).await;

        Ok(ChatOutcome::Answered(response))
    }

    /// Routed provider first; on absence or failure, the manager's chain
    async fn generate(
        &self,
        intent: Intent,
        routing_user: &str,
        session_id: Option<&str>,
        requested: Option<&str>,
        query: &str,
        context: &str,
    ) -> Result<Generation, LlmError> {
        if let Some(routed) = self
            .ctx
            .router
            .chat_model_for_user(routing_user, session_id, requested)
            .await
        {
            match routed.model.generate_for(intent, query, context).await {
                Ok(text) => {
                    return Ok(Generation {
                        text,
                        provider: routed.provider,
                    })
                }
                Err(e) => {
                    tracing::warn!(provider = %routed.provider, error = %e, "Routed provider failed, using fallback chain");
                }
            }
        }

        self.ctx.manager.generate_for(intent, query, context).await
    }

    pub async fn clear_cache(&self) {
        self.ctx.cache.clear().await;
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.ctx.cache.stats().await
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.ctx.metrics.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fallback::canned_response;
    use crate::testing::{harness, FakeProvider};
    use replica_config::ChatConfig;

    fn answered(outcome: ChatOutcome) -> ChatResponse {
        match outcome {
            ChatOutcome::Answered(response) => response,
            other => panic!("expected an answer, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_repeated_query_is_served_from_cache() {
        let provider = FakeProvider::new("Alpha");
        let (service, index) = harness(&[provider.clone()], ChatConfig::default());
        let request = ChatRequest::new("What projects have you built?").with_user("u1");

        let first = answered(service.process(&request).await.unwrap());
        assert!(!first.cached);
        assert_eq!(first.provider, "Alpha");
        assert!(first.context_used);
        let index_calls = index.calls();

        let again = ChatRequest::new("  what projects have you BUILT?  ").with_user("u1");
        let second = answered(service.process(&again).await.unwrap());
        assert!(second.cached);
        assert_eq!(second.response, first.response);
        assert_eq!(provider.calls(), 1);
        assert_eq!(index.calls(), index_calls);
        assert_eq!(service.metrics().cache_hits, 1);
        assert_eq!(service.cache_stats().await.entries, 1);
    }

    #[tokio::test]
    async fn test_quota_rejection_makes_no_calls() {
        let provider = FakeProvider::new("Alpha");
        let chat = ChatConfig {
            quota_limit: 2,
            ..ChatConfig::default()
        };
        let (service, index) = harness(&[provider.clone()], chat);

        for query in ["first question", "second question"] {
            let request = ChatRequest::new(query).with_session("s1");
            answered(service.process(&request).await.unwrap());
        }
        let (provider_calls, index_calls) = (provider.calls(), index.calls());

        let outcome = service
            .process(&ChatRequest::new("third question").with_session("s1"))
            .await
            .unwrap();
        match &outcome {
            ChatOutcome::QuotaExceeded { user_key, limit } => {
                assert_eq!(user_key, "s1");
                assert_eq!(*limit, 2);
            }
            other => panic!("expected quota rejection, got {:?}", other),
        }
        assert!(outcome.message().contains("maximum of 2"));
        assert_eq!(provider.calls(), provider_calls);
        assert_eq!(index.calls(), index_calls);
        assert_eq!(service.metrics().quota_rejections, 1);
    }

    #[tokio::test]
    async fn test_total_outage_returns_canned_reply() {
        let provider = FakeProvider::new("Alpha");
        provider.set_failing(true);
        let (service, _index) = harness(&[provider], ChatConfig::default());

        let response = answered(
            service
                .process(&ChatRequest::new("Tell me about your career").with_user("u1"))
                .await
                .unwrap(),
        );
        assert_eq!(response.provider, FALLBACK_PROVIDER_LABEL);
        assert_eq!(response.response, canned_response(Intent::CareerGuidance));
        assert!(response.error.is_some());
        assert_eq!(service.metrics().failed_requests, 1);
        assert_eq!(service.cache_stats().await.entries, 0);
    }

    #[tokio::test]
    async fn test_all_providers_unavailable() {
        let alpha = FakeProvider::new("Alpha");
        let beta = FakeProvider::new("Beta");
        alpha.set_available(false);
        beta.set_available(false);
        let (service, index) = harness(&[alpha.clone(), beta.clone()], ChatConfig::default());
        let request = ChatRequest::new("Tell me about your career").with_user("u1");

        let response = answered(service.process(&request).await.unwrap());
        assert_eq!(response.provider, FALLBACK_PROVIDER_LABEL);
        assert_eq!(response.response, canned_response(Intent::CareerGuidance));
        assert!(response.error.is_some());
        assert!(!response.context_used);
        assert!(response.sources.is_empty());
        assert_eq!(index.calls(), 0);
        assert_eq!(service.cache_stats().await.entries, 0);

        let again = answered(service.process(&request).await.unwrap());
        assert!(!again.cached);
        assert_eq!(again.provider, FALLBACK_PROVIDER_LABEL);

        let metrics = service.metrics();
        assert_eq!(metrics.failed_requests, 2);
        assert_eq!(metrics.cache_hits, 0);
        assert_eq!(alpha.calls() + beta.calls(), 0);
    }

    #[tokio::test]
    async fn test_failing_embedder_falls_back_for_retrieval() {
        let alpha = FakeProvider::new("Alpha");
        let beta = FakeProvider::new("Beta");
        alpha.set_embed_failing(true);
        let (service, index) = harness(&[alpha, beta], ChatConfig::default());

        let response = answered(
            service
                .process(&ChatRequest::new("What projects have you built?").with_user("u1"))
                .await
                .unwrap(),
        );
        assert!(response.context_used);
        assert_eq!(response.sources, vec!["projects.md".to_string()]);
        assert!(index.calls() > 0);
        assert_eq!(
            service.context().manager.current_embeddings_provider().as_deref(),
            Some("Beta")
        );
    }

    #[tokio::test]
    async fn test_last_question_comes_from_history() {
        let provider = FakeProvider::new("Alpha");
        let (service, index) = harness(&[provider], ChatConfig::default());

        let first = ChatRequest::new("What projects have you built?")
            .with_user("u1")
            .with_session("s1");
        answered(service.process(&first).await.unwrap());
        let index_calls = index.calls();

        let ask = ChatRequest::new("What was my last question?")
            .with_user("u1")
            .with_session("s1");
        let response = answered(service.process(&ask).await.unwrap());
        assert_eq!(response.intent, Intent::UserLastQuestion);
        assert!(response.context_used);
        assert!(response.response.contains("What projects have you built?"));
        assert!(response.sources.is_empty());
        assert_eq!(index.calls(), index_calls);

        // not cached: the answer moves with the conversation
        let repeat = answered(service.process(&ask).await.unwrap());
        assert!(!repeat.cached);
        assert!(repeat.response.contains("User: What was my last question?"));
        assert_eq!(service.cache_stats().await.entries, 1);
    }

    #[tokio::test]
    async fn test_history_is_per_session() {
        let provider = FakeProvider::new("Alpha");
        let (service, _index) = harness(&[provider], ChatConfig::default());

        let first = ChatRequest::new("What projects have you built?")
            .with_user("u1")
            .with_session("s1");
        answered(service.process(&first).await.unwrap());

        let elsewhere = ChatRequest::new("What was my last question?")
            .with_user("u1")
            .with_session("s2");
        let response = answered(service.process(&elsewhere).await.unwrap());
        assert!(!response.context_used);
        assert!(!response.response.contains("projects"));
    }

    #[tokio::test]
    async fn test_last_question_survives_outage() {
        let provider = FakeProvider::new("Alpha");
        let (service, _index) = harness(&[provider.clone()], ChatConfig::default());

        let first = ChatRequest::new("Where did you study?").with_session("s1");
        answered(service.process(&first).await.unwrap());

        provider.set_failing(true);
        let response = answered(
            service
                .process(&ChatRequest::new("What did I just ask?").with_session("s1"))
                .await
                .unwrap(),
        );
        assert_eq!(response.provider, FALLBACK_PROVIDER_LABEL);
        assert_eq!(response.response, "Your last question was: \"Where did you study?\"");
    }

    #[tokio::test]
    async fn test_anonymous_sessions_route_separately() {
        let provider = FakeProvider::new("Alpha");
        let (service, _index) = harness(&[provider], ChatConfig::default());

        for session in ["s1", "s2"] {
            let request = ChatRequest::new("What projects have you built?").with_session(session);
            answered(service.process(&request).await.unwrap());
        }

        let router = &service.context().router;
        assert_eq!(router.stats().cache_size, 2);
        assert!(router.clear_user_cache(ANONYMOUS, Some("s1")));
        assert!(router.clear_user_cache(ANONYMOUS, Some("s2")));
        assert_eq!(service.context().quota.used("s1").await, 1);
    }

    #[tokio::test]
    async fn test_routed_failure_falls_back_to_next_provider() {
        let alpha = FakeProvider::new("Alpha");
        let beta = FakeProvider::new("Beta");
        alpha.set_failing(true);
        let (service, _index) = harness(&[alpha, beta.clone()], ChatConfig::default());

        let response = answered(
            service
                .process(&ChatRequest::new("What is your background?").with_user("u1"))
                .await
                .unwrap(),
        );
        assert_eq!(response.provider, "Beta");
        assert!(response.error.is_none());
        assert_eq!(beta.calls(), 1);
    }

    #[tokio::test]
    async fn test_requested_provider_is_used() {
        let alpha = FakeProvider::new("Alpha");
        let beta = FakeProvider::new("Beta");
        let (service, _index) = harness(&[alpha.clone(), beta], ChatConfig::default());

        let request = ChatRequest::new("hello there").with_user("u1").with_provider("Beta");
        let response = answered(service.process(&request).await.unwrap());
        assert_eq!(response.provider, "Beta");
        assert_eq!(alpha.calls(), 0);
    }

    #[tokio::test]
    async fn test_greeting_skips_retrieval() {
        let provider = FakeProvider::new("Alpha");
        let (service, index) = harness(&[provider], ChatConfig::default());

        let response = answered(service.process(&ChatRequest::new("Hello!")).await.unwrap());
        assert_eq!(response.intent, Intent::Greeting);
        assert!(!response.context_used);
        assert!(response.sources.is_empty());
        assert_eq!(index.calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_query_is_rejected_before_quota() {
        let (service, _index) = harness(&[FakeProvider::new("Alpha")], ChatConfig::default());
        let err = service.process(&ChatRequest::new("   ")).await.unwrap_err();
        assert!(matches!(err, AgentError::InvalidRequest(_)));
        assert_eq!(service.context().quota.used("anonymous").await, 0);
    }

    #[tokio::test]
    async fn test_clear_cache_forces_regeneration() {
        let provider = FakeProvider::new("Alpha");
        let (service, _index) = harness(&[provider.clone()], ChatConfig::default());
        let request = ChatRequest::new("What projects?").with_user("u1");

        answered(service.process(&request).await.unwrap());
        service.clear_cache().await;
        let response = answered(service.process(&request).await.unwrap());
        assert!(!response.cached);
        assert_eq!(provider.calls(), 2);
    }

    #[test]
    fn test_response_serializes_without_empty_error() {
        let response = crate::testing::sample_response("hi");
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["intent"], "general_rag");
        assert!(json.get("error").is_none());
    }
}
