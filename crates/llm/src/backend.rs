//! HTTP chat backends
//!
//! Each backend owns a `reqwest::Client` built with the configured timeout
//! and additionally bounds every call with `tokio::time::timeout`, so a
//! stalled connection surfaces as `LlmError::Timeout` and feeds the
//! manager's fallback chain like any other failure.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use replica_core::{Intent, Message};

use crate::model::{with_timeout, ChatModel};
use crate::prompt;
use crate::LlmError;

/// Connection and sampling settings shared by every backend
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
    /// Persona prepended to every system prompt
    pub persona: String,
}

impl BackendConfig {
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        let tuning = replica_config::ProvidersConfig::default();
        Self {
            endpoint: endpoint.into(),
            api_key: None,
            model: model.into(),
            temperature: tuning.temperature,
            max_tokens: tuning.max_tokens,
            timeout: Duration::from_secs(tuning.request_timeout_secs),
            persona: tuning.persona,
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Apply temperature, token limit, timeout and persona from settings
    pub fn with_tuning(mut self, tuning: &replica_config::ProvidersConfig) -> Self {
        self.temperature = tuning.temperature;
        self.max_tokens = tuning.max_tokens;
        self.timeout = Duration::from_secs(tuning.request_timeout_secs);
        self.persona = tuning.persona.clone();
        self
    }

    pub(crate) fn base(&self) -> &str {
        self.endpoint.trim_end_matches('/')
    }

    pub(crate) fn require_key(&self) -> Result<&str, LlmError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| LlmError::Configuration(format!("API key required for {}", self.endpoint)))
    }

    pub(crate) fn build_client(&self) -> Result<Client, LlmError> {
        Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| LlmError::Configuration(format!("Failed to create HTTP client: {}", e)))
    }
}

pub(crate) async fn error_for_status(response: reqwest::Response) -> Result<reqwest::Response, LlmError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let error_text = response.text().await.unwrap_or_default();
    if status.is_server_error() {
        Err(LlmError::Network(format!("HTTP {}: {}", status, error_text)))
    } else {
        Err(LlmError::Api(format!("HTTP {}: {}", status, error_text)))
    }
}

// =============================================================================
// OpenAI-compatible chat completions (OpenAI, Groq, Together AI)
// =============================================================================

#[derive(Debug, Serialize)]
struct OpenAIChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct OpenAIChatResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Chat backend for any API speaking the OpenAI chat-completions dialect
pub struct OpenAICompatibleBackend {
    config: BackendConfig,
    client: Client,
}

impl OpenAICompatibleBackend {
    pub fn new(config: BackendConfig) -> Result<Self, LlmError> {
        config.require_key()?;
        let client = config.build_client()?;
        Ok(Self { config, client })
    }

    pub fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.config.base())
    }

    async fn execute(&self, messages: &[Message]) -> Result<String, LlmError> {
        let request = OpenAIChatRequest {
            model: &self.config.model,
            messages,
            max_tokens: Some(self.config.max_tokens),
            temperature: Some(self.config.temperature),
            stream: false,
        };

        let response = self
            .client
            .post(self.chat_url())
            .bearer_auth(self.config.require_key()?)
            .json(&request)
            .send()
            .await?;

        let response: OpenAIChatResponse = error_for_status(response)
            .await?
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LlmError::InvalidResponse("No choices in response".to_string()))
    }
}

#[async_trait]
impl ChatModel for OpenAICompatibleBackend {
    async fn generate_for(
        &self,
        intent: Intent,
        query: &str,
        context: &str,
    ) -> Result<String, LlmError> {
        let messages = prompt::build_messages(&self.config.persona, intent, query, context);
        with_timeout(self.config.timeout, self.execute(&messages)).await
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

// =============================================================================
// Ollama
// =============================================================================

#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: OllamaMessage,
}

#[derive(Debug, Deserialize)]
struct OllamaMessage {
    content: String,
}

/// Self-hosted Ollama server, no credential required
pub struct OllamaBackend {
    config: BackendConfig,
    client: Client,
}

impl OllamaBackend {
    pub fn new(config: BackendConfig) -> Result<Self, LlmError> {
        let client = config.build_client()?;
        Ok(Self { config, client })
    }

    async fn execute(&self, messages: &[Message]) -> Result<String, LlmError> {
        let request = OllamaChatRequest {
            model: &self.config.model,
            messages,
            stream: false,
            options: OllamaOptions {
                temperature: self.config.temperature,
                num_predict: self.config.max_tokens,
            },
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.config.base()))
            .json(&request)
            .send()
            .await?;

        let response: OllamaChatResponse = error_for_status(response)
            .await?
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        Ok(response.message.content)
    }
}

#[async_trait]
impl ChatModel for OllamaBackend {
    async fn generate_for(
        &self,
        intent: Intent,
        query: &str,
        context: &str,
    ) -> Result<String, LlmError> {
        let messages = prompt::build_messages(&self.config.persona, intent, query, context);
        with_timeout(self.config.timeout, self.execute(&messages)).await
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

// =============================================================================
// HuggingFace inference API
// =============================================================================

#[derive(Debug, Serialize)]
struct HfGenerationRequest {
    inputs: String,
    parameters: HfParameters,
}

#[derive(Debug, Serialize)]
struct HfParameters {
    temperature: f32,
    max_new_tokens: u32,
    return_full_text: bool,
}

#[derive(Debug, Deserialize)]
struct HfGeneration {
    generated_text: String,
}

/// Text-generation endpoint of the HuggingFace inference API
pub struct HuggingFaceBackend {
    config: BackendConfig,
    client: Client,
}

impl HuggingFaceBackend {
    pub fn new(config: BackendConfig) -> Result<Self, LlmError> {
        config.require_key()?;
        let client = config.build_client()?;
        Ok(Self { config, client })
    }

    pub fn model_url(&self) -> String {
        format!("{}/models/{}", self.config.base(), self.config.model)
    }

    async fn execute(&self, prompt: String) -> Result<String, LlmError> {
        let request = HfGenerationRequest {
            inputs: prompt,
            parameters: HfParameters {
                temperature: self.config.temperature,
                max_new_tokens: self.config.max_tokens,
                return_full_text: false,
            },
        };

        let response = self
            .client
            .post(self.model_url())
            .bearer_auth(self.config.require_key()?)
            .json(&request)
            .send()
            .await?;

        let generations: Vec<HfGeneration> = error_for_status(response)
            .await?
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        generations
            .into_iter()
            .next()
            .map(|g| g.generated_text.trim().to_string())
            .ok_or_else(|| LlmError::InvalidResponse("Empty generation list".to_string()))
    }
}

#[async_trait]
impl ChatModel for HuggingFaceBackend {
    async fn generate_for(
        &self,
        intent: Intent,
        query: &str,
        context: &str,
    ) -> Result<String, LlmError> {
        let messages = prompt::build_messages(&self.config.persona, intent, query, context);
        let prompt = prompt::flatten(&messages);
        with_timeout(self.config.timeout, self.execute(prompt)).await
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

// =============================================================================
// Replicate predictions API
// =============================================================================

#[derive(Debug, Serialize)]
struct ReplicateRequest {
    input: ReplicateInput,
}

#[derive(Debug, Serialize)]
struct ReplicateInput {
    prompt: String,
    system_prompt: String,
    temperature: f32,
    max_new_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ReplicatePrediction {
    status: String,
    #[serde(default)]
    output: Option<ReplicateOutput>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ReplicateOutput {
    Tokens(Vec<String>),
    Text(String),
}

/// Replicate-hosted model, invoked synchronously with `Prefer: wait`
pub struct ReplicateBackend {
    config: BackendConfig,
    client: Client,
}

impl ReplicateBackend {
    pub fn new(config: BackendConfig) -> Result<Self, LlmError> {
        config.require_key()?;
        if !config.model.contains('/') {
            return Err(LlmError::Configuration(format!(
                "Replicate model must be owner/name, got {}",
                config.model
            )));
        }
        let client = config.build_client()?;
        Ok(Self { config, client })
    }

    pub fn predictions_url(&self) -> String {
        format!("{}/models/{}/predictions", self.config.base(), self.config.model)
    }

    async fn execute(&self, system_prompt: String, query: &str) -> Result<String, LlmError> {
        let request = ReplicateRequest {
            input: ReplicateInput {
                prompt: query.to_string(),
                system_prompt,
                temperature: self.config.temperature,
                max_new_tokens: self.config.max_tokens,
            },
        };

        let response = self
            .client
            .post(self.predictions_url())
            .bearer_auth(self.config.require_key()?)
            .header("Prefer", "wait")
            .json(&request)
            .send()
            .await?;

        let prediction: ReplicatePrediction = error_for_status(response)
            .await?
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        if prediction.status != "succeeded" {
            return Err(LlmError::Generation(format!(
                "Prediction {}: {}",
                prediction.status,
                prediction.error.map(|e| e.to_string()).unwrap_or_default()
            )));
        }

        match prediction.output {
            Some(ReplicateOutput::Tokens(tokens)) => Ok(tokens.concat()),
            Some(ReplicateOutput::Text(text)) => Ok(text),
            None => Err(LlmError::InvalidResponse("Prediction has no output".to_string())),
        }
    }
}

#[async_trait]
impl ChatModel for ReplicateBackend {
    async fn generate_for(
        &self,
        intent: Intent,
        query: &str,
        context: &str,
    ) -> Result<String, LlmError> {
        let system = prompt::system_prompt(&self.config.persona, intent, context);
        with_timeout(self.config.timeout, self.execute(system, query)).await
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use replica_config::constants::endpoints;

    #[test]
    fn test_openai_requires_key() {
        let config = BackendConfig::new(endpoints::OPENAI_API, "gpt-3.5-turbo");
        assert!(matches!(
            OpenAICompatibleBackend::new(config),
            Err(LlmError::Configuration(_))
        ));
    }

    #[test]
    fn test_openai_compatible_urls() {
        let groq = OpenAICompatibleBackend::new(
            BackendConfig::new(format!("{}/", endpoints::GROQ_API), "llama3-8b-8192").with_api_key("k"),
        )
        .unwrap();
        assert_eq!(groq.chat_url(), "https://api.groq.com/openai/v1/chat/completions");
        assert_eq!(groq.model_name(), "llama3-8b-8192");
    }

    #[test]
    fn test_ollama_needs_no_key() {
        let backend = OllamaBackend::new(BackendConfig::new(endpoints::OLLAMA_DEFAULT, "llama2"));
        assert!(backend.is_ok());
    }

    #[test]
    fn test_replicate_model_format() {
        let bad = BackendConfig::new(endpoints::REPLICATE_API, "llama").with_api_key("r8");
        assert!(ReplicateBackend::new(bad).is_err());

        let good = BackendConfig::new(endpoints::REPLICATE_API, "meta/llama-2-7b-chat").with_api_key("r8");
        let backend = ReplicateBackend::new(good).unwrap();
        assert_eq!(
            backend.predictions_url(),
            "https://api.replicate.com/v1/models/meta/llama-2-7b-chat/predictions"
        );
    }

    #[test]
    fn test_huggingface_url() {
        let config = BackendConfig::new(endpoints::HUGGINGFACE_API, "microsoft/DialoGPT-large").with_api_key("hf");
        let backend = HuggingFaceBackend::new(config).unwrap();
        assert_eq!(
            backend.model_url(),
            "https://api-inference.huggingface.co/models/microsoft/DialoGPT-large"
        );
    }

    #[test]
    fn test_replicate_output_shapes() {
        let tokens: ReplicatePrediction =
            serde_json::from_str(r#"{"status":"succeeded","output":["Hel","lo"]}"#).unwrap();
        assert!(matches!(tokens.output, Some(ReplicateOutput::Tokens(ref t)) if t.concat() == "Hello"));

        let text: ReplicatePrediction =
            serde_json::from_str(r#"{"status":"succeeded","output":"Hello"}"#).unwrap();
        assert!(matches!(text.output, Some(ReplicateOutput::Text(_))));
    }

    #[tokio::test]
    async fn test_unreachable_ollama_is_error() {
        let mut config = BackendConfig::new("http://127.0.0.1:9", "llama2");
        config.timeout = Duration::from_millis(500);
        let backend = OllamaBackend::new(config).unwrap();
        assert!(backend.generate("hi", "").await.is_err());
    }
}
