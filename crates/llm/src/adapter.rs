//! Provider adapters
//!
//! `ProviderAdapter` is the uniform seam the manager and router work
//! against. `BackendAdapter` implements it for the closed set of backends in
//! `ProviderKind`; every capability is resolved by an exhaustive `match`, so
//! adding a backend without wiring all four operations does not compile.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use replica_config::constants::{endpoints, env_keys, models, retrieval};
use replica_config::ProvidersConfig;
use replica_core::ProviderDescriptor;

use crate::backend::{
    BackendConfig, HuggingFaceBackend, OllamaBackend, OpenAICompatibleBackend, ReplicateBackend,
};
use crate::embeddings::{HashEmbedder, HuggingFaceEmbedder, OllamaEmbedder, OpenAIEmbedder};
use crate::model::{ChatModel, Embedder};
use crate::secrets::SecretSource;
use crate::LlmError;

/// Uniform wrapper around one external model backend
pub trait ProviderAdapter: Send + Sync {
    /// Stable identifier, used as the key for routing and status
    fn name(&self) -> &str;

    /// Whether a credential currently appears present. Re-evaluated on
    /// every call; necessary but not sufficient for a usable model.
    fn is_available(&self) -> bool;

    /// Construct a chat handle, or `None` if construction fails for any reason
    fn chat_model(&self) -> Option<Arc<dyn ChatModel>>;

    /// Construct an embedding handle, or `None` if unsupported or failing
    fn embeddings(&self) -> Option<Arc<dyn Embedder>>;

    fn descriptor(&self) -> ProviderDescriptor;
}

/// Supported backends, in fallback priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    OpenAI,
    Groq,
    TogetherAI,
    Replicate,
    HuggingFace,
    Ollama,
    LocalEmbeddings,
}

impl ProviderKind {
    pub const PRIORITY: [ProviderKind; 7] = [
        ProviderKind::OpenAI,
        ProviderKind::Groq,
        ProviderKind::TogetherAI,
        ProviderKind::Replicate,
        ProviderKind::HuggingFace,
        ProviderKind::Ollama,
        ProviderKind::LocalEmbeddings,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ProviderKind::OpenAI => "OpenAI",
            ProviderKind::Groq => "Groq",
            ProviderKind::TogetherAI => "Together AI",
            ProviderKind::Replicate => "Replicate",
            ProviderKind::HuggingFace => "HuggingFace",
            ProviderKind::Ollama => "Ollama",
            ProviderKind::LocalEmbeddings => "Local Embeddings",
        }
    }

    pub fn supports_chat(&self) -> bool {
        !matches!(self, ProviderKind::LocalEmbeddings)
    }

    pub fn supports_embeddings(&self) -> bool {
        matches!(
            self,
            ProviderKind::OpenAI
                | ProviderKind::HuggingFace
                | ProviderKind::Ollama
                | ProviderKind::LocalEmbeddings
        )
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ProviderKind {
    type Err = LlmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            "openai" => Ok(ProviderKind::OpenAI),
            "groq" => Ok(ProviderKind::Groq),
            "togetherai" | "together" => Ok(ProviderKind::TogetherAI),
            "replicate" => Ok(ProviderKind::Replicate),
            "huggingface" | "hf" => Ok(ProviderKind::HuggingFace),
            "ollama" => Ok(ProviderKind::Ollama),
            "localembeddings" | "local" => Ok(ProviderKind::LocalEmbeddings),
            _ => Err(LlmError::ProviderNotFound(s.to_string())),
        }
    }
}

/// Adapter for one of the built-in backends
pub struct BackendAdapter {
    kind: ProviderKind,
    secrets: Arc<dyn SecretSource>,
    tuning: ProvidersConfig,
}

impl BackendAdapter {
    pub fn new(kind: ProviderKind, secrets: Arc<dyn SecretSource>, tuning: ProvidersConfig) -> Self {
        Self { kind, secrets, tuning }
    }

    pub fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn setting(&self, key: &str, default: &str) -> String {
        self.secrets.get(key).unwrap_or_else(|| default.to_string())
    }

    fn credential(&self) -> Option<String> {
        match self.kind {
            ProviderKind::OpenAI => self.secrets.get(env_keys::OPENAI_API_KEY),
            ProviderKind::Groq => self.secrets.get(env_keys::GROQ_API_KEY),
            ProviderKind::TogetherAI => self.secrets.get(env_keys::TOGETHER_API_KEY),
            ProviderKind::Replicate => self.secrets.get(env_keys::REPLICATE_API_TOKEN),
            ProviderKind::HuggingFace => self.secrets.first_of(&env_keys::HUGGINGFACE_TOKENS),
            ProviderKind::Ollama | ProviderKind::LocalEmbeddings => None,
        }
    }

    fn config(&self, endpoint: &str, model: String) -> BackendConfig {
        let mut config = BackendConfig::new(endpoint, model).with_tuning(&self.tuning);
        config.api_key = self.credential();
        config
    }

    fn ollama_endpoint(&self) -> String {
        self.setting(env_keys::OLLAMA_BASE_URL, endpoints::OLLAMA_DEFAULT)
    }

    fn build_chat(&self) -> Result<Option<Arc<dyn ChatModel>>, LlmError> {
        let model: Arc<dyn ChatModel> = match self.kind {
            ProviderKind::OpenAI => Arc::new(OpenAICompatibleBackend::new(self.config(
                endpoints::OPENAI_API,
                self.setting(env_keys::OPENAI_MODEL, models::OPENAI_CHAT),
            ))?),
            ProviderKind::Groq => Arc::new(OpenAICompatibleBackend::new(self.config(
                endpoints::GROQ_API,
                self.setting(env_keys::GROQ_MODEL, models::GROQ_CHAT),
            ))?),
            ProviderKind::TogetherAI => Arc::new(OpenAICompatibleBackend::new(self.config(
                endpoints::TOGETHER_API,
                self.setting(env_keys::TOGETHER_MODEL, models::TOGETHER_CHAT),
            ))?),
            ProviderKind::Replicate => Arc::new(ReplicateBackend::new(self.config(
                endpoints::REPLICATE_API,
                self.setting(env_keys::REPLICATE_MODEL, models::REPLICATE_CHAT),
            ))?),
            ProviderKind::HuggingFace => Arc::new(HuggingFaceBackend::new(self.config(
                endpoints::HUGGINGFACE_API,
                models::HUGGINGFACE_CHAT.to_string(),
            ))?),
            ProviderKind::Ollama => Arc::new(OllamaBackend::new(self.config(
                &self.ollama_endpoint(),
                self.setting(env_keys::OLLAMA_MODEL, models::OLLAMA_CHAT),
            ))?),
            ProviderKind::LocalEmbeddings => return Ok(None),
        };
        Ok(Some(model))
    }

    fn build_embeddings(&self) -> Result<Option<Arc<dyn Embedder>>, LlmError> {
        let embedder: Arc<dyn Embedder> = match self.kind {
            ProviderKind::OpenAI => Arc::new(OpenAIEmbedder::new(self.config(
                endpoints::OPENAI_API,
                self.setting(env_keys::OPENAI_EMBEDDING_MODEL, models::OPENAI_EMBEDDING),
            ))?),
            ProviderKind::HuggingFace => Arc::new(HuggingFaceEmbedder::new(self.config(
                endpoints::HUGGINGFACE_API,
                models::HUGGINGFACE_EMBEDDING.to_string(),
            ))?),
            ProviderKind::Ollama => Arc::new(OllamaEmbedder::new(self.config(
                &self.ollama_endpoint(),
                models::OLLAMA_EMBEDDING.to_string(),
            ))?),
            ProviderKind::LocalEmbeddings => {
                Arc::new(HashEmbedder::new(retrieval::LOCAL_EMBEDDING_DIM))
            }
            ProviderKind::Groq | ProviderKind::TogetherAI | ProviderKind::Replicate => {
                return Ok(None)
            }
        };
        Ok(Some(embedder))
    }
}

impl ProviderAdapter for BackendAdapter {
    fn name(&self) -> &str {
        self.kind.name()
    }

    fn is_available(&self) -> bool {
        match self.kind {
            ProviderKind::Ollama | ProviderKind::LocalEmbeddings => true,
            _ => self.credential().is_some(),
        }
    }

    fn chat_model(&self) -> Option<Arc<dyn ChatModel>> {
        match self.build_chat() {
            Ok(model) => model,
            Err(e) => {
                tracing::warn!(provider = %self.kind, error = %e, "Chat model construction failed");
                None
            }
        }
    }

    fn embeddings(&self) -> Option<Arc<dyn Embedder>> {
        match self.build_embeddings() {
            Ok(embedder) => embedder,
            Err(e) => {
                tracing::warn!(provider = %self.kind, error = %e, "Embeddings construction failed");
                None
            }
        }
    }

    fn descriptor(&self) -> ProviderDescriptor {
        ProviderDescriptor {
            name: self.kind.name().to_string(),
            supports_chat: self.kind.supports_chat(),
            supports_embeddings: self.kind.supports_embeddings(),
        }
    }
}

/// All built-in adapters in priority order
pub fn default_adapters(
    secrets: Arc<dyn SecretSource>,
    tuning: &ProvidersConfig,
) -> Vec<Arc<dyn ProviderAdapter>> {
    ProviderKind::PRIORITY
        .iter()
        .map(|kind| {
            Arc::new(BackendAdapter::new(*kind, secrets.clone(), tuning.clone()))
                as Arc<dyn ProviderAdapter>
        })
        .collect()
}
