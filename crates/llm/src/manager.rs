//! Provider manager
//!
//! Owns the priority-ordered adapter list and tracks the current chat and
//! embeddings selections independently. On failure of the current adapter
//! the chain is walked forward from the failed index, then once more over
//! every adapter, before the capability is reported unavailable.

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;

use replica_core::Intent;

use crate::adapter::ProviderAdapter;
use crate::model::{ChatModel, Embedder};
use crate::secrets::SecretSource;
use crate::LlmError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Capability {
    Chat,
    Embeddings,
}

impl Capability {
    fn label(&self) -> &'static str {
        match self {
            Capability::Chat => "chat",
            Capability::Embeddings => "embeddings",
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Selection {
    chat: Option<usize>,
    embeddings: Option<usize>,
}

impl Selection {
    fn slot(&mut self, capability: Capability) -> &mut Option<usize> {
        match capability {
            Capability::Chat => &mut self.chat,
            Capability::Embeddings => &mut self.embeddings,
        }
    }
}

/// Per-adapter health snapshot
#[derive(Debug, Clone, Serialize)]
pub struct AdapterStatus {
    pub name: String,
    pub available: bool,
    pub has_chat_model: bool,
    pub has_embeddings: bool,
}

/// Diagnostic view of the whole pool
#[derive(Debug, Clone, Serialize)]
pub struct ProviderStatus {
    pub providers: Vec<AdapterStatus>,
    pub current_chat: Option<String>,
    pub current_embeddings: Option<String>,
}

/// Text produced by a named provider
#[derive(Debug, Clone)]
pub struct Generation {
    pub text: String,
    pub provider: String,
}

pub struct ProviderManager {
    adapters: Vec<Arc<dyn ProviderAdapter>>,
    secrets: Option<Arc<dyn SecretSource>>,
    selection: Mutex<Selection>,
}

impl ProviderManager {
    /// Build the manager and run the initial selection scan
    pub fn new(adapters: Vec<Arc<dyn ProviderAdapter>>) -> Self {
        let manager = Self {
            adapters,
            secrets: None,
            selection: Mutex::new(Selection::default()),
        };
        manager.initialize();
        manager
    }

    /// Attach the credential source refreshed by `reinitialize`
    pub fn with_secrets(mut self, secrets: Arc<dyn SecretSource>) -> Self {
        self.secrets = Some(secrets);
        self
    }

    pub fn adapters(&self) -> &[Arc<dyn ProviderAdapter>] {
        &self.adapters
    }

    pub fn adapter(&self, name: &str) -> Option<Arc<dyn ProviderAdapter>> {
        self.adapters.iter().find(|a| a.name() == name).cloned()
    }

    fn initialize(&self) {
        let chat = self.scan(0..self.adapters.len(), |a| a.chat_model().map(|_| ()));
        let embeddings = self.scan(0..self.adapters.len(), |a| a.embeddings().map(|_| ()));

        *self.selection.lock() = Selection {
            chat: chat.map(|(i, _)| i),
            embeddings: embeddings.map(|(i, _)| i),
        };

        match chat {
            Some((i, _)) => tracing::info!(provider = %self.adapters[i].name(), "Chat provider selected"),
            None => tracing::warn!("No chat provider available"),
        }
        match embeddings {
            Some((i, _)) => {
                tracing::info!(provider = %self.adapters[i].name(), "Embeddings provider selected")
            }
            None => tracing::warn!("No embeddings provider available"),
        }
    }

    /// Reload credentials and rerun selection from scratch
    pub fn reinitialize(&self) {
        if let Some(secrets) = &self.secrets {
            secrets.reload();
        }
        *self.selection.lock() = Selection::default();
        self.initialize();
    }

    /// First adapter in `range` that is available and yields a handle
    fn scan<T>(
        &self,
        range: std::ops::Range<usize>,
        get: impl Fn(&dyn ProviderAdapter) -> Option<T>,
    ) -> Option<(usize, T)> {
        for idx in range {
            let adapter = &self.adapters[idx];
            if !adapter.is_available() {
                continue;
            }
            if let Some(handle) = get(adapter.as_ref()) {
                return Some((idx, handle));
            }
        }
        None
    }

    /// Current handle if healthy, otherwise forward then wraparound fallback
    fn resolve<T>(
        &self,
        capability: Capability,
        get: impl Fn(&dyn ProviderAdapter) -> Option<T>,
    ) -> Option<(usize, T)> {
        let current = *self.selection.lock().slot(capability);

        let after = match current {
            Some(idx) => {
                let adapter = &self.adapters[idx];
                if adapter.is_available() {
                    if let Some(handle) = get(adapter.as_ref()) {
                        return Some((idx, handle));
                    }
                }
                tracing::warn!(
                    provider = %adapter.name(),
                    capability = capability.label(),
                    "Current provider failed, falling back"
                );
                Some(idx)
            }
            None => None,
        };

        self.fallback(capability, after, get)
    }

    fn fallback<T>(
        &self,
        capability: Capability,
        after: Option<usize>,
        get: impl Fn(&dyn ProviderAdapter) -> Option<T>,
    ) -> Option<(usize, T)> {
        *self.selection.lock().slot(capability) = None;

        let start = after.map(|i| i + 1).unwrap_or(0);
        let mut found = self.scan(start..self.adapters.len(), &get);
        if found.is_none() && start > 0 {
            tracing::warn!(capability = capability.label(), "Emergency fallback over all providers");
            found = self.scan(0..self.adapters.len(), &get);
        }

        match &found {
            Some((idx, _)) => {
                *self.selection.lock().slot(capability) = Some(*idx);
                tracing::info!(
                    provider = %self.adapters[*idx].name(),
                    capability = capability.label(),
                    "Switched provider"
                );
            }
            None => tracing::error!(capability = capability.label(), "All providers failed"),
        }
        found
    }

    /// Chat handle from the current provider or the fallback chain
    pub fn chat_model(&self) -> Option<Arc<dyn ChatModel>> {
        self.resolve(Capability::Chat, |a| a.chat_model()).map(|(_, m)| m)
    }

    /// Like `chat_model` but reports absence as `ProviderUnavailable`
    pub fn require_chat_model(&self) -> Result<Arc<dyn ChatModel>, LlmError> {
        self.chat_model()
            .ok_or(LlmError::ProviderUnavailable(Capability::Chat.label()))
    }

    pub fn embeddings(&self) -> Option<Arc<dyn Embedder>> {
        self.resolve(Capability::Embeddings, |a| a.embeddings()).map(|(_, e)| e)
    }

    pub fn require_embeddings(&self) -> Result<Arc<dyn Embedder>, LlmError> {
        self.embeddings()
            .ok_or(LlmError::ProviderUnavailable(Capability::Embeddings.label()))
    }

    /// Generate with call-time fallback: a failed or timed-out call advances
    /// the chain past the failing adapter, at most once per adapter.
    pub async fn generate_for(
        &self,
        intent: Intent,
        query: &str,
        context: &str,
    ) -> Result<Generation, LlmError> {
        let mut next = self.resolve(Capability::Chat, |a| a.chat_model());

        for _ in 0..self.adapters.len() {
            let Some((idx, model)) = next else { break };
            let provider = self.adapters[idx].name().to_string();

            match model.generate_for(intent, query, context).await {
                Ok(text) => return Ok(Generation { text, provider }),
                Err(e) => {
                    tracing::warn!(provider = %provider, error = %e, "Generation failed, falling back");
                    next = self.fallback(Capability::Chat, Some(idx), |a| a.chat_model());
                }
            }
        }

        Err(LlmError::ProviderUnavailable(Capability::Chat.label()))
    }

    pub async fn generate(&self, query: &str, context: &str) -> Result<Generation, LlmError> {
        self.generate_for(Intent::GeneralRag, query, context).await
    }

    /// Embed with the same call-time fallback as generation
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let mut next = self.resolve(Capability::Embeddings, |a| a.embeddings());

        for _ in 0..self.adapters.len() {
            let Some((idx, embedder)) = next else { break };

            match embedder.embed(text).await {
                Ok(vector) => return Ok(vector),
                Err(e) => {
                    tracing::warn!(
                        provider = %self.adapters[idx].name(),
                        error = %e,
                        "Embedding failed, falling back"
                    );
                    next = self.fallback(Capability::Embeddings, Some(idx), |a| a.embeddings());
                }
            }
        }

        Err(LlmError::ProviderUnavailable(Capability::Embeddings.label()))
    }

    pub fn current_chat_provider(&self) -> Option<String> {
        self.selection
            .lock()
            .chat
            .map(|i| self.adapters[i].name().to_string())
    }

    pub fn current_embeddings_provider(&self) -> Option<String> {
        self.selection
            .lock()
            .embeddings
            .map(|i| self.adapters[i].name().to_string())
    }

    /// Names of adapters whose credentials are currently present
    pub fn available_providers(&self) -> Vec<String> {
        self.adapters
            .iter()
            .filter(|a| a.is_available())
            .map(|a| a.name().to_string())
            .collect()
    }

    /// Health of every adapter. Constructs each model, so keep it off the hot path.
    pub fn status(&self) -> ProviderStatus {
        let providers = self
            .adapters
            .iter()
            .map(|a| {
                let available = a.is_available();
                AdapterStatus {
                    name: a.name().to_string(),
                    available,
                    has_chat_model: available && a.chat_model().is_some(),
                    has_embeddings: available && a.embeddings().is_some(),
                }
            })
            .collect();

        ProviderStatus {
            providers,
            current_chat: self.current_chat_provider(),
            current_embeddings: self.current_embeddings_provider(),
        }
    }
}
