//! Embedding backends

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::backend::{error_for_status, BackendConfig};
use crate::model::{with_timeout, Embedder};
use crate::LlmError;

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a str,
}

// =============================================================================
// OpenAI /v1/embeddings
// =============================================================================

#[derive(Debug, Deserialize)]
struct OpenAIEmbeddingResponse {
    data: Vec<OpenAIEmbedding>,
}

#[derive(Debug, Deserialize)]
struct OpenAIEmbedding {
    embedding: Vec<f32>,
}

pub struct OpenAIEmbedder {
    config: BackendConfig,
    client: Client,
}

impl OpenAIEmbedder {
    pub fn new(config: BackendConfig) -> Result<Self, LlmError> {
        config.require_key()?;
        let client = config.build_client()?;
        Ok(Self { config, client })
    }

    async fn execute(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let response = self
            .client
            .post(format!("{}/embeddings", self.config.base()))
            .bearer_auth(self.config.require_key()?)
            .json(&EmbedRequest {
                model: &self.config.model,
                input: text,
            })
            .send()
            .await?;

        let response: OpenAIEmbeddingResponse = error_for_status(response)
            .await?
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| LlmError::InvalidResponse("No embedding returned".to_string()))
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        with_timeout(self.config.timeout, self.execute(text)).await
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

// =============================================================================
// Ollama /api/embed
// =============================================================================

#[derive(Debug, Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

pub struct OllamaEmbedder {
    config: BackendConfig,
    client: Client,
}

impl OllamaEmbedder {
    pub fn new(config: BackendConfig) -> Result<Self, LlmError> {
        let client = config.build_client()?;
        Ok(Self { config, client })
    }

    async fn execute(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let response = self
            .client
            .post(format!("{}/api/embed", self.config.base()))
            .json(&EmbedRequest {
                model: &self.config.model,
                input: text,
            })
            .send()
            .await?;

        let response: OllamaEmbedResponse = error_for_status(response)
            .await?
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        response
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse("No embeddings in response".to_string()))
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        with_timeout(self.config.timeout, self.execute(text)).await
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

// =============================================================================
// HuggingFace feature extraction
// =============================================================================

#[derive(Debug, Serialize)]
struct HfFeatureRequest<'a> {
    inputs: &'a str,
}

/// Sentence models return one vector; token models return one per token
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum HfFeatures {
    Pooled(Vec<f32>),
    Tokens(Vec<Vec<f32>>),
}

impl HfFeatures {
    fn into_vector(self) -> Result<Vec<f32>, LlmError> {
        match self {
            HfFeatures::Pooled(v) if !v.is_empty() => Ok(v),
            HfFeatures::Tokens(rows) if !rows.is_empty() => {
                let dim = rows[0].len();
                let mut mean = vec![0.0f32; dim];
                for row in &rows {
                    for (acc, v) in mean.iter_mut().zip(row) {
                        *acc += v;
                    }
                }
                let n = rows.len() as f32;
                mean.iter_mut().for_each(|v| *v /= n);
                Ok(mean)
            }
            _ => Err(LlmError::InvalidResponse("Empty feature vector".to_string())),
        }
    }
}

pub struct HuggingFaceEmbedder {
    config: BackendConfig,
    client: Client,
}

impl HuggingFaceEmbedder {
    pub fn new(config: BackendConfig) -> Result<Self, LlmError> {
        config.require_key()?;
        let client = config.build_client()?;
        Ok(Self { config, client })
    }

    async fn execute(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let response = self
            .client
            .post(format!(
                "{}/pipeline/feature-extraction/{}",
                self.config.base(),
                self.config.model
            ))
            .bearer_auth(self.config.require_key()?)
            .json(&HfFeatureRequest { inputs: text })
            .send()
            .await?;

        let features: HfFeatures = error_for_status(response)
            .await?
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        features.into_vector()
    }
}

#[async_trait]
impl Embedder for HuggingFaceEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        with_timeout(self.config.timeout, self.execute(text)).await
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

// =============================================================================
// In-process hash embedding
// =============================================================================

/// Deterministic character-hash embedding. Needs no network and no
/// credentials, so it backs the last-resort embeddings provider.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dim: usize,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1) }
    }

    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dim];

        for (i, c) in text.to_lowercase().chars().enumerate() {
            let idx = (c as usize + i) % self.dim;
            embedding[idx] += 1.0;
        }

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut embedding {
                *v /= norm;
            }
        }

        embedding
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(replica_config::constants::retrieval::LOCAL_EMBEDDING_DIM)
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        Ok(self.embed_sync(text))
    }

    fn model_name(&self) -> &str {
        "local-hash"
    }
}
