//! Centralized constants for the replica assistant
//!
//! Endpoint URLs, default model names and credential variable names live
//! here so adapters, settings and tests agree on one value.

/// Label reported as the provider when no model could answer
pub const FALLBACK_PROVIDER_LABEL: &str = "Intent-based fallback";

/// Service endpoints
pub mod endpoints {
    pub const OPENAI_API: &str = "https://api.openai.com/v1";
    pub const GROQ_API: &str = "https://api.groq.com/openai/v1";
    pub const TOGETHER_API: &str = "https://api.together.xyz/v1";
    pub const REPLICATE_API: &str = "https://api.replicate.com/v1";
    pub const HUGGINGFACE_API: &str = "https://api-inference.huggingface.co";
    pub const OLLAMA_DEFAULT: &str = "http://localhost:11434";
    pub const QDRANT_DEFAULT: &str = "http://localhost:6334";
}

/// Default model identifiers
pub mod models {
    pub const OPENAI_CHAT: &str = "gpt-3.5-turbo";
    pub const OPENAI_EMBEDDING: &str = "text-embedding-3-small";
    pub const GROQ_CHAT: &str = "llama3-8b-8192";
    pub const TOGETHER_CHAT: &str = "meta-llama/Llama-2-7b-chat-hf";
    pub const REPLICATE_CHAT: &str = "meta/llama-2-7b-chat";
    pub const HUGGINGFACE_CHAT: &str = "microsoft/DialoGPT-large";
    pub const HUGGINGFACE_EMBEDDING: &str = "sentence-transformers/all-MiniLM-L6-v2";
    pub const OLLAMA_CHAT: &str = "llama2";
    pub const OLLAMA_EMBEDDING: &str = "nomic-embed-text";
}

/// Environment variable names read by provider adapters
pub mod env_keys {
    pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";
    pub const OPENAI_MODEL: &str = "OPENAI_MODEL_NAME";
    pub const OPENAI_EMBEDDING_MODEL: &str = "OPENAI_API_EMBEDDING_MODEL";
    pub const GROQ_API_KEY: &str = "GROQ_API_KEY";
    pub const GROQ_MODEL: &str = "GROQ_MODEL";
    pub const TOGETHER_API_KEY: &str = "TOGETHER_API_KEY";
    pub const TOGETHER_MODEL: &str = "TOGETHER_MODEL";
    pub const REPLICATE_API_TOKEN: &str = "REPLICATE_API_TOKEN";
    pub const REPLICATE_MODEL: &str = "REPLICATE_MODEL";
    pub const HUGGINGFACE_TOKENS: [&str; 2] = ["HUGGINGFACEHUB_API_TOKEN", "HUGGINGFACE_API_KEY"];
    pub const OLLAMA_BASE_URL: &str = "OLLAMA_BASE_URL";
    pub const OLLAMA_MODEL: &str = "OLLAMA_MODEL";
}

/// Retrieval defaults
pub mod retrieval {
    pub const TOP_K: usize = 8;
    pub const TARGET_COUNT: usize = 8;
    pub const LOCAL_EMBEDDING_DIM: usize = 384;
    pub const COLLECTION: &str = "replica_corpus";
}

/// Chat service defaults
pub mod chat {
    pub const QUOTA_LIMIT: u32 = 3;
    pub const CACHE_CAPACITY: u64 = 10_000;
    pub const CACHE_TTL_SECS: u64 = 24 * 60 * 60;
    pub const QUOTA_WINDOW_SECS: u64 = 7 * 24 * 60 * 60;
    /// Tracked quota keys; an evicted key starts counting from zero again
    pub const QUOTA_CAPACITY: u64 = 100_000;
    /// Turns kept per conversation
    pub const HISTORY_TURNS: usize = 10;
    pub const HISTORY_CAPACITY: u64 = 10_000;
    pub const INTENT_TIMEOUT_SECS: u64 = 10;
    pub const INTENT_ATTEMPTS: u32 = 3;
}
