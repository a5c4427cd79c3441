//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::constants::{chat, endpoints, retrieval};
use crate::ConfigError;

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Model provider tuning (never credentials)
    #[serde(default)]
    pub providers: ProvidersConfig,

    /// User-to-provider routing
    #[serde(default)]
    pub router: RouterConfig,

    /// Context retrieval
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Response cache and query quota
    #[serde(default)]
    pub chat: ChatConfig,

    /// Provider-mapping persistence (ScyllaDB)
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Logging
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Settings {
    /// Validate every section
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.providers.validate()?;
        self.router.validate()?;
        self.retrieval.validate()?;
        self.chat.validate()?;
        self.persistence.validate()?;
        Ok(())
    }
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        message: message.into(),
    }
}

/// Provider call tuning shared by every backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    /// Upper bound on a single outbound model call
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Persona the generated answers speak as
    #[serde(default = "default_persona")]
    pub persona: String,
}

fn default_request_timeout_secs() -> u64 {
    30
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    512
}
fn default_persona() -> String {
    "You are a personal assistant answering questions about the person whose \
     documents you can see. Answer in the first person, stay factual, and say \
     so when the context does not cover the question."
        .to_string()
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            persona: default_persona(),
        }
    }
}

impl ProvidersConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.request_timeout_secs == 0 {
            return Err(invalid("providers.request_timeout_secs", "must be positive"));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(invalid("providers.temperature", "must be within 0.0..=2.0"));
        }
        if self.max_tokens == 0 {
            return Err(invalid("providers.max_tokens", "must be positive"));
        }
        Ok(())
    }
}

/// Routing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Seconds between coarse rebalancing of user assignments
    #[serde(default = "default_rotation_interval_secs")]
    pub rotation_interval_secs: u64,

    /// Provider names eligible for routing, in preference order
    #[serde(default = "default_preference")]
    pub preference: Vec<String>,
}

fn default_rotation_interval_secs() -> u64 {
    3600
}
fn default_preference() -> Vec<String> {
    ["OpenAI", "Groq", "Together AI", "Replicate", "HuggingFace", "Ollama"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            rotation_interval_secs: default_rotation_interval_secs(),
            preference: default_preference(),
        }
    }
}

impl RouterConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rotation_interval_secs == 0 {
            return Err(invalid("router.rotation_interval_secs", "must be positive"));
        }
        if self.preference.is_empty() {
            return Err(invalid("router.preference", "at least one provider is required"));
        }
        Ok(())
    }
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Qdrant endpoint URL
    #[serde(default = "default_qdrant_endpoint")]
    pub qdrant_endpoint: String,

    #[serde(default = "default_qdrant_collection")]
    pub qdrant_collection: String,

    /// Qdrant API key (optional, for cloud deployments)
    #[serde(default)]
    pub qdrant_api_key: Option<String>,

    /// Chunks handed to generation
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Chunks gathered by namespace-scoped search before stopping
    #[serde(default = "default_target_count")]
    pub target_count: usize,

    /// Minimum similarity kept from any strategy
    #[serde(default)]
    pub min_score: f32,

    /// Ask the chat model to propose a metadata filter
    #[serde(default)]
    pub llm_filter: bool,
}

fn default_qdrant_endpoint() -> String {
    endpoints::QDRANT_DEFAULT.to_string()
}
fn default_qdrant_collection() -> String {
    retrieval::COLLECTION.to_string()
}
fn default_top_k() -> usize {
    retrieval::TOP_K
}
fn default_target_count() -> usize {
    retrieval::TARGET_COUNT
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            qdrant_endpoint: default_qdrant_endpoint(),
            qdrant_collection: default_qdrant_collection(),
            qdrant_api_key: None,
            top_k: default_top_k(),
            target_count: default_target_count(),
            min_score: 0.0,
            llm_filter: false,
        }
    }
}

impl RetrievalConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.top_k == 0 {
            return Err(invalid("retrieval.top_k", "must be positive"));
        }
        if self.target_count == 0 {
            return Err(invalid("retrieval.target_count", "must be positive"));
        }
        if !(0.0..=1.0).contains(&self.min_score) {
            return Err(invalid("retrieval.min_score", "must be within 0.0..=1.0"));
        }
        Ok(())
    }
}

/// Response cache and quota configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: u64,

    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Queries allowed per user key within the quota window
    #[serde(default = "default_quota_limit")]
    pub quota_limit: u32,

    #[serde(default = "default_quota_window_secs")]
    pub quota_window_secs: u64,

    /// Quota keys tracked at once, independent of the response cache
    #[serde(default = "default_quota_capacity")]
    pub quota_capacity: u64,

    /// Earlier turns kept per conversation for history questions
    #[serde(default = "default_history_turns")]
    pub history_turns: usize,

    #[serde(default = "default_history_capacity")]
    pub history_capacity: u64,

    /// Ask the chat model to classify intent before the keyword rules
    #[serde(default)]
    pub model_intents: bool,

    #[serde(default = "default_intent_timeout_secs")]
    pub intent_timeout_secs: u64,
}

fn default_cache_capacity() -> u64 {
    chat::CACHE_CAPACITY
}
fn default_cache_ttl_secs() -> u64 {
    chat::CACHE_TTL_SECS
}
fn default_quota_limit() -> u32 {
    chat::QUOTA_LIMIT
}
fn default_quota_window_secs() -> u64 {
    chat::QUOTA_WINDOW_SECS
}
fn default_quota_capacity() -> u64 {
    chat::QUOTA_CAPACITY
}
fn default_history_turns() -> usize {
    chat::HISTORY_TURNS
}
fn default_history_capacity() -> u64 {
    chat::HISTORY_CAPACITY
}
fn default_intent_timeout_secs() -> u64 {
    chat::INTENT_TIMEOUT_SECS
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            cache_capacity: default_cache_capacity(),
            cache_ttl_secs: default_cache_ttl_secs(),
            quota_limit: default_quota_limit(),
            quota_window_secs: default_quota_window_secs(),
            quota_capacity: default_quota_capacity(),
            history_turns: default_history_turns(),
            history_capacity: default_history_capacity(),
            model_intents: false,
            intent_timeout_secs: default_intent_timeout_secs(),
        }
    }
}

impl ChatConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_capacity == 0 {
            return Err(invalid("chat.cache_capacity", "must be positive"));
        }
        if self.cache_ttl_secs == 0 || self.quota_window_secs == 0 {
            return Err(invalid("chat", "ttl and quota window must be positive"));
        }
        if self.quota_capacity == 0 {
            return Err(invalid("chat.quota_capacity", "must be positive"));
        }
        if self.history_capacity == 0 {
            return Err(invalid("chat.history_capacity", "must be positive"));
        }
        if self.model_intents && self.intent_timeout_secs == 0 {
            return Err(invalid("chat.intent_timeout_secs", "must be positive"));
        }
        Ok(())
    }
}

/// Persistence configuration for ScyllaDB
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Enable ScyllaDB persistence (false = in-memory only)
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_scylla_hosts")]
    pub scylla_hosts: Vec<String>,

    #[serde(default = "default_scylla_keyspace")]
    pub keyspace: String,

    #[serde(default = "default_replication_factor")]
    pub replication_factor: u8,
}

fn default_scylla_hosts() -> Vec<String> {
    vec!["127.0.0.1:9042".to_string()]
}
fn default_scylla_keyspace() -> String {
    "replica".to_string()
}
fn default_replication_factor() -> u8 {
    1
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            scylla_hosts: default_scylla_hosts(),
            keyspace: default_scylla_keyspace(),
            replication_factor: default_replication_factor(),
        }
    }
}

impl PersistenceConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.enabled && self.scylla_hosts.is_empty() {
            return Err(invalid("persistence.scylla_hosts", "required when enabled"));
        }
        if self.keyspace.is_empty()
            || !self
                .keyspace
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(invalid(
                "persistence.keyspace",
                "must be non-empty alphanumeric or underscore",
            ));
        }
        Ok(())
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub log_json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
        }
    }
}

/// Load settings from `config/` and the environment
///
/// Priority: env vars > config/{env} > config/default > defaults
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    load_settings_from(Path::new("config"), env)
}

/// Load settings from an explicit configuration directory
pub fn load_settings_from(dir: &Path, env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    let default_path = dir.join("default");
    builder = builder.add_source(File::with_name(&default_path.to_string_lossy()).required(false));

    if let Some(env_name) = env {
        let env_path = dir.join(env_name);
        builder = builder.add_source(File::with_name(&env_path.to_string_lossy()).required(false));
    }

    builder = builder.add_source(
        Environment::with_prefix("REPLICA")
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("router.preference")
            .with_list_parse_key("persistence.scylla_hosts"),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;

    settings.validate()?;

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.providers.request_timeout_secs, 30);
        assert_eq!(settings.retrieval.top_k, 8);
        assert_eq!(settings.chat.quota_limit, 3);
        assert_eq!(settings.router.rotation_interval_secs, 3600);
        assert_eq!(settings.router.preference[0], "OpenAI");
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_settings_validation() {
        let mut settings = Settings::default();
        settings.retrieval.top_k = 0;
        assert!(settings.validate().is_err());

        settings.retrieval.top_k = 8;
        settings.providers.temperature = 3.5;
        assert!(settings.validate().is_err());

        settings.providers.temperature = 0.2;
        settings.persistence.keyspace = "bad-name;".to_string();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_quota_capacity_is_its_own_setting() {
        let mut settings = Settings::default();
        assert_eq!(settings.chat.quota_capacity, chat::QUOTA_CAPACITY);
        assert_ne!(settings.chat.quota_capacity, settings.chat.cache_capacity);

        settings.chat.quota_capacity = 0;
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::InvalidValue { field, .. }) if field == "chat.quota_capacity"
        ));
    }

    #[test]
    fn test_load_from_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join("default.yaml")).unwrap();
        writeln!(
            file,
            "retrieval:\n  top_k: 5\nchat:\n  quota_limit: 10\nrouter:\n  preference: [Groq, Ollama]"
        )
        .unwrap();

        let settings = load_settings_from(dir.path(), None).unwrap();
        assert_eq!(settings.retrieval.top_k, 5);
        assert_eq!(settings.chat.quota_limit, 10);
        assert_eq!(settings.router.preference, vec!["Groq", "Ollama"]);
        // untouched sections keep defaults
        assert_eq!(settings.providers.max_tokens, 512);
    }

    #[test]
    fn test_invalid_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join("default.yaml")).unwrap();
        writeln!(file, "chat:\n  cache_capacity: 0").unwrap();

        assert!(matches!(
            load_settings_from(dir.path(), None),
            Err(ConfigError::InvalidValue { .. })
        ));
    }
}
