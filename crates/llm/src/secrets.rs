//! Credential sources
//!
//! Adapters never cache whether they are configured. Every availability
//! check goes back to a `SecretSource`, so credentials added or revoked at
//! runtime are picked up on the next call.

use parking_lot::RwLock;
use std::collections::HashMap;

/// Read-through access to provider credentials
pub trait SecretSource: Send + Sync {
    /// Current value for `key`; blank values count as absent
    fn get(&self, key: &str) -> Option<String>;

    /// Refresh the underlying source
    fn reload(&self) {}

    /// First present value among `keys`
    fn first_of(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|k| self.get(k))
    }
}

/// Process environment, optionally refreshed from a `.env` file
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvSecrets;

impl SecretSource for EnvSecrets {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn reload(&self) {
        match dotenvy::dotenv_override() {
            Ok(path) => tracing::info!(path = %path.display(), "Reloaded environment file"),
            Err(e) if e.not_found() => tracing::debug!("No .env file to reload"),
            Err(e) => tracing::warn!(error = %e, "Failed to reload .env file"),
        }
    }
}

/// In-memory credentials, mutable at runtime
#[derive(Debug, Default)]
pub struct StaticSecrets {
    values: RwLock<HashMap<String, String>>,
}

impl StaticSecrets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, key: &str, value: &str) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&self, key: &str, value: &str) {
        self.values.write().insert(key.to_string(), value.to_string());
    }

    pub fn remove(&self, key: &str) {
        self.values.write().remove(key);
    }
}

impl SecretSource for StaticSecrets {
    fn get(&self, key: &str) -> Option<String> {
        self.values
            .read()
            .get(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}
