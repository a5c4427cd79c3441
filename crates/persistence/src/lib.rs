//! Persistence for user-to-provider routing decisions
//!
//! Mappings survive process restarts so a returning user keeps the
//! provider they were first assigned. Two stores are provided:
//! - `ScyllaMappingStore` for deployments
//! - `InMemoryMappingStore` for development and tests

pub mod client;
pub mod error;
pub mod mappings;
pub mod schema;

pub use client::{ScyllaClient, ScyllaConfig};
pub use error::PersistenceError;
pub use mappings::{InMemoryMappingStore, ProviderMappingStore, ScyllaMappingStore, UserProviderMapping};

use std::sync::Arc;

/// Connect to ScyllaDB, ensure the schema, and return a mapping store
pub async fn init(config: ScyllaConfig) -> Result<ScyllaMappingStore, PersistenceError> {
    let client = ScyllaClient::connect(config).await?;
    ScyllaMappingStore::new(client).await
}

/// Build the store selected by settings, falling back to memory when
/// persistence is disabled or the cluster is unreachable
pub async fn store_from_settings(
    settings: &replica_config::PersistenceConfig,
) -> Arc<dyn ProviderMappingStore> {
    if !settings.enabled {
        return Arc::new(InMemoryMappingStore::new());
    }

    match init(ScyllaConfig::from(settings)).await {
        Ok(store) => {
            tracing::info!(
                hosts = ?settings.scylla_hosts,
                keyspace = %settings.keyspace,
                "ScyllaDB mapping store initialized"
            );
            Arc::new(store)
        }
        Err(e) => {
            tracing::warn!(error = %e, "ScyllaDB unavailable, using in-memory mapping store");
            Arc::new(InMemoryMappingStore::new())
        }
    }
}
