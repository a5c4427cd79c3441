//! User-to-provider mapping stores

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use scylla::prepared_statement::PreparedStatement;

use crate::client::ScyllaClient;
use crate::error::PersistenceError;
use crate::schema::MAPPINGS_TABLE;

/// Persisted routing decision for one routing key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProviderMapping {
    pub user_id: String,
    pub provider_name: String,
    pub updated_at: DateTime<Utc>,
}

impl UserProviderMapping {
    pub fn new(user_id: impl Into<String>, provider_name: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            provider_name: provider_name.into(),
            updated_at: Utc::now(),
        }
    }
}

/// Store for user-to-provider mappings
#[async_trait]
pub trait ProviderMappingStore: Send + Sync {
    async fn get(&self, user_id: &str) -> Result<Option<UserProviderMapping>, PersistenceError>;

    /// Insert or overwrite the mapping for `user_id`
    async fn set(&self, user_id: &str, provider_name: &str) -> Result<(), PersistenceError>;

    async fn delete(&self, user_id: &str) -> Result<(), PersistenceError>;
}

/// Process-local store
#[derive(Default)]
pub struct InMemoryMappingStore {
    mappings: RwLock<HashMap<String, UserProviderMapping>>,
}

impl InMemoryMappingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.mappings.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.read().is_empty()
    }
}

#[async_trait]
impl ProviderMappingStore for InMemoryMappingStore {
    async fn get(&self, user_id: &str) -> Result<Option<UserProviderMapping>, PersistenceError> {
        Ok(self.mappings.read().get(user_id).cloned())
    }

    async fn set(&self, user_id: &str, provider_name: &str) -> Result<(), PersistenceError> {
        self.mappings.write().insert(
            user_id.to_string(),
            UserProviderMapping::new(user_id, provider_name),
        );
        Ok(())
    }

    async fn delete(&self, user_id: &str) -> Result<(), PersistenceError> {
        self.mappings.write().remove(user_id);
        Ok(())
    }
}

/// ScyllaDB-backed store using prepared statements
#[derive(Clone)]
pub struct ScyllaMappingStore {
    client: ScyllaClient,
    select: PreparedStatement,
    upsert: PreparedStatement,
    delete: PreparedStatement,
}

impl ScyllaMappingStore {
    pub async fn new(client: ScyllaClient) -> Result<Self, PersistenceError> {
        let session = client.session();
        let select = session
            .prepare(format!(
                "SELECT user_id, provider_name, updated_at FROM {} WHERE user_id = ?",
                MAPPINGS_TABLE
            ))
            .await?;
        let upsert = session
            .prepare(format!(
                "INSERT INTO {} (user_id, provider_name, updated_at) VALUES (?, ?, ?)",
                MAPPINGS_TABLE
            ))
            .await?;
        let delete = session
            .prepare(format!("DELETE FROM {} WHERE user_id = ?", MAPPINGS_TABLE))
            .await?;

        Ok(Self {
            client,
            select,
            upsert,
            delete,
        })
    }
}

#[async_trait]
impl ProviderMappingStore for ScyllaMappingStore {
    async fn get(&self, user_id: &str) -> Result<Option<UserProviderMapping>, PersistenceError> {
        let result = self
            .client
            .session()
            .execute_unpaged(&self.select, (user_id,))
            .await?;

        let Some(row) = result.rows.and_then(|rows| rows.into_iter().next()) else {
            return Ok(None);
        };
        let (user_id, provider_name, updated_at): (String, String, i64) = row
            .into_typed()
            .map_err(|e| PersistenceError::InvalidData(e.to_string()))?;

        Ok(Some(UserProviderMapping {
            user_id,
            provider_name,
            updated_at: DateTime::from_timestamp_millis(updated_at).unwrap_or_else(Utc::now),
        }))
    }

    async fn set(&self, user_id: &str, provider_name: &str) -> Result<(), PersistenceError> {
        self.client
            .session()
            .execute_unpaged(
                &self.upsert,
                (user_id, provider_name, Utc::now().timestamp_millis()),
            )
            .await?;
        tracing::debug!(user_id = %user_id, provider = %provider_name, "Provider mapping persisted");
        Ok(())
    }

    async fn delete(&self, user_id: &str) -> Result<(), PersistenceError> {
        self.client
            .session()
            .execute_unpaged(&self.delete, (user_id,))
            .await?;
        Ok(())
    }
}
