//! ScyllaDB session setup

use scylla::{Session, SessionBuilder};
use std::sync::Arc;
use std::time::Duration;

use crate::error::PersistenceError;
use crate::schema;

#[derive(Debug, Clone)]
pub struct ScyllaConfig {
    pub hosts: Vec<String>,
    pub keyspace: String,
    pub replication_factor: u8,
    pub connect_timeout: Duration,
}

impl Default for ScyllaConfig {
    fn default() -> Self {
        Self::from(&replica_config::PersistenceConfig::default())
    }
}

impl From<&replica_config::PersistenceConfig> for ScyllaConfig {
    fn from(settings: &replica_config::PersistenceConfig) -> Self {
        Self {
            hosts: settings.scylla_hosts.clone(),
            keyspace: settings.keyspace.clone(),
            replication_factor: settings.replication_factor,
            connect_timeout: Duration::from_secs(5),
        }
    }
}

/// Shared session bound to the mapping keyspace
#[derive(Clone)]
pub struct ScyllaClient {
    session: Arc<Session>,
    keyspace: String,
}

impl ScyllaClient {
    /// Connect, create the keyspace and tables if missing, and switch the
    /// session to the keyspace.
    pub async fn connect(config: ScyllaConfig) -> Result<Self, PersistenceError> {
        tracing::info!(hosts = ?config.hosts, keyspace = %config.keyspace, "Connecting to ScyllaDB");

        let session = SessionBuilder::new()
            .known_nodes(&config.hosts)
            .connection_timeout(config.connect_timeout)
            .build()
            .await?;

        schema::create_keyspace(&session, &config.keyspace, config.replication_factor).await?;
        schema::create_tables(&session, &config.keyspace).await?;
        session.use_keyspace(&config.keyspace, false).await?;

        Ok(Self {
            session: Arc::new(session),
            keyspace: config.keyspace,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn keyspace(&self) -> &str {
        &self.keyspace
    }
}
