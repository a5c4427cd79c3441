//! Keyspace and table DDL

use scylla::Session;

use crate::error::PersistenceError;

pub const MAPPINGS_TABLE: &str = "user_provider_mappings";

fn keyspace_ddl(keyspace: &str, replication_factor: u8) -> String {
    format!(
        "CREATE KEYSPACE IF NOT EXISTS {} WITH replication = \
         {{'class': 'SimpleStrategy', 'replication_factor': {}}}",
        keyspace, replication_factor
    )
}

// updated_at holds epoch milliseconds
fn mappings_ddl(keyspace: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {}.{} (\
         user_id TEXT PRIMARY KEY, \
         provider_name TEXT, \
         updated_at BIGINT)",
        keyspace, MAPPINGS_TABLE
    )
}

pub async fn create_keyspace(
    session: &Session,
    keyspace: &str,
    replication_factor: u8,
) -> Result<(), PersistenceError> {
    session
        .query_unpaged(keyspace_ddl(keyspace, replication_factor), &[])
        .await
        .map_err(|e| PersistenceError::SchemaError(format!("keyspace {}: {}", keyspace, e)))?;
    Ok(())
}

pub async fn create_tables(session: &Session, keyspace: &str) -> Result<(), PersistenceError> {
    session
        .query_unpaged(mappings_ddl(keyspace), &[])
        .await
        .map_err(|e| PersistenceError::SchemaError(format!("table {}: {}", MAPPINGS_TABLE, e)))?;
    tracing::info!(keyspace = %keyspace, table = MAPPINGS_TABLE, "Schema ensured");
    Ok(())
}
