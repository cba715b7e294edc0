//! ScyllaDB schema creation
//!
//! Leads are stored as one JSON document per row. `scope` and `status` are
//! denormalized next to the document so listings can be served from the
//! scope index; `version` is the compare-and-swap guard.

use crate::error::PersistenceError;
use scylla::Session;

pub async fn create_keyspace(
    session: &Session,
    keyspace: &str,
    replication_factor: u8,
) -> Result<(), PersistenceError> {
    let query = format!(
        "CREATE KEYSPACE IF NOT EXISTS {} WITH replication = {{'class': 'SimpleStrategy', 'replication_factor': {}}}",
        keyspace, replication_factor
    );

    session
        .query_unpaged(query, &[])
        .await
        .map_err(|e| PersistenceError::SchemaError(format!("Failed to create keyspace: {}", e)))?;

    Ok(())
}

pub async fn create_tables(session: &Session, keyspace: &str) -> Result<(), PersistenceError> {
    let leads_table = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {}.leads (
            lead_id TEXT,
            scope TEXT,
            status TEXT,
            version BIGINT,
            created_at BIGINT,
            updated_at BIGINT,
            record_json TEXT,
            PRIMARY KEY (lead_id)
        )
    "#,
        keyspace
    );

    session
        .query_unpaged(leads_table, &[])
        .await
        .map_err(|e| PersistenceError::SchemaError(format!("Failed to create leads table: {}", e)))?;

    let scope_index = format!(
        "CREATE INDEX IF NOT EXISTS leads_by_scope ON {}.leads (scope)",
        keyspace
    );

    session
        .query_unpaged(scope_index, &[])
        .await
        .map_err(|e| PersistenceError::SchemaError(format!("Failed to create scope index: {}", e)))?;

    tracing::info!(keyspace = %keyspace, "Lead tables created");
    Ok(())
}
