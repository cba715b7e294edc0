//! ScyllaDB lead store
//!
//! Writes are lightweight transactions: inserts use `IF NOT EXISTS` and
//! updates are conditioned on the stored `version`, so the store gives the
//! same compare-and-swap guarantee as the in-memory backend across
//! processes.

use async_trait::async_trait;
use chrono::Utc;
use leadflow_core::{Error, LeadRecord, LeadStatus, LeadStore, Result, Versioned};
use scylla::frame::response::result::Row;
use scylla::QueryResult;

use crate::client::ScyllaClient;
use crate::error::PersistenceError;

#[derive(Clone)]
pub struct ScyllaLeadStore {
    client: ScyllaClient,
}

/// One row of a scope scan
struct ScopeRow {
    lead_id: String,
    created_at: i64,
    record_json: String,
}

impl ScyllaLeadStore {
    pub fn new(client: ScyllaClient) -> Self {
        Self { client }
    }

    async fn fetch(&self, lead_id: &str) -> std::result::Result<Option<Versioned<LeadRecord>>, PersistenceError> {
        let query = format!(
            "SELECT record_json, version FROM {}.leads WHERE lead_id = ?",
            self.client.keyspace()
        );

        let result = self.client.session().query_unpaged(query, (lead_id,)).await?;

        if let Some(rows) = result.rows {
            if let Some(row) = rows.into_iter().next() {
                let (record_json, version): (String, i64) = row
                    .into_typed()
                    .map_err(|e| PersistenceError::InvalidData(e.to_string()))?;
                let value: LeadRecord = serde_json::from_str(&record_json)?;
                return Ok(Some(Versioned {
                    value,
                    version: version_from_db(version)?,
                }));
            }
        }

        Ok(None)
    }

    /// All rows of `scope` with a status in `statuses`, oldest first
    async fn scan_scope(
        &self,
        scope: &str,
        statuses: &[LeadStatus],
    ) -> std::result::Result<Vec<ScopeRow>, PersistenceError> {
        let query = format!(
            "SELECT lead_id, status, created_at, record_json FROM {}.leads WHERE scope = ?",
            self.client.keyspace()
        );

        let result = self.client.session().query_unpaged(query, (scope,)).await?;

        let mut rows = Vec::new();
        for row in result.rows.unwrap_or_default() {
            let (lead_id, status, created_at, record_json): (String, String, i64, String) = row
                .into_typed()
                .map_err(|e| PersistenceError::InvalidData(e.to_string()))?;
            if LeadStatus::parse(&status).is_some_and(|s| statuses.contains(&s)) {
                rows.push(ScopeRow {
                    lead_id,
                    created_at,
                    record_json,
                });
            }
        }

        // secondary index scans come back in token order
        rows.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.lead_id.cmp(&b.lead_id))
        });
        Ok(rows)
    }

    async fn insert_row(&self, lead: &LeadRecord) -> std::result::Result<bool, PersistenceError> {
        let query = format!(
            "INSERT INTO {}.leads (
                lead_id, scope, status, version, created_at, updated_at, record_json
            ) VALUES (?, ?, ?, ?, ?, ?, ?) IF NOT EXISTS",
            self.client.keyspace()
        );

        let record_json = serde_json::to_string(lead)?;
        let result = self
            .client
            .session()
            .query_unpaged(
                query,
                (
                    &lead.id,
                    &lead.scope,
                    lead.status.as_str(),
                    1_i64,
                    lead.created_at.timestamp_millis(),
                    lead.updated_at.timestamp_millis(),
                    record_json,
                ),
            )
            .await?;

        applied(result)
    }

    async fn swap_row(
        &self,
        lead: &LeadRecord,
        expected_version: u64,
    ) -> std::result::Result<Option<u64>, PersistenceError> {
        let query = format!(
            "UPDATE {}.leads SET status = ?, version = ?, updated_at = ?, record_json = ?
             WHERE lead_id = ? IF version = ?",
            self.client.keyspace()
        );

        let next_version = expected_version + 1;
        let record_json = serde_json::to_string(lead)?;
        let result = self
            .client
            .session()
            .query_unpaged(
                query,
                (
                    lead.status.as_str(),
                    version_to_db(next_version)?,
                    Utc::now().timestamp_millis(),
                    record_json,
                    &lead.id,
                    version_to_db(expected_version)?,
                ),
            )
            .await?;

        Ok(applied(result)?.then_some(next_version))
    }
}

/// Read the `[applied]` column of a lightweight transaction result
fn applied(result: QueryResult) -> std::result::Result<bool, PersistenceError> {
    result
        .rows
        .and_then(|rows| rows.into_iter().next())
        .and_then(|row: Row| row.columns.into_iter().next().flatten())
        .and_then(|value| value.as_boolean())
        .ok_or_else(|| PersistenceError::InvalidData("missing [applied] column".to_string()))
}

fn version_from_db(version: i64) -> std::result::Result<u64, PersistenceError> {
    u64::try_from(version).map_err(|_| PersistenceError::InvalidData(format!("negative version {}", version)))
}

fn version_to_db(version: u64) -> std::result::Result<i64, PersistenceError> {
    i64::try_from(version).map_err(|_| PersistenceError::InvalidData(format!("version {} out of range", version)))
}

#[async_trait]
impl LeadStore for ScyllaLeadStore {
    async fn get(&self, lead_id: &str) -> Result<Option<Versioned<LeadRecord>>> {
        Ok(self.fetch(lead_id).await?)
    }

    async fn count_by_status(&self, scope: &str, statuses: &[LeadStatus]) -> Result<u64> {
        Ok(self.scan_scope(scope, statuses).await?.len() as u64)
    }

    async fn list_by_status(
        &self,
        scope: &str,
        statuses: &[LeadStatus],
        limit: usize,
    ) -> Result<Vec<LeadRecord>> {
        let rows = self.scan_scope(scope, statuses).await?;

        rows.into_iter()
            .take(limit)
            .map(|row| {
                serde_json::from_str(&row.record_json).map_err(|e| {
                    Error::from(PersistenceError::InvalidData(format!(
                        "lead {}: {}",
                        row.lead_id, e
                    )))
                })
            })
            .collect()
    }

    async fn insert(&self, lead: LeadRecord) -> Result<()> {
        lead.validate()?;
        if !self.insert_row(&lead).await? {
            return Err(Error::validation(format!("lead {} already exists", lead.id)));
        }
        tracing::debug!(lead_id = %lead.id, scope = %lead.scope, "Lead inserted into ScyllaDB");
        Ok(())
    }

    async fn compare_and_swap(
        &self,
        lead: &LeadRecord,
        expected_version: u64,
    ) -> Result<Option<u64>> {
        Ok(self.swap_row(lead, expected_version).await?)
    }

    fn backend(&self) -> &'static str {
        "scylla"
    }
}
