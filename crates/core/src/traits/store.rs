//! Record store abstraction
//!
//! The pipeline never talks to a database directly. Backends implement
//! [`LeadStore`]; every write goes through a version-checked
//! compare-and-swap so concurrent workers cannot lose each other's ledger
//! updates.

use async_trait::async_trait;

use crate::lead::{LeadRecord, LeadStatus};
use crate::{Error, Result};

/// A stored value with its optimistic-concurrency version
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    pub value: T,
    pub version: u64,
}

#[async_trait]
pub trait LeadStore: Send + Sync {
    /// Fetch a single lead with its current version
    async fn get(&self, lead_id: &str) -> Result<Option<Versioned<LeadRecord>>>;

    /// Count leads in `scope` whose status is one of `statuses`
    async fn count_by_status(&self, scope: &str, statuses: &[LeadStatus]) -> Result<u64>;

    /// List leads in `scope` whose status is one of `statuses`, in the
    /// store's stable order, at most `limit` of them
    async fn list_by_status(
        &self,
        scope: &str,
        statuses: &[LeadStatus],
        limit: usize,
    ) -> Result<Vec<LeadRecord>>;

    /// Insert a new lead at version 1. Fails if the id already exists.
    async fn insert(&self, lead: LeadRecord) -> Result<()>;

    /// Replace the lead if the stored version still equals
    /// `expected_version`. Returns the new version, or `None` when another
    /// writer got there first.
    async fn compare_and_swap(
        &self,
        lead: &LeadRecord,
        expected_version: u64,
    ) -> Result<Option<u64>>;

    /// Backend name for logging
    fn backend(&self) -> &'static str;
}

/// Read-modify-write a lead with optimistic retries.
///
/// `apply` mutates the freshly loaded record and returns whether anything
/// changed; unchanged records are not written back. The closure may run
/// more than once and must be deterministic with respect to its input.
pub async fn update_with_retry<F>(
    store: &dyn LeadStore,
    lead_id: &str,
    max_attempts: u32,
    mut apply: F,
) -> Result<LeadRecord>
where
    F: FnMut(&mut LeadRecord) -> Result<bool> + Send,
{
    let max_attempts = max_attempts.max(1);

    for attempt in 1..=max_attempts {
        let Versioned { mut value, version } = store
            .get(lead_id)
            .await?
            .ok_or_else(|| Error::not_found(lead_id))?;

        if !apply(&mut value)? {
            return Ok(value);
        }

        match store.compare_and_swap(&value, version).await? {
            Some(_) => return Ok(value),
            None => {
                tracing::warn!(
                    lead_id = %lead_id,
                    attempt,
                    backend = store.backend(),
                    "Lead update lost a version race, retrying"
                );
            }
        }
    }

    Err(Error::Conflict {
        lead_id: lead_id.to_string(),
        attempts: max_attempts,
    })
}
