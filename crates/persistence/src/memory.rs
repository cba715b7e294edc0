//! In-memory lead store
//!
//! Used by tests and by the worker when ScyllaDB is disabled. Listing order
//! is insertion order. A store can be switched offline, and the next
//! compare-and-swap calls can be told to lose the version race.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use leadflow_core::{Error, LeadRecord, LeadStatus, LeadStore, Result, Versioned};
use parking_lot::RwLock;

use crate::error::PersistenceError;

#[derive(Default)]
struct Inner {
    order: Vec<String>,
    records: HashMap<String, Versioned<LeadRecord>>,
}

#[derive(Default)]
pub struct InMemoryLeadStore {
    inner: RwLock<Inner>,
    offline: AtomicBool,
    forced_conflicts: AtomicUsize,
    swaps: AtomicUsize,
}

impl InMemoryLeadStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store pre-loaded with `leads`, each at version 1
    pub fn with_leads(leads: impl IntoIterator<Item = LeadRecord>) -> Self {
        let store = Self::new();
        {
            let mut inner = store.inner.write();
            for lead in leads {
                if inner.records.contains_key(&lead.id) {
                    continue;
                }
                inner.order.push(lead.id.clone());
                inner
                    .records
                    .insert(lead.id.clone(), Versioned { value: lead, version: 1 });
            }
        }
        store
    }

    /// Make every operation fail with a store error until switched back
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Make the next `n` compare-and-swaps behave as if another writer
    /// bumped the version first
    pub fn force_conflicts(&self, n: usize) {
        self.forced_conflicts.store(n, Ordering::SeqCst);
    }

    /// Number of successful writes through compare-and-swap
    pub fn swap_count(&self) -> usize {
        self.swaps.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.inner.read().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current record without its version
    pub fn snapshot(&self, lead_id: &str) -> Option<LeadRecord> {
        self.inner.read().records.get(lead_id).map(|v| v.value.clone())
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(PersistenceError::Unavailable("in-memory store is offline".to_string()).into());
        }
        Ok(())
    }

    fn take_forced_conflict(&self) -> bool {
        self.forced_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn matching<'a>(
        inner: &'a Inner,
        scope: &'a str,
        statuses: &'a [LeadStatus],
    ) -> impl Iterator<Item = &'a LeadRecord> + 'a {
        inner
            .order
            .iter()
            .filter_map(|id| inner.records.get(id))
            .map(|v| &v.value)
            .filter(move |lead| lead.scope == scope && statuses.contains(&lead.status))
    }
}

#[async_trait]
impl LeadStore for InMemoryLeadStore {
    async fn get(&self, lead_id: &str) -> Result<Option<Versioned<LeadRecord>>> {
        self.check_online()?;
        Ok(self.inner.read().records.get(lead_id).cloned())
    }

    async fn count_by_status(&self, scope: &str, statuses: &[LeadStatus]) -> Result<u64> {
        self.check_online()?;
        let inner = self.inner.read();
        Ok(Self::matching(&inner, scope, statuses).count() as u64)
    }

    async fn list_by_status(
        &self,
        scope: &str,
        statuses: &[LeadStatus],
        limit: usize,
    ) -> Result<Vec<LeadRecord>> {
        self.check_online()?;
        let inner = self.inner.read();
        Ok(Self::matching(&inner, scope, statuses)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn insert(&self, lead: LeadRecord) -> Result<()> {
        self.check_online()?;
        lead.validate()?;
        let mut inner = self.inner.write();
        if inner.records.contains_key(&lead.id) {
            return Err(Error::validation(format!("lead {} already exists", lead.id)));
        }
        inner.order.push(lead.id.clone());
        inner
            .records
            .insert(lead.id.clone(), Versioned { value: lead, version: 1 });
        Ok(())
    }

    async fn compare_and_swap(
        &self,
        lead: &LeadRecord,
        expected_version: u64,
    ) -> Result<Option<u64>> {
        self.check_online()?;
        let mut inner = self.inner.write();
        let current = inner
            .records
            .get_mut(&lead.id)
            .ok_or_else(|| Error::not_found(&lead.id))?;

        if self.take_forced_conflict() {
            current.version += 1;
            return Ok(None);
        }
        if current.version != expected_version {
            return Ok(None);
        }

        current.value = lead.clone();
        current.version += 1;
        self.swaps.fetch_add(1, Ordering::SeqCst);
        Ok(Some(current.version))
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
