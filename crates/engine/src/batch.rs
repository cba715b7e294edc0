//! Daily batch selection and stabilization tracking
//!
//! Selection is read-only: it ranks `new` leads and returns the top of the
//! list. Moving the cohort to `queued` is a separate, idempotent step so
//! two selectors picking overlapping cohorts cannot corrupt anything.

use std::collections::HashSet;
use std::sync::Arc;

use leadflow_config::BatchConfig;
use leadflow_core::{update_with_retry, Clock, Error, LeadRecord, LeadStatus, LeadStore, Result};
use serde::{Deserialize, Serialize};

use crate::metrics;
use crate::scoring::{CompositeScore, LeadScorer, Tier};

/// Statuses counted as progress toward the stabilization target
pub const PROGRESS_STATUSES: [LeadStatus; 4] = [
    LeadStatus::Queued,
    LeadStatus::Contacted,
    LeadStatus::Responded,
    LeadStatus::Converted,
];

/// Per-call overrides for [`BatchSelector::select_next_batch`]
#[derive(Debug, Clone, Default)]
pub struct SelectionOptions {
    pub batch_size: Option<usize>,
    pub exclude_statuses: Option<Vec<LeadStatus>>,
    /// Replaces the scorer's target industry keywords for this call
    pub target_industries: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredLead {
    pub lead: LeadRecord,
    pub score: u32,
    pub composite_score: CompositeScore,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierBreakdown {
    #[serde(rename = "A")]
    pub a: usize,
    #[serde(rename = "B")]
    pub b: usize,
    #[serde(rename = "C")]
    pub c: usize,
    #[serde(rename = "D")]
    pub d: usize,
}

impl TierBreakdown {
    fn add(&mut self, tier: Tier) {
        match tier {
            Tier::A => self.a += 1,
            Tier::B => self.b += 1,
            Tier::C => self.c += 1,
            Tier::D => self.d += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.a + self.b + self.c + self.d
    }
}

/// One day's cohort, recomputed on every call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyQueueResult {
    pub day: u64,
    pub total_processed: u64,
    pub remaining_to_target: u64,
    pub leads: Vec<ScoredLead>,
    pub tier_breakdown: TierBreakdown,
    pub average_score: u32,
}

impl DailyQueueResult {
    pub fn lead_ids(&self) -> Vec<String> {
        self.leads.iter().map(|l| l.lead.id.clone()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressReport {
    pub day: u64,
    pub total_processed: u64,
    pub target_total: u64,
    pub percent_complete: u32,
    pub days_remaining: u32,
    pub on_track: bool,
}

pub struct BatchSelector {
    store: Arc<dyn LeadStore>,
    scorer: LeadScorer,
    clock: Arc<dyn Clock>,
    config: BatchConfig,
    max_cas_retries: u32,
}

impl BatchSelector {
    pub fn new(
        store: Arc<dyn LeadStore>,
        scorer: LeadScorer,
        clock: Arc<dyn Clock>,
        config: BatchConfig,
    ) -> Self {
        Self {
            store,
            scorer,
            clock,
            config,
            max_cas_retries: 5,
        }
    }

    pub fn with_max_cas_retries(mut self, retries: u32) -> Self {
        self.max_cas_retries = retries;
        self
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Rank unprocessed leads in `scope` and return the top cohort.
    ///
    /// Any store failure fails the whole call; no partial cohort is returned.
    pub async fn select_next_batch(
        &self,
        scope: &str,
        options: &SelectionOptions,
    ) -> Result<DailyQueueResult> {
        if scope.trim().is_empty() {
            return Err(Error::validation("scope must not be empty"));
        }
        let batch_size = options.batch_size.unwrap_or(self.config.batch_size);
        if batch_size == 0 {
            return Err(Error::validation("batch size must be at least 1"));
        }
        let exclude = options
            .exclude_statuses
            .as_deref()
            .unwrap_or(&self.config.exclude_statuses);

        let total_processed = self.store.count_by_status(scope, exclude).await?;
        let day = total_processed / batch_size as u64 + 1;
        let remaining_to_target = self
            .config
            .stabilization_target
            .saturating_sub(total_processed);

        let limit = batch_size.saturating_mul(self.config.candidate_multiplier.max(1));
        let candidates = self
            .store
            .list_by_status(scope, &[LeadStatus::New], limit)
            .await?;

        let scorer = match &options.target_industries {
            Some(industries) => LeadScorer::new(
                self.scorer
                    .config()
                    .clone()
                    .with_target_industries(industries.iter().cloned()),
            ),
            None => self.scorer.clone(),
        };

        let mut scored: Vec<ScoredLead> = candidates
            .into_iter()
            .filter(|lead| !exclude.contains(&lead.status))
            .map(|lead| {
                let composite_score = scorer.score(&lead);
                ScoredLead {
                    score: composite_score.total,
                    composite_score,
                    lead,
                }
            })
            .collect();

        // stable: equal scores keep store order
        scored.sort_by(|a, b| b.score.cmp(&a.score));
        scored.truncate(batch_size);

        let mut tier_breakdown = TierBreakdown::default();
        let mut total_score: u64 = 0;
        for lead in &scored {
            tier_breakdown.add(lead.composite_score.tier);
            total_score += u64::from(lead.score);
        }
        let average_score = if scored.is_empty() {
            0
        } else {
            (total_score as f64 / scored.len() as f64).round() as u32
        };

        metrics::record_batch(
            scope,
            scored.len(),
            scored.iter().map(|l| (l.score, l.composite_score.tier)),
        );
        tracing::info!(
            scope = %scope,
            day,
            total_processed,
            selected = scored.len(),
            average_score,
            "Selected daily batch"
        );

        Ok(DailyQueueResult {
            day,
            total_processed,
            remaining_to_target,
            leads: scored,
            tier_breakdown,
            average_score,
        })
    }

    /// Move leads from `new` to `queued` and tag them.
    ///
    /// Idempotent: already-queued leads are left as they are and still
    /// counted. Unknown ids and leads past `queued` are skipped. Returns the
    /// number of distinct ids that are queued afterwards.
    pub async fn mark_leads_as_queued(&self, lead_ids: &[String], tag: Option<&str>) -> Result<usize> {
        let tag = tag.unwrap_or(&self.config.queue_tag).trim().to_string();
        if tag.is_empty() {
            return Err(Error::validation("queue tag must not be empty"));
        }
        if lead_ids.iter().any(|id| id.trim().is_empty()) {
            return Err(Error::validation("lead id must not be empty"));
        }

        let mut seen = HashSet::new();
        let mut queued = 0;

        for lead_id in lead_ids.iter().filter(|id| seen.insert(id.as_str())) {
            let now = self.clock.now();
            let result = update_with_retry(self.store.as_ref(), lead_id, self.max_cas_retries, |lead| {
                if !matches!(lead.status, LeadStatus::New | LeadStatus::Queued) {
                    return Ok(false);
                }
                let mut changed = false;
                if lead.status != LeadStatus::Queued {
                    lead.status = lead.status.transition_to(LeadStatus::Queued)?;
                    changed = true;
                }
                if !lead.has_tag(&tag) {
                    lead.tags.push(tag.clone());
                    changed = true;
                }
                if changed {
                    lead.updated_at = now;
                }
                Ok(changed)
            })
            .await;

            match result {
                Ok(lead) if lead.status == LeadStatus::Queued => queued += 1,
                Ok(lead) => {
                    tracing::debug!(lead_id = %lead_id, status = %lead.status, "Lead not queueable, skipped");
                }
                Err(Error::NotFound(_)) => {
                    tracing::debug!(lead_id = %lead_id, "Unknown lead, skipped");
                }
                Err(e) => return Err(e),
            }
        }

        metrics::record_queued(queued);
        tracing::info!(requested = lead_ids.len(), queued, tag = %tag, "Marked leads as queued");
        Ok(queued)
    }

    /// Progress toward the stabilization target
    pub async fn stabilization_progress(&self, scope: &str) -> Result<ProgressReport> {
        if scope.trim().is_empty() {
            return Err(Error::validation("scope must not be empty"));
        }

        let total_processed = self.store.count_by_status(scope, &PROGRESS_STATUSES).await?;
        Ok(progress_report(total_processed, &self.config))
    }
}

fn progress_report(total_processed: u64, config: &BatchConfig) -> ProgressReport {
    let batch_size = config.batch_size.max(1) as u64;
    let target_total = config.stabilization_target;

    let day = total_processed / batch_size + 1;
    let percent_complete = if target_total == 0 {
        100
    } else {
        (total_processed as f64 / target_total as f64 * 100.0).round() as u32
    };
    let days_remaining = (u64::from(config.days_to_stabilize) + 1).saturating_sub(day) as u32;

    ProgressReport {
        day,
        total_processed,
        target_total,
        percent_complete,
        days_remaining,
        on_track: total_processed >= (day - 1) * batch_size,
    }
}
