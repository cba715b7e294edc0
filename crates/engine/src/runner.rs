//! Outreach tick runner
//!
//! One tick walks the queued and contacted leads of a scope and runs one
//! sequence step for each lead that has one due. The shutdown signal is checked between leads,
//! never in the middle of a step.

use std::sync::Arc;
use std::time::{Duration, Instant};

use leadflow_config::{SequenceConfig, WorkerConfig};
use leadflow_core::{Clock, ContactChannel, LeadRecord, LeadStatus, LeadStore, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::batch::{BatchSelector, SelectionOptions};
use crate::metrics;
use crate::sequence::{ContactSequenceEngine, NextStep, SequenceState};

/// Statuses picked up by a tick
pub const ACTIVE_STATUSES: [LeadStatus; 2] = [LeadStatus::Queued, LeadStatus::Contacted];

const DAILY_SELECTION_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickReport {
    pub scope: String,
    /// Leads a step was run for
    pub processed: usize,
    pub sent: usize,
    pub failed: usize,
    pub responded: usize,
    /// SMS used up, waiting on email delivery
    pub email_pending: usize,
    pub call_queued: usize,
    /// Nothing left to try
    pub exhausted: usize,
    /// Waiting out a pacing window
    pub deferred: usize,
    /// Already in the call queue or responded
    pub skipped: usize,
    /// Store or validation errors on individual leads
    pub errors: usize,
    /// Stopped early by shutdown
    pub interrupted: bool,
}

pub struct OutreachRunner {
    store: Arc<dyn LeadStore>,
    engine: Arc<ContactSequenceEngine>,
    selector: Option<Arc<BatchSelector>>,
    clock: Arc<dyn Clock>,
    config: WorkerConfig,
    shutdown: watch::Receiver<bool>,
}

impl OutreachRunner {
    pub fn new(
        store: Arc<dyn LeadStore>,
        engine: Arc<ContactSequenceEngine>,
        clock: Arc<dyn Clock>,
        config: WorkerConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            store,
            engine,
            selector: None,
            clock,
            config,
            shutdown,
        }
    }

    /// Enable daily batch selection in [`OutreachRunner::run`]
    pub fn with_selector(mut self, selector: Arc<BatchSelector>) -> Self {
        self.selector = Some(selector);
        self
    }

    fn stopping(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Run one sequence step for every active lead of `scope` that has a
    /// step to run, up to `max_leads_per_tick` steps.
    ///
    /// Leads waiting on the call queue, on external email delivery or on a
    /// pacing window are counted but do not use up the per-tick budget.
    /// Failing to list leads fails the tick. Errors on a single lead are
    /// logged and counted; the remaining leads still run.
    pub async fn run_tick(&self, scope: &str, template: &str) -> Result<TickReport> {
        let started = Instant::now();
        let cfg = self.engine.config().clone();
        let leads = self
            .store
            .list_by_status(scope, &ACTIVE_STATUSES, usize::MAX)
            .await?;

        let mut report = TickReport {
            scope: scope.to_string(),
            ..Default::default()
        };

        for lead in leads {
            if self.stopping() {
                tracing::info!(scope = %scope, processed = report.processed, "Tick interrupted by shutdown");
                report.interrupted = true;
                break;
            }
            if report.processed >= self.config.max_leads_per_tick {
                tracing::debug!(scope = %scope, "Tick step budget used up");
                break;
            }

            match SequenceState::of(&lead, cfg.max_sms_attempts) {
                SequenceState::CallQueue | SequenceState::Responded => {
                    report.skipped += 1;
                    continue;
                }
                // email delivery happens outside the engine
                SequenceState::TryingEmail => {
                    report.email_pending += 1;
                    continue;
                }
                SequenceState::Exhausted if !will_enqueue_call(&lead, &cfg) => {
                    report.exhausted += 1;
                    continue;
                }
                _ => {}
            }
            if let Some(wait) = pacing_wait(&lead, &cfg, self.clock.now()) {
                tracing::debug!(lead_id = %lead.id, wait_secs = wait.num_seconds(), "Lead deferred by pacing");
                report.deferred += 1;
                continue;
            }

            report.processed += 1;
            match self.engine.execute_contact_sequence(&lead.id, template, None).await {
                // a phone label means an SMS went out (or failed to)
                Ok(step) if step.label.is_some() => {
                    if step.success {
                        report.sent += 1;
                    } else {
                        report.failed += 1;
                    }
                }
                Ok(step) => match step.next_step {
                    NextStep::Responded => report.responded += 1,
                    NextStep::EmailPending => report.email_pending += 1,
                    NextStep::CallQueue => report.call_queued += 1,
                    _ => report.exhausted += 1,
                },
                Err(e) => {
                    tracing::error!(lead_id = %lead.id, error = %e, "Sequence step failed");
                    report.errors += 1;
                }
            }
        }

        metrics::record_tick(scope, started.elapsed().as_secs_f64(), report.errors);
        tracing::info!(
            scope = %scope,
            processed = report.processed,
            sent = report.sent,
            failed = report.failed,
            call_queued = report.call_queued,
            deferred = report.deferred,
            errors = report.errors,
            "Outreach tick complete"
        );
        Ok(report)
    }

    /// Select and queue today's batch for `scope`
    pub async fn select_daily_batch(&self, scope: &str) -> Result<usize> {
        let Some(selector) = &self.selector else {
            return Ok(0);
        };
        let batch = selector
            .select_next_batch(scope, &SelectionOptions::default())
            .await?;
        selector.mark_leads_as_queued(&batch.lead_ids(), None).await
    }

    /// Tick every configured scope until shutdown
    pub async fn run(mut self) {
        let mut tick_timer = tokio::time::interval(self.config.tick_interval());
        tick_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut selection_timer = tokio::time::interval(DAILY_SELECTION_INTERVAL);
        selection_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let scopes = self.config.scopes.clone();
        let template = self.config.message_template.clone();

        loop {
            tokio::select! {
                _ = selection_timer.tick(), if self.selector.is_some() => {
                    for scope in &scopes {
                        match self.select_daily_batch(scope).await {
                            Ok(queued) => tracing::info!(scope = %scope, queued, "Daily batch queued"),
                            Err(e) => tracing::error!(scope = %scope, error = %e, "Daily batch selection failed"),
                        }
                    }
                }
                _ = tick_timer.tick() => {
                    for scope in &scopes {
                        if self.stopping() {
                            break;
                        }
                        if let Err(e) = self.run_tick(scope, &template).await {
                            tracing::error!(scope = %scope, error = %e, "Outreach tick failed");
                        }
                    }
                }
                changed = self.shutdown.changed() => {
                    // a dropped sender also means stop
                    if changed.is_err() || *self.shutdown.borrow() {
                        tracing::info!("Outreach runner shutting down");
                        break;
                    }
                }
            }
        }
    }
}

/// An exhausted lead only has a step left when it can go to the call queue
fn will_enqueue_call(lead: &LeadRecord, cfg: &SequenceConfig) -> bool {
    cfg.auto_add_to_call_queue && !lead.phone_sequence().is_empty()
}

/// Time left before the next step may run, if any.
///
/// Moving to a different phone waits `wait_between_phones_hours` after the
/// last SMS; moving to email waits `wait_before_email_hours`. Repeat
/// messages on the same phone are not paced.
pub fn pacing_wait(
    lead: &LeadRecord,
    cfg: &SequenceConfig,
    now: chrono::DateTime<chrono::Utc>,
) -> Option<chrono::Duration> {
    let (last_at, last_phone) = lead
        .ledger
        .contact_threads
        .iter()
        .filter(|t| t.channel == ContactChannel::Sms)
        .filter_map(|t| t.last_attempt_at.map(|at| (at, t.endpoint.as_str())))
        .max_by_key(|(at, _)| *at)?;

    let hours = match SequenceState::of(lead, cfg.max_sms_attempts) {
        SequenceState::TryingPhone(idx) => {
            let next = lead.sms_sequence().into_iter().nth(idx)?;
            if next.phone == last_phone {
                return None;
            }
            cfg.wait_between_phones_hours
        }
        SequenceState::TryingEmail => cfg.wait_before_email_hours,
        _ => return None,
    };

    let ready_at = last_at + chrono::Duration::hours(i64::from(hours));
    (now < ready_at).then(|| ready_at - now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use leadflow_core::ContactAttempt;

    fn at(hour: u32) -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap()
    }

    fn lead_with_attempts(attempts: &[(&str, u32)]) -> LeadRecord {
        let mut lead = LeadRecord::new("l1", "team-a")
            .with_phone("5551234567")
            .with_mobile("5559876543");
        for (phone, hour) in attempts {
            lead.ledger.record_attempt(
                "l1",
                ContactAttempt::sent(ContactChannel::Sms, *phone, None, at(*hour), None),
            );
        }
        lead
    }

    #[test]
    fn test_no_wait_before_first_attempt() {
        let lead = lead_with_attempts(&[]);
        assert!(pacing_wait(&lead, &SequenceConfig::default(), at(0)).is_none());
    }

    #[test]
    fn test_no_wait_for_repeat_on_same_phone() {
        let lead = lead_with_attempts(&[("5551234567", 1)]);
        assert!(pacing_wait(&lead, &SequenceConfig::default(), at(2)).is_none());
    }

    #[test]
    fn test_wait_between_phones() {
        let lead = lead_with_attempts(&[("5551234567", 1), ("5551234567", 2)]);
        let cfg = SequenceConfig::default();

        let wait = pacing_wait(&lead, &cfg, at(3)).unwrap();
        assert_eq!(wait, chrono::Duration::hours(23));

        let later = at(2) + chrono::Duration::hours(24);
        assert!(pacing_wait(&lead, &cfg, later).is_none());
    }

    #[test]
    fn test_wait_before_email() {
        let lead = lead_with_attempts(&[("5551234567", 1), ("5559876543", 2)]).with_email("a@b.com");
        let cfg = SequenceConfig {
            max_sms_attempts: 1,
            ..Default::default()
        };
        let wait = pacing_wait(&lead, &cfg, at(4)).unwrap();
        assert_eq!(wait, chrono::Duration::hours(46));
    }
}
