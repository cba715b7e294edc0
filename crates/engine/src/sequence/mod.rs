//! Contact sequence engine
//!
//! Drives one lead through its outreach channels, one step per call:
//!
//! ```text
//! NOT_STARTED -> TRYING_PHONE(i) -> TRYING_EMAIL -> CALL_QUEUE
//!        \______________\________________\______________\__-> RESPONDED
//! ```
//!
//! SMS goes to the primary phone, then mobile1..mobile5, at most
//! `max_sms_attempts` messages each. Landlines are never texted; they only
//! show up for human calls. Email delivery is external, so the engine only
//! reports the transition. When every automated channel is used up the
//! lead is handed to the human call queue.
//!
//! Every step sends at most one message. Ledger writes go through the
//! store's compare-and-swap; steps for the same lead inside one process are
//! additionally serialized so two ticks never text the same number twice.

mod personalize;

pub use personalize::personalize_message;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use leadflow_config::SequenceConfig;
use leadflow_core::{
    update_with_retry, AttemptOutcome, CallPriority, CallQueueMeta, Clock, ContactAttempt,
    ContactChannel, Error, LeadRecord, LeadState, LeadStatus, LeadStore, MessageTransport,
    PhoneEndpoint, Result, SEQUENCE_EXHAUSTED,
};

use crate::metrics;

/// What the next invocation is expected to do
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", content = "label", rename_all = "snake_case")]
pub enum NextStep {
    /// Text this phone label next
    Phone(String),
    /// Phones are done, email comes next
    Email,
    /// Email transition reported, delivery happens outside the engine
    EmailPending,
    CallQueue,
    Responded,
    /// Nothing left to try
    Exhausted,
}

impl std::fmt::Display for NextStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Phone(label) => write!(f, "next: {}", label),
            Self::Email => f.write_str("email"),
            Self::EmailPending => f.write_str("email_pending"),
            Self::CallQueue => f.write_str("call_queue"),
            Self::Responded => f.write_str("responded"),
            Self::Exhausted => f.write_str("exhausted"),
        }
    }
}

/// Position of a lead in the sequence, derived from its ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "index", rename_all = "snake_case")]
pub enum SequenceState {
    NotStarted,
    /// Index into the SMS endpoint list
    TryingPhone(usize),
    TryingEmail,
    CallQueue,
    Responded,
    /// Automated channels used up, not queued for a call
    Exhausted,
}

impl SequenceState {
    pub fn of(lead: &LeadRecord, max_sms_attempts: u32) -> Self {
        if lead.lead_state == LeadState::Responded || lead.ledger.has_any_response() {
            return Self::Responded;
        }
        if lead.lead_state == LeadState::InCallQueue || lead.ledger.in_call_queue {
            return Self::CallQueue;
        }

        let sms = lead.sms_sequence();
        let sent: u32 = sms
            .iter()
            .map(|p| lead.ledger.attempts_on(ContactChannel::Sms, &p.phone))
            .sum();
        if sent == 0 && !sms.is_empty() {
            return Self::NotStarted;
        }

        match sms
            .iter()
            .position(|p| lead.ledger.attempts_on(ContactChannel::Sms, &p.phone) < max_sms_attempts)
        {
            Some(idx) => Self::TryingPhone(idx),
            None if !lead.email_sequence().is_empty() => Self::TryingEmail,
            None => Self::Exhausted,
        }
    }
}

/// Outcome of one [`ContactSequenceEngine::execute_contact_sequence`] call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SequenceStepResult {
    pub success: bool,
    pub channel: ContactChannel,
    #[serde(rename = "phoneOrEmail")]
    pub endpoint: String,
    #[serde(rename = "phoneLabel", skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub next_step: NextStep,
    pub added_to_call_queue: bool,
    /// Pacing hint for the scheduler before the next step
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wait_hours: Option<u32>,
    /// State after this step
    pub state: SequenceState,
}

impl SequenceStepResult {
    fn new(channel: ContactChannel, endpoint: impl Into<String>, next_step: NextStep) -> Self {
        Self {
            success: false,
            channel,
            endpoint: endpoint.into(),
            label: None,
            message_id: None,
            error: None,
            next_step,
            added_to_call_queue: false,
            wait_hours: None,
            state: SequenceState::NotStarted,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadInfo {
    pub first_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
}

/// Result of a human click-to-call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HumanOverride {
    pub phone: String,
    pub all_phones: Vec<PhoneEndpoint>,
    pub lead_info: LeadInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhoneSummary {
    pub phone: String,
    pub label: String,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_attempt: Option<DateTime<Utc>>,
    pub has_response: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailSummary {
    pub email: String,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_attempt: Option<DateTime<Utc>>,
    pub has_response: bool,
}

/// Read-only projection of a lead's thread ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactSummary {
    pub phones: Vec<PhoneSummary>,
    pub emails: Vec<EmailSummary>,
    pub in_call_queue: bool,
    pub total_attempts: u32,
    pub last_channel: Option<ContactChannel>,
    pub has_any_response: bool,
    pub state: SequenceState,
}

enum Plan {
    Responded { channel: ContactChannel, endpoint: String },
    Send { index: usize, endpoint: PhoneEndpoint },
    EmailPending { email: String },
    CallQueue { phone: String },
    /// Converted, unsubscribed or invalid leads are never contacted
    Closed { status: LeadStatus },
    Exhausted,
}

pub struct ContactSequenceEngine {
    store: Arc<dyn LeadStore>,
    transport: Arc<dyn MessageTransport>,
    clock: Arc<dyn Clock>,
    config: SequenceConfig,
    step_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl ContactSequenceEngine {
    pub fn new(
        store: Arc<dyn LeadStore>,
        transport: Arc<dyn MessageTransport>,
        clock: Arc<dyn Clock>,
        config: SequenceConfig,
    ) -> Self {
        Self {
            store,
            transport,
            clock,
            config,
            step_locks: DashMap::new(),
        }
    }

    pub fn config(&self) -> &SequenceConfig {
        &self.config
    }

    /// Run one step of the sequence for `lead_id`.
    ///
    /// Transport failures are recorded as failed attempts and reported with
    /// `success = false`; only validation and store problems are errors.
    pub async fn execute_contact_sequence(
        &self,
        lead_id: &str,
        template: &str,
        config: Option<&SequenceConfig>,
    ) -> Result<SequenceStepResult> {
        validate_lead_id(lead_id)?;
        if template.trim().is_empty() {
            return Err(Error::validation("message template must not be empty"));
        }
        let cfg = config.unwrap_or(&self.config);

        let lock = self
            .step_locks
            .entry(lead_id.to_string())
            .or_default()
            .clone();
        let result = {
            let _guard = lock.lock().await;
            self.run_step(lead_id, template, cfg).await
        };
        drop(lock);
        self.step_locks
            .remove_if(lead_id, |_, l| Arc::strong_count(l) == 1);

        result
    }

    async fn run_step(
        &self,
        lead_id: &str,
        template: &str,
        cfg: &SequenceConfig,
    ) -> Result<SequenceStepResult> {
        let lead = self
            .store
            .get(lead_id)
            .await?
            .ok_or_else(|| Error::not_found(lead_id))?
            .value;

        match plan_step(&lead, cfg) {
            Plan::Responded { channel, endpoint } => {
                tracing::debug!(lead_id = %lead_id, "Lead already responded, sequence stopped");
                let mut result = SequenceStepResult::new(channel, endpoint, NextStep::Responded);
                result.success = true;
                result.state = SequenceState::Responded;
                Ok(result)
            }
            Plan::Send { index, endpoint } => self.send_sms(&lead, index, endpoint, template, cfg).await,
            Plan::EmailPending { email } => {
                tracing::info!(lead_id = %lead_id, email = %email, "SMS exhausted, email pending");
                let mut result =
                    SequenceStepResult::new(ContactChannel::Email, email, NextStep::EmailPending);
                result.wait_hours = Some(cfg.wait_before_email_hours);
                result.state = SequenceState::TryingEmail;
                Ok(result)
            }
            Plan::CallQueue { phone } => {
                self.enqueue_call(lead_id, CallPriority::Normal, SEQUENCE_EXHAUSTED, cfg.max_cas_retries)
                    .await?;
                let mut result = SequenceStepResult::new(ContactChannel::Call, phone, NextStep::CallQueue);
                result.added_to_call_queue = true;
                result.state = SequenceState::CallQueue;
                Ok(result)
            }
            Plan::Closed { status } => {
                tracing::info!(lead_id = %lead_id, status = %status, "Lead is closed, nothing sent");
                let mut result = SequenceStepResult::new(ContactChannel::Sms, "", NextStep::Exhausted);
                result.error = Some(format!("lead is {}", status));
                result.state = SequenceState::Exhausted;
                Ok(result)
            }
            Plan::Exhausted => {
                tracing::info!(lead_id = %lead_id, "All contact methods exhausted");
                let mut result = SequenceStepResult::new(ContactChannel::Sms, "", NextStep::Exhausted);
                result.error = Some("All contact methods exhausted".to_string());
                result.state = SequenceState::Exhausted;
                Ok(result)
            }
        }
    }

    async fn send_sms(
        &self,
        lead: &LeadRecord,
        index: usize,
        endpoint: PhoneEndpoint,
        template: &str,
        cfg: &SequenceConfig,
    ) -> Result<SequenceStepResult> {
        let body = personalize_message(template, lead);
        tracing::info!(
            lead_id = %lead.id,
            label = %endpoint.label,
            phone = %endpoint.phone,
            "Sending SMS"
        );
        tracing::debug!(lead_id = %lead.id, body = %body, "SMS body");

        let sent = tokio::time::timeout(
            cfg.transport_timeout(),
            self.transport.send_sms(&endpoint.phone, &body),
        )
        .await
        .unwrap_or_else(|_| {
            Err(Error::transport(format!(
                "send timed out after {}ms",
                cfg.transport_timeout_ms
            )))
        });

        let now = self.clock.now();
        let attempt = match &sent {
            Ok(receipt) => ContactAttempt::sent(
                ContactChannel::Sms,
                endpoint.phone.clone(),
                Some(endpoint.label.clone()),
                now,
                receipt.message_id.clone(),
            ),
            Err(e) => {
                tracing::warn!(
                    lead_id = %lead.id,
                    label = %endpoint.label,
                    provider = self.transport.provider(),
                    error = %e,
                    "SMS send failed"
                );
                ContactAttempt::failed(
                    ContactChannel::Sms,
                    endpoint.phone.clone(),
                    Some(endpoint.label.clone()),
                    now,
                    e.to_string(),
                )
            }
        };
        let outcome = attempt.status;
        let delivered = sent.is_ok();

        let updated = update_with_retry(self.store.as_ref(), &lead.id, cfg.max_cas_retries, |record| {
            record.ledger.record_attempt(&record.id, attempt.clone());
            if delivered && matches!(record.status, LeadStatus::New | LeadStatus::Queued) {
                record.status = record.status.transition_to(LeadStatus::Contacted)?;
            }
            record.updated_at = now;
            Ok(true)
        })
        .await?;
        metrics::record_attempt(ContactChannel::Sms, outcome);

        let (next_step, wait_hours) = next_after_send(&updated, index, cfg);
        let mut result = SequenceStepResult::new(ContactChannel::Sms, endpoint.phone, next_step);
        result.success = delivered;
        result.label = Some(endpoint.label);
        result.wait_hours = wait_hours;
        result.state = SequenceState::of(&updated, cfg.max_sms_attempts);
        match sent {
            Ok(receipt) => result.message_id = receipt.message_id,
            Err(e) => result.error = Some(e.to_string()),
        }
        Ok(result)
    }

    /// Put a lead in the human call queue.
    ///
    /// Idempotent: a lead already queued keeps its original entry time,
    /// priority and reason. A lead that has responded cannot be queued.
    pub async fn add_to_call_queue(
        &self,
        lead_id: &str,
        priority: CallPriority,
        reason: Option<&str>,
    ) -> Result<()> {
        validate_lead_id(lead_id)?;
        let reason = reason
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or(SEQUENCE_EXHAUSTED);
        self.enqueue_call(lead_id, priority, reason, self.config.max_cas_retries)
            .await
    }

    async fn enqueue_call(
        &self,
        lead_id: &str,
        priority: CallPriority,
        reason: &str,
        max_cas_retries: u32,
    ) -> Result<()> {
        let now = self.clock.now();
        let mut added = false;

        update_with_retry(self.store.as_ref(), lead_id, max_cas_retries, |lead| {
            added = false;
            let state = lead.lead_state.transition_to(LeadState::InCallQueue)?;
            added = lead.ledger.enter_call_queue(CallQueueMeta {
                added_at: now,
                priority,
                reason: reason.to_string(),
            });
            let changed = added || state != lead.lead_state;
            if changed {
                lead.lead_state = state;
                lead.updated_at = now;
            }
            Ok(changed)
        })
        .await?;

        if added {
            metrics::record_call_queue_add(reason);
            tracing::info!(
                lead_id = %lead_id,
                priority = priority.as_str(),
                reason = %reason,
                "Lead added to call queue"
            );
        }
        Ok(())
    }

    /// Click-to-call, available at any point of the sequence.
    ///
    /// Logs a call attempt against `phone`, or the first phone of the lead
    /// when none is given.
    pub async fn human_override_call(
        &self,
        lead_id: &str,
        phone: Option<&str>,
    ) -> Result<HumanOverride> {
        validate_lead_id(lead_id)?;

        let lead = self
            .store
            .get(lead_id)
            .await?
            .ok_or_else(|| Error::not_found(lead_id))?
            .value;

        let all_phones = lead.phone_sequence();
        let chosen = phone
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .or_else(|| all_phones.first().map(|p| p.phone.clone()))
            .ok_or_else(|| Error::validation(format!("lead {} has no phone to call", lead_id)))?;
        let label = all_phones
            .iter()
            .find(|p| p.phone == chosen)
            .map(|p| p.label.clone())
            .unwrap_or_else(|| "manual".to_string());

        let now = self.clock.now();
        let attempt = ContactAttempt::sent(
            ContactChannel::Call,
            chosen.clone(),
            Some(label.clone()),
            now,
            None,
        );
        update_with_retry(self.store.as_ref(), lead_id, self.config.max_cas_retries, |record| {
            record.ledger.record_attempt(&record.id, attempt.clone());
            record.updated_at = now;
            Ok(true)
        })
        .await?;
        metrics::record_attempt(ContactChannel::Call, AttemptOutcome::Sent);
        tracing::info!(lead_id = %lead_id, phone = %chosen, label = %label, "Human override call");

        Ok(HumanOverride {
            phone: chosen,
            all_phones,
            lead_info: LeadInfo {
                first_name: lead.first_name().unwrap_or_default().to_string(),
                last_name: lead.last_name().map(str::to_string),
                company: lead.company().map(str::to_string),
            },
        })
    }

    /// Record an inbound response on `(channel, endpoint)`.
    ///
    /// Sets the lead state to responded. Repeating the call is harmless:
    /// the thread keeps its single response flag and the latest time.
    pub async fn mark_response(
        &self,
        lead_id: &str,
        channel: ContactChannel,
        endpoint: &str,
    ) -> Result<()> {
        validate_lead_id(lead_id)?;
        let endpoint = endpoint.trim();
        if endpoint.is_empty() {
            return Err(Error::validation("endpoint must not be empty"));
        }

        let now = self.clock.now();
        let mut first = false;
        update_with_retry(self.store.as_ref(), lead_id, self.config.max_cas_retries, |lead| {
            first = lead
                .ledger
                .mark_response(&lead.id, channel, endpoint, now);
            lead.lead_state = lead.lead_state.transition_to(LeadState::Responded)?;
            if lead.status.can_transition_to(LeadStatus::Responded) {
                lead.status = LeadStatus::Responded;
            }
            lead.updated_at = now;
            Ok(true)
        })
        .await?;

        if first {
            metrics::record_response(channel);
        }
        tracing::info!(
            lead_id = %lead_id,
            channel = %channel,
            endpoint = %endpoint,
            first,
            "Response recorded"
        );
        Ok(())
    }

    pub async fn contact_summary(&self, lead_id: &str) -> Result<ContactSummary> {
        validate_lead_id(lead_id)?;
        let lead = self
            .store
            .get(lead_id)
            .await?
            .ok_or_else(|| Error::not_found(lead_id))?
            .value;
        Ok(summarize(&lead, self.config.max_sms_attempts))
    }
}

fn validate_lead_id(lead_id: &str) -> Result<()> {
    if lead_id.trim().is_empty() {
        return Err(Error::validation("lead id must not be empty"));
    }
    Ok(())
}

fn plan_step(lead: &LeadRecord, cfg: &SequenceConfig) -> Plan {
    // any response stops the whole sequence, not just its thread
    if let Some(thread) = lead.ledger.responded_thread() {
        return Plan::Responded {
            channel: thread.channel,
            endpoint: thread.endpoint.clone(),
        };
    }
    if lead.lead_state == LeadState::Responded {
        return Plan::Responded {
            channel: ContactChannel::Sms,
            endpoint: String::new(),
        };
    }
    if lead.status.is_terminal() {
        return Plan::Closed { status: lead.status };
    }

    for (index, endpoint) in lead.sms_sequence().into_iter().enumerate() {
        let thread = lead.ledger.thread(ContactChannel::Sms, &endpoint.phone);
        if thread.map(|t| t.total_attempts).unwrap_or(0) >= cfg.max_sms_attempts {
            continue;
        }
        return Plan::Send { index, endpoint };
    }

    if let Some(email) = lead.email_sequence().into_iter().next() {
        return Plan::EmailPending { email };
    }

    match lead.phone_sequence().into_iter().next() {
        Some(phone) if cfg.auto_add_to_call_queue => Plan::CallQueue { phone: phone.phone },
        _ => Plan::Exhausted,
    }
}

/// Next step after a send on SMS endpoint `index`, with its pacing hint
fn next_after_send(lead: &LeadRecord, index: usize, cfg: &SequenceConfig) -> (NextStep, Option<u32>) {
    let sms = lead.sms_sequence();
    let remaining = |p: &PhoneEndpoint| {
        lead.ledger.attempts_on(ContactChannel::Sms, &p.phone) < cfg.max_sms_attempts
    };

    if let Some(current) = sms.get(index).filter(|p| remaining(p)) {
        return (NextStep::Phone(current.label.clone()), None);
    }
    if let Some(next) = sms.iter().skip(index + 1).find(|p| remaining(p)) {
        return (
            NextStep::Phone(next.label.clone()),
            Some(cfg.wait_between_phones_hours),
        );
    }
    if !lead.email_sequence().is_empty() {
        return (NextStep::Email, Some(cfg.wait_before_email_hours));
    }
    if cfg.auto_add_to_call_queue {
        (NextStep::CallQueue, None)
    } else {
        (NextStep::Exhausted, None)
    }
}

fn summarize(lead: &LeadRecord, max_sms_attempts: u32) -> ContactSummary {
    let ledger = &lead.ledger;

    let phones = lead
        .phone_sequence()
        .into_iter()
        .map(|p| {
            let thread = ledger.thread(ContactChannel::Sms, &p.phone);
            PhoneSummary {
                attempts: thread.map(|t| t.total_attempts).unwrap_or(0),
                last_attempt: thread.and_then(|t| t.last_attempt_at),
                has_response: thread.map(|t| t.has_response).unwrap_or(false),
                phone: p.phone,
                label: p.label,
            }
        })
        .collect();

    let emails = lead
        .email_sequence()
        .into_iter()
        .map(|email| {
            let thread = ledger.thread(ContactChannel::Email, &email);
            EmailSummary {
                attempts: thread.map(|t| t.total_attempts).unwrap_or(0),
                last_attempt: thread.and_then(|t| t.last_attempt_at),
                has_response: thread.map(|t| t.has_response).unwrap_or(false),
                email,
            }
        })
        .collect();

    ContactSummary {
        phones,
        emails,
        in_call_queue: ledger.in_call_queue,
        total_attempts: ledger.total_attempts(),
        last_channel: ledger.last_channel(),
        has_any_response: ledger.has_any_response(),
        state: SequenceState::of(lead, max_sms_attempts),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap()
    }

    fn sms(lead: &mut LeadRecord, phone: &str, label: &str, hour: u32) {
        let id = lead.id.clone();
        lead.ledger.record_attempt(
            &id,
            ContactAttempt::sent(ContactChannel::Sms, phone, Some(label.into()), at(hour), None),
        );
    }

    fn lead() -> LeadRecord {
        LeadRecord::new("l1", "team-a")
            .with_phone("5551234567")
            .with_mobile("5559876543")
            .with_landline("5550001111")
    }

    #[test]
    fn test_plan_starts_with_primary() {
        let plan = plan_step(&lead(), &SequenceConfig::default());
        assert!(matches!(plan, Plan::Send { index: 0, ref endpoint } if endpoint.label == "primary"));
        assert_eq!(SequenceState::of(&lead(), 2), SequenceState::NotStarted);
    }

    #[test]
    fn test_plan_skips_exhausted_endpoint() {
        let mut lead = lead();
        sms(&mut lead, "5551234567", "primary", 1);
        sms(&mut lead, "5551234567", "primary", 2);

        let plan = plan_step(&lead, &SequenceConfig::default());
        assert!(matches!(plan, Plan::Send { index: 1, ref endpoint } if endpoint.label == "mobile1"));
        assert_eq!(SequenceState::of(&lead, 2), SequenceState::TryingPhone(1));
    }

    #[test]
    fn test_plan_falls_through_to_call_queue_or_exhausted() {
        let mut lead = lead();
        sms(&mut lead, "5551234567", "primary", 1);
        sms(&mut lead, "5559876543", "mobile1", 2);
        let cfg = SequenceConfig {
            max_sms_attempts: 1,
            ..Default::default()
        };

        // landline keeps the lead callable
        assert!(matches!(plan_step(&lead, &cfg), Plan::CallQueue { ref phone } if phone == "5551234567"));

        let cfg = SequenceConfig {
            auto_add_to_call_queue: false,
            ..cfg
        };
        assert!(matches!(plan_step(&lead, &cfg), Plan::Exhausted));
        assert_eq!(SequenceState::of(&lead, 1), SequenceState::Exhausted);
    }

    #[test]
    fn test_plan_prefers_email_after_sms() {
        let mut lead = lead().with_email("jane@acme.com");
        sms(&mut lead, "5551234567", "primary", 1);
        sms(&mut lead, "5559876543", "mobile1", 2);
        let cfg = SequenceConfig {
            max_sms_attempts: 1,
            ..Default::default()
        };
        assert!(matches!(plan_step(&lead, &cfg), Plan::EmailPending { ref email } if email == "jane@acme.com"));
        assert_eq!(SequenceState::of(&lead, 1), SequenceState::TryingEmail);
    }

    #[test]
    fn test_response_anywhere_stops_sequence() {
        let mut lead = lead();
        lead.ledger
            .mark_response("l1", ContactChannel::Email, "jane@acme.com", at(3));
        assert!(matches!(
            plan_step(&lead, &SequenceConfig::default()),
            Plan::Responded { channel: ContactChannel::Email, .. }
        ));
        assert_eq!(SequenceState::of(&lead, 2), SequenceState::Responded);
    }

    #[test]
    fn test_response_on_open_phone_stops_before_closed_status() {
        let mut converted = lead().with_status(LeadStatus::Converted);
        sms(&mut converted, "5551234567", "primary", 1);
        converted
            .ledger
            .mark_response("l1", ContactChannel::Sms, "5551234567", at(2));

        match plan_step(&converted, &SequenceConfig::default()) {
            Plan::Responded { channel, endpoint } => {
                assert_eq!(channel, ContactChannel::Sms);
                assert_eq!(endpoint, "5551234567");
            }
            _ => panic!("expected a responded plan"),
        }

        let closed = lead().with_status(LeadStatus::Unsubscribed);
        assert!(matches!(
            plan_step(&closed, &SequenceConfig::default()),
            Plan::Closed { status: LeadStatus::Unsubscribed }
        ));
    }

    #[test]
    fn test_next_after_send() {
        let cfg = SequenceConfig::default();
        let mut lead = lead();

        sms(&mut lead, "5551234567", "primary", 1);
        assert_eq!(
            next_after_send(&lead, 0, &cfg),
            (NextStep::Phone("primary".into()), None)
        );

        sms(&mut lead, "5551234567", "primary", 2);
        assert_eq!(
            next_after_send(&lead, 0, &cfg),
            (NextStep::Phone("mobile1".into()), Some(24))
        );

        sms(&mut lead, "5559876543", "mobile1", 3);
        sms(&mut lead, "5559876543", "mobile1", 4);
        assert_eq!(next_after_send(&lead, 1, &cfg), (NextStep::CallQueue, None));

        let lead = lead.with_email("jane@acme.com");
        assert_eq!(next_after_send(&lead, 1, &cfg), (NextStep::Email, Some(48)));
    }

    #[test]
    fn test_next_step_display() {
        assert_eq!(NextStep::Phone("mobile2".into()).to_string(), "next: mobile2");
        assert_eq!(NextStep::EmailPending.to_string(), "email_pending");
        assert_eq!(NextStep::CallQueue.to_string(), "call_queue");
    }

    #[test]
    fn test_summary_projection() {
        let mut lead = lead().with_email("jane@acme.com");
        sms(&mut lead, "5551234567", "primary", 1);
        sms(&mut lead, "5559876543", "mobile1", 5);
        lead.ledger
            .mark_response("l1", ContactChannel::Sms, "5559876543", at(6));

        let summary = summarize(&lead, 2);
        assert_eq!(summary.phones.len(), 3);
        assert_eq!(summary.phones[0].attempts, 1);
        assert_eq!(summary.phones[1].last_attempt, Some(at(5)));
        assert!(summary.phones[1].has_response);
        assert_eq!(summary.phones[2].label, "landline1");
        assert_eq!(summary.phones[2].attempts, 0);
        assert_eq!(summary.emails[0].attempts, 0);
        assert_eq!(summary.total_attempts, 2);
        assert_eq!(summary.last_channel, Some(ContactChannel::Sms));
        assert!(summary.has_any_response);
        assert_eq!(summary.state, SequenceState::Responded);
    }
}
