//! Outreach metrics
//!
//! Recorded through the `metrics` facade; the worker installs the
//! Prometheus recorder. Without a recorder every call is a no-op.

use metrics::{counter, describe_counter, describe_histogram, histogram};

use leadflow_core::{AttemptOutcome, ContactChannel, SEQUENCE_EXHAUSTED};

use crate::scoring::Tier;

/// SMS/call attempts, labelled by channel and outcome
pub const CONTACT_ATTEMPTS: &str = "leadflow_contact_attempts_total";

/// Leads escalated into the human call queue
pub const CALL_QUEUE_ADDS: &str = "leadflow_call_queue_adds_total";

/// Response events applied to a lead
pub const RESPONSES_MARKED: &str = "leadflow_responses_marked_total";

/// Leads selected per daily batch
pub const BATCH_SELECTED: &str = "leadflow_batch_selected_leads";

/// Composite score of every selected lead
pub const BATCH_SCORE: &str = "leadflow_batch_score";

/// Leads moved to queued
pub const LEADS_QUEUED: &str = "leadflow_leads_queued_total";

/// Tick duration
pub const TICK_DURATION: &str = "leadflow_tick_duration_seconds";

/// Per-lead errors inside a tick
pub const TICK_ERRORS: &str = "leadflow_tick_errors_total";

/// Registers all metric descriptions.
///
/// Call once at startup after installing the recorder.
pub fn register_metrics() {
    describe_counter!(CONTACT_ATTEMPTS, "Contact attempts by channel and outcome");
    describe_counter!(CALL_QUEUE_ADDS, "Leads added to the human call queue");
    describe_counter!(RESPONSES_MARKED, "Response events applied to leads");
    describe_histogram!(BATCH_SELECTED, "Leads selected per daily batch");
    describe_histogram!(BATCH_SCORE, "Composite score of selected leads");
    describe_counter!(LEADS_QUEUED, "Leads transitioned to queued");
    describe_histogram!(TICK_DURATION, "Outreach tick duration in seconds");
    describe_counter!(TICK_ERRORS, "Per-lead errors during outreach ticks");
}

pub fn record_attempt(channel: ContactChannel, outcome: AttemptOutcome) {
    counter!(
        CONTACT_ATTEMPTS,
        "channel" => channel.as_str(),
        "outcome" => outcome.as_str()
    )
    .increment(1);
}

pub fn record_call_queue_add(reason: &str) {
    counter!(CALL_QUEUE_ADDS, "reason" => reason_label(reason)).increment(1);
}

/// Call queue reasons are free text; only the automatic one keeps its name
fn reason_label(reason: &str) -> &'static str {
    if reason == SEQUENCE_EXHAUSTED {
        SEQUENCE_EXHAUSTED
    } else {
        "manual"
    }
}

pub fn record_response(channel: ContactChannel) {
    counter!(RESPONSES_MARKED, "channel" => channel.as_str()).increment(1);
}

pub fn record_batch(scope: &str, selected: usize, scores: impl Iterator<Item = (u32, Tier)>) {
    histogram!(BATCH_SELECTED, "scope" => scope.to_string()).record(selected as f64);
    for (total, tier) in scores {
        histogram!(BATCH_SCORE, "tier" => tier.as_str()).record(f64::from(total));
    }
}

pub fn record_queued(count: usize) {
    counter!(LEADS_QUEUED).increment(count as u64);
}

pub fn record_tick(scope: &str, duration_secs: f64, errors: usize) {
    histogram!(TICK_DURATION, "scope" => scope.to_string()).record(duration_secs);
    if errors > 0 {
        counter!(TICK_ERRORS, "scope" => scope.to_string()).increment(errors as u64);
    }
}
