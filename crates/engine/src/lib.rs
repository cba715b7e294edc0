//! Lead outreach engine
//!
//! - [`scoring`]: composite 0-100 lead score and tier
//! - [`batch`]: daily cohort selection, queueing and stabilization progress
//! - [`sequence`]: the per-lead contact sequence state machine
//! - [`runner`]: periodic outreach ticks over a scope
//!
//! Storage, message delivery and time are injected through the traits in
//! `leadflow_core`.

pub mod batch;
pub mod metrics;
pub mod runner;
pub mod scoring;
pub mod sequence;

pub use batch::{
    BatchSelector, DailyQueueResult, ProgressReport, ScoredLead, SelectionOptions, TierBreakdown,
    PROGRESS_STATUSES,
};
pub use runner::{pacing_wait, OutreachRunner, TickReport, ACTIVE_STATUSES};
pub use scoring::{CompositeScore, DataQuality, Dimensions, LeadScorer, Tier};
pub use sequence::{
    personalize_message, ContactSequenceEngine, ContactSummary, EmailSummary, HumanOverride,
    LeadInfo, NextStep, PhoneSummary, SequenceState, SequenceStepResult,
};
