//! Core types and traits for the lead outreach pipeline
//!
//! This crate provides the types shared across all other crates:
//! - Lead records with closed status/state enumerations
//! - Typed metadata used by scoring
//! - Contact attempts, threads and the per-lead thread ledger
//! - Collaborator traits (record store, message transport, clock)
//! - Error types

pub mod contact;
pub mod error;
pub mod lead;
pub mod metadata;
pub mod traits;

pub use contact::{
    AttemptOutcome, CallPriority, CallQueueMeta, ContactAttempt, ContactChannel, ContactThread,
    ThreadLedger, SEQUENCE_EXHAUSTED,
};
pub use error::{Error, Result};
pub use lead::{
    LeadRecord, LeadState, LeadStatus, PhoneEndpoint, PhoneKind, MAX_EMAILS, MAX_LANDLINES,
    MAX_MOBILES,
};
pub use metadata::{LeadMetadata, SeniorityHint, SeniorityLevel};
pub use traits::{
    update_with_retry, Clock, LeadStore, ManualClock, MessageTransport, SmsReceipt, SystemClock,
    Versioned,
};
