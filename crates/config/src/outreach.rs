//! Daily batch, contact sequence and worker configuration

use leadflow_core::LeadStatus;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::ConfigError;

/// Daily batch selection and stabilization tracking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Leads selected per day
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Cumulative processed leads before the machine counts as calibrated
    #[serde(default = "default_stabilization_target")]
    pub stabilization_target: u64,

    #[serde(default = "default_days_to_stabilize")]
    pub days_to_stabilize: u32,

    /// Candidates fetched per selected lead, to leave room for ranking
    #[serde(default = "default_candidate_multiplier")]
    pub candidate_multiplier: usize,

    /// Statuses that count as already processed
    #[serde(default = "default_exclude_statuses")]
    pub exclude_statuses: Vec<LeadStatus>,

    /// Tag appended when a lead is queued
    #[serde(default = "default_queue_tag")]
    pub queue_tag: String,
}

fn default_batch_size() -> usize {
    2000
}
fn default_stabilization_target() -> u64 {
    20_000
}
fn default_days_to_stabilize() -> u32 {
    10
}
fn default_candidate_multiplier() -> usize {
    3
}
fn default_exclude_statuses() -> Vec<LeadStatus> {
    vec![
        LeadStatus::Contacted,
        LeadStatus::Responded,
        LeadStatus::Converted,
        LeadStatus::Unsubscribed,
        LeadStatus::Invalid,
    ]
}
fn default_queue_tag() -> String {
    "sms_queue".to_string()
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            stabilization_target: default_stabilization_target(),
            days_to_stabilize: default_days_to_stabilize(),
            candidate_multiplier: default_candidate_multiplier(),
            exclude_statuses: default_exclude_statuses(),
            queue_tag: default_queue_tag(),
        }
    }
}

impl BatchConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::invalid("batch.batch_size", "Must be at least 1"));
        }
        if self.candidate_multiplier == 0 {
            return Err(ConfigError::invalid(
                "batch.candidate_multiplier",
                "Must be at least 1",
            ));
        }
        if self.days_to_stabilize == 0 {
            return Err(ConfigError::invalid(
                "batch.days_to_stabilize",
                "Must be at least 1",
            ));
        }
        if self.queue_tag.trim().is_empty() {
            return Err(ConfigError::invalid("batch.queue_tag", "Must not be blank"));
        }
        Ok(())
    }
}

/// Contact sequence behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceConfig {
    /// Messages per phone before moving to the next endpoint
    #[serde(default = "default_max_sms_attempts")]
    pub max_sms_attempts: u32,

    /// Pacing hint between phones, enforced by the scheduler
    #[serde(default = "default_wait_between_phones_hours")]
    pub wait_between_phones_hours: u32,

    /// Pacing hint before the email channel, enforced by the scheduler
    #[serde(default = "default_wait_before_email_hours")]
    pub wait_before_email_hours: u32,

    /// Escalate to the human call queue once automated channels run out
    #[serde(default = "default_true")]
    pub auto_add_to_call_queue: bool,

    /// Upper bound for one transport call
    #[serde(default = "default_transport_timeout_ms")]
    pub transport_timeout_ms: u64,

    /// Optimistic write attempts before giving up with a conflict
    #[serde(default = "default_max_cas_retries")]
    pub max_cas_retries: u32,
}

fn default_max_sms_attempts() -> u32 {
    2
}
fn default_wait_between_phones_hours() -> u32 {
    24
}
fn default_wait_before_email_hours() -> u32 {
    48
}
fn default_true() -> bool {
    true
}
fn default_transport_timeout_ms() -> u64 {
    10_000
}
fn default_max_cas_retries() -> u32 {
    5
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            max_sms_attempts: default_max_sms_attempts(),
            wait_between_phones_hours: default_wait_between_phones_hours(),
            wait_before_email_hours: default_wait_before_email_hours(),
            auto_add_to_call_queue: true,
            transport_timeout_ms: default_transport_timeout_ms(),
            max_cas_retries: default_max_cas_retries(),
        }
    }
}

impl SequenceConfig {
    pub fn transport_timeout(&self) -> Duration {
        Duration::from_millis(self.transport_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_sms_attempts == 0 {
            return Err(ConfigError::invalid(
                "sequence.max_sms_attempts",
                "Must be at least 1",
            ));
        }
        if self.transport_timeout_ms == 0 {
            return Err(ConfigError::invalid(
                "sequence.transport_timeout_ms",
                "Must be positive",
            ));
        }
        if self.max_cas_retries == 0 {
            return Err(ConfigError::invalid(
                "sequence.max_cas_retries",
                "Must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Outreach worker loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Scopes (tenants/teams) processed on every tick
    #[serde(default)]
    pub scopes: Vec<String>,

    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,

    #[serde(default = "default_max_leads_per_tick")]
    pub max_leads_per_tick: usize,

    /// Template with `{firstName}`, `{lastName}`, `{company}`, `{name}`
    #[serde(default = "default_message_template")]
    pub message_template: String,
}

fn default_tick_interval_secs() -> u64 {
    60
}
fn default_max_leads_per_tick() -> usize {
    500
}
fn default_message_template() -> String {
    "Hi {firstName}, quick question about {company} - are you open to a short call this week?"
        .to_string()
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            scopes: Vec::new(),
            tick_interval_secs: default_tick_interval_secs(),
            max_leads_per_tick: default_max_leads_per_tick(),
            message_template: default_message_template(),
        }
    }
}

impl WorkerConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval_secs == 0 {
            return Err(ConfigError::invalid(
                "worker.tick_interval_secs",
                "Must be positive",
            ));
        }
        if self.max_leads_per_tick == 0 {
            return Err(ConfigError::invalid(
                "worker.max_leads_per_tick",
                "Must be at least 1",
            ));
        }
        if self.message_template.trim().is_empty() {
            return Err(ConfigError::invalid(
                "worker.message_template",
                "Must not be blank",
            ));
        }
        if self.scopes.iter().any(|s| s.trim().is_empty()) {
            return Err(ConfigError::invalid("worker.scopes", "Scopes must not be blank"));
        }
        Ok(())
    }
}
