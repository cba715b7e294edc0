//! Contact attempts, per-endpoint threads and the thread ledger
//!
//! The ledger is stored with the lead record. Each `(channel, endpoint)`
//! pair owns exactly one [`ContactThread`]; attempts are append-only and
//! `has_response` never reverts once set.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactChannel {
    Sms,
    Email,
    Call,
    Whatsapp,
}

impl ContactChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sms => "sms",
            Self::Email => "email",
            Self::Call => "call",
            Self::Whatsapp => "whatsapp",
        }
    }
}

impl std::fmt::Display for ContactChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one delivery try
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Sent,
    Delivered,
    Failed,
    Responded,
    NoResponse,
}

impl AttemptOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Delivered => "delivered",
            Self::Failed => "failed",
            Self::Responded => "responded",
            Self::NoResponse => "no_response",
        }
    }
}

/// Immutable record of one delivery try
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactAttempt {
    pub channel: ContactChannel,
    #[serde(rename = "phoneOrEmail")]
    pub endpoint: String,
    #[serde(rename = "phoneLabel", default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub status: AttemptOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ContactAttempt {
    pub fn sent(
        channel: ContactChannel,
        endpoint: impl Into<String>,
        label: Option<String>,
        timestamp: DateTime<Utc>,
        message_id: Option<String>,
    ) -> Self {
        Self {
            channel,
            endpoint: endpoint.into(),
            label,
            timestamp,
            status: AttemptOutcome::Sent,
            message_id,
            error: None,
        }
    }

    pub fn failed(
        channel: ContactChannel,
        endpoint: impl Into<String>,
        label: Option<String>,
        timestamp: DateTime<Utc>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            channel,
            endpoint: endpoint.into(),
            label,
            timestamp,
            status: AttemptOutcome::Failed,
            message_id: None,
            error: Some(error.into()),
        }
    }
}

/// Attempt history for one lead on one channel + endpoint pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactThread {
    pub lead_id: String,
    pub channel: ContactChannel,
    #[serde(rename = "phoneOrEmail")]
    pub endpoint: String,
    #[serde(default)]
    pub attempts: Vec<ContactAttempt>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_attempt_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub total_attempts: u32,
    #[serde(default)]
    pub has_response: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_at: Option<DateTime<Utc>>,
}

impl ContactThread {
    pub fn new(
        lead_id: impl Into<String>,
        channel: ContactChannel,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            lead_id: lead_id.into(),
            channel,
            endpoint: endpoint.into(),
            attempts: Vec::new(),
            last_attempt_at: None,
            total_attempts: 0,
            has_response: false,
            response_at: None,
        }
    }

    fn push(&mut self, attempt: ContactAttempt) {
        self.last_attempt_at = Some(attempt.timestamp);
        self.attempts.push(attempt);
        self.total_attempts = self.attempts.len() as u32;
    }

    /// Set the response flag; returns true if it was not set before
    fn mark_response(&mut self, at: DateTime<Utc>) -> bool {
        let first = !self.has_response;
        self.has_response = true;
        self.response_at = Some(match self.response_at {
            Some(prev) if prev > at => prev,
            _ => at,
        });
        first
    }

    fn matches(&self, channel: ContactChannel, endpoint: &str) -> bool {
        self.channel == channel && self.endpoint == endpoint
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CallPriority {
    High,
    #[default]
    Normal,
    Low,
}

impl CallPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Normal => "normal",
            Self::Low => "low",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallQueueMeta {
    pub added_at: DateTime<Utc>,
    pub priority: CallPriority,
    pub reason: String,
}

/// Reason recorded when the automatic sequence runs out of channels
pub const SEQUENCE_EXHAUSTED: &str = "sequence_exhausted";

/// Per-lead attempt history plus call queue bookkeeping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ThreadLedger {
    #[serde(default)]
    pub contact_threads: Vec<ContactThread>,
    #[serde(default)]
    pub in_call_queue: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_queue_meta: Option<CallQueueMeta>,
}

impl ThreadLedger {
    pub fn thread(&self, channel: ContactChannel, endpoint: &str) -> Option<&ContactThread> {
        self.contact_threads
            .iter()
            .find(|t| t.matches(channel, endpoint))
    }

    /// Attempts made so far on one endpoint
    pub fn attempts_on(&self, channel: ContactChannel, endpoint: &str) -> u32 {
        self.thread(channel, endpoint)
            .map(|t| t.total_attempts)
            .unwrap_or(0)
    }

    /// Append an attempt to its thread, creating the thread if absent
    pub fn record_attempt(&mut self, lead_id: &str, attempt: ContactAttempt) -> &ContactThread {
        let idx = match self
            .contact_threads
            .iter()
            .position(|t| t.matches(attempt.channel, &attempt.endpoint))
        {
            Some(idx) => idx,
            None => {
                self.contact_threads.push(ContactThread::new(
                    lead_id,
                    attempt.channel,
                    attempt.endpoint.clone(),
                ));
                self.contact_threads.len() - 1
            }
        };

        let thread = &mut self.contact_threads[idx];
        thread.push(attempt);
        thread
    }

    /// Flag a response on a thread. A response on a never-contacted endpoint
    /// creates an empty thread so the response is not lost.
    ///
    /// Returns true the first time the thread is flagged.
    pub fn mark_response(
        &mut self,
        lead_id: &str,
        channel: ContactChannel,
        endpoint: &str,
        at: DateTime<Utc>,
    ) -> bool {
        match self
            .contact_threads
            .iter_mut()
            .find(|t| t.matches(channel, endpoint))
        {
            Some(thread) => thread.mark_response(at),
            None => {
                let mut thread = ContactThread::new(lead_id, channel, endpoint);
                thread.mark_response(at);
                self.contact_threads.push(thread);
                true
            }
        }
    }

    /// Record call queue entry; keeps the original entry if already queued
    pub fn enter_call_queue(&mut self, meta: CallQueueMeta) -> bool {
        if self.in_call_queue {
            return false;
        }
        self.in_call_queue = true;
        self.call_queue_meta = Some(meta);
        true
    }

    pub fn total_attempts(&self) -> u32 {
        self.contact_threads.iter().map(|t| t.total_attempts).sum()
    }

    pub fn has_any_response(&self) -> bool {
        self.contact_threads.iter().any(|t| t.has_response)
    }

    /// First thread that has a response, in ledger order
    pub fn responded_thread(&self) -> Option<&ContactThread> {
        self.contact_threads.iter().find(|t| t.has_response)
    }

    /// Channel of the most recently attempted thread
    pub fn last_channel(&self) -> Option<ContactChannel> {
        self.contact_threads
            .iter()
            .filter_map(|t| t.last_attempt_at.map(|at| (at, t.channel)))
            .max_by_key(|(at, _)| *at)
            .map(|(_, channel)| channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_record_attempt_keeps_count_in_sync() {
        let mut ledger = ThreadLedger::default();
        ledger.record_attempt(
            "l1",
            ContactAttempt::sent(ContactChannel::Sms, "5551234567", None, at(0), None),
        );
        ledger.record_attempt(
            "l1",
            ContactAttempt::failed(ContactChannel::Sms, "5551234567", None, at(10), "timeout"),
        );

        assert_eq!(ledger.contact_threads.len(), 1);
        let thread = ledger.thread(ContactChannel::Sms, "5551234567").unwrap();
        assert_eq!(thread.total_attempts, 2);
        assert_eq!(thread.total_attempts as usize, thread.attempts.len());
        assert_eq!(thread.last_attempt_at, Some(at(10)));
    }

    #[test]
    fn test_threads_are_keyed_by_channel_and_endpoint() {
        let mut ledger = ThreadLedger::default();
        ledger.record_attempt(
            "l1",
            ContactAttempt::sent(ContactChannel::Sms, "5551234567", None, at(0), None),
        );
        ledger.record_attempt(
            "l1",
            ContactAttempt::sent(ContactChannel::Call, "5551234567", None, at(5), None),
        );
        assert_eq!(ledger.contact_threads.len(), 2);
        assert_eq!(ledger.attempts_on(ContactChannel::Sms, "5551234567"), 1);
        assert_eq!(ledger.attempts_on(ContactChannel::Call, "5551234567"), 1);
        assert_eq!(ledger.last_channel(), Some(ContactChannel::Call));
    }

    #[test]
    fn test_mark_response_is_monotonic() {
        let mut ledger = ThreadLedger::default();
        ledger.record_attempt(
            "l1",
            ContactAttempt::sent(ContactChannel::Sms, "5551234567", None, at(0), None),
        );

        assert!(ledger.mark_response("l1", ContactChannel::Sms, "5551234567", at(60)));
        assert!(!ledger.mark_response("l1", ContactChannel::Sms, "5551234567", at(120)));

        assert_eq!(ledger.contact_threads.len(), 1);
        let thread = &ledger.contact_threads[0];
        assert!(thread.has_response);
        assert_eq!(thread.response_at, Some(at(120)));
        assert_eq!(thread.total_attempts, 1);

        // an older event never rewinds response_at
        ledger.mark_response("l1", ContactChannel::Sms, "5551234567", at(30));
        assert_eq!(ledger.contact_threads[0].response_at, Some(at(120)));
    }

    #[test]
    fn test_mark_response_on_unknown_endpoint_creates_empty_thread() {
        let mut ledger = ThreadLedger::default();
        ledger.mark_response("l1", ContactChannel::Email, "a@b.com", at(0));
        let thread = ledger.thread(ContactChannel::Email, "a@b.com").unwrap();
        assert!(thread.has_response);
        assert_eq!(thread.total_attempts, 0);
        assert!(ledger.has_any_response());
    }

    #[test]
    fn test_enter_call_queue_is_idempotent() {
        let mut ledger = ThreadLedger::default();
        let first = CallQueueMeta {
            added_at: at(0),
            priority: CallPriority::Normal,
            reason: SEQUENCE_EXHAUSTED.to_string(),
        };
        assert!(ledger.enter_call_queue(first.clone()));
        assert!(!ledger.enter_call_queue(CallQueueMeta {
            added_at: at(0) + Duration::hours(1),
            priority: CallPriority::High,
            reason: "manual".to_string(),
        }));
        assert_eq!(ledger.call_queue_meta, Some(first));
    }

    #[test]
    fn test_ledger_json_shape() {
        let mut ledger = ThreadLedger::default();
        ledger.record_attempt(
            "l1",
            ContactAttempt::sent(
                ContactChannel::Sms,
                "5551234567",
                Some("primary".into()),
                at(0),
                Some("msg-1".into()),
            ),
        );
        let value = serde_json::to_value(&ledger).unwrap();
        let thread = &value["contactThreads"][0];
        assert_eq!(thread["phoneOrEmail"], "5551234567");
        assert_eq!(thread["totalAttempts"], 1);
        assert_eq!(thread["attempts"][0]["phoneLabel"], "primary");
        assert_eq!(thread["attempts"][0]["status"], "sent");
    }
}
