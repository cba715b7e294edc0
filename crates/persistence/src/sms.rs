//! Simulated SMS transport
//!
//! Messages are NOT sent anywhere. Each accepted message is kept in an
//! in-process outbox with a generated id so the worker can run end to end
//! without a provider account. Numbers can be scripted to fail, and a fixed
//! latency can be added to exercise send timeouts.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use leadflow_core::{Error, MessageTransport, Result, SmsReceipt};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmsStatus {
    SimulatedSent,
    Failed,
}

impl SmsStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SimulatedSent => "simulated_sent",
            Self::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmsMessage {
    pub message_id: Uuid,
    pub phone_number: String,
    pub message_text: String,
    pub status: SmsStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct SimulatedSmsTransport {
    outbox: Mutex<Vec<SmsMessage>>,
    failing_numbers: Mutex<HashSet<String>>,
    latency: Option<Duration>,
}

impl SimulatedSmsTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every send by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Reject every message sent to `phone`
    pub fn fail_number(&self, phone: impl Into<String>) {
        self.failing_numbers.lock().insert(phone.into());
    }

    pub fn restore_number(&self, phone: &str) {
        self.failing_numbers.lock().remove(phone);
    }

    /// Every message handed to the transport, failed ones included
    pub fn messages(&self) -> Vec<SmsMessage> {
        self.outbox.lock().clone()
    }

    pub fn sent_to(&self, phone: &str) -> Vec<SmsMessage> {
        self.outbox
            .lock()
            .iter()
            .filter(|m| m.phone_number == phone && m.status == SmsStatus::SimulatedSent)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl MessageTransport for SimulatedSmsTransport {
    async fn send_sms(&self, to: &str, body: &str) -> Result<SmsReceipt> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let message_id = Uuid::new_v4();
        let rejected = self.failing_numbers.lock().contains(to);
        let status = if rejected {
            SmsStatus::Failed
        } else {
            SmsStatus::SimulatedSent
        };

        self.outbox.lock().push(SmsMessage {
            message_id,
            phone_number: to.to_string(),
            message_text: body.to_string(),
            status,
            created_at: Utc::now(),
        });

        if rejected {
            tracing::warn!(phone = %to, "Simulated SMS rejected");
            return Err(Error::transport(format!("provider rejected message to {}", to)));
        }

        tracing::info!(
            message_id = %message_id,
            phone = %to,
            status = status.as_str(),
            "[SIMULATED] SMS sent"
        );

        Ok(SmsReceipt {
            message_id: Some(message_id.to_string()),
        })
    }

    fn provider(&self) -> &str {
        "simulated"
    }
}
