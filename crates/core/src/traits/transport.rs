//! Outbound message transport capability

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

/// Provider acknowledgement for an accepted message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SmsReceipt {
    pub message_id: Option<String>,
}

/// SMS delivery, implemented by a provider client outside the core
///
/// Failures are reported as [`crate::Error::Transport`]. The sequence engine
/// records them as failed attempts; they never abort a batch.
#[async_trait]
pub trait MessageTransport: Send + Sync {
    async fn send_sms(&self, to: &str, body: &str) -> Result<SmsReceipt>;

    /// Provider name for logging
    fn provider(&self) -> &str;
}
