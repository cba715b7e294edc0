//! Error types shared by every crate in the pipeline

use thiserror::Error;

/// Result alias using the pipeline [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Malformed input to a public operation, rejected before any I/O
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Lead not found: {0}")]
    NotFound(String),

    /// Message transport failed (timeout, provider rejection)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Record store unavailable or returned malformed data
    #[error("Store error: {0}")]
    Store(String),

    /// Optimistic update lost the race too many times
    #[error("Concurrent update conflict on lead {lead_id} after {attempts} attempts")]
    Conflict { lead_id: String, attempts: u32 },

    #[error("Invalid {kind} transition: {from} -> {to}")]
    InvalidTransition {
        kind: &'static str,
        from: String,
        to: String,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(lead_id: impl Into<String>) -> Self {
        Self::NotFound(lead_id.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Whether the caller may retry the operation on a later tick
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Store(_) | Self::Conflict { .. }
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(Error::transport("timeout").is_retryable());
        assert!(Error::store("down").is_retryable());
        assert!(Error::Conflict {
            lead_id: "l1".into(),
            attempts: 5
        }
        .is_retryable());
        assert!(!Error::validation("empty id").is_retryable());
        assert!(!Error::not_found("l1").is_retryable());
    }

    #[test]
    fn test_display() {
        let err = Error::InvalidTransition {
            kind: "status",
            from: "converted".into(),
            to: "queued".into(),
        };
        assert_eq!(err.to_string(), "Invalid status transition: converted -> queued");
    }
}
