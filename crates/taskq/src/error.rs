//! Error types for queue operations

use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by stores and publishers
#[derive(Debug, Error)]
pub enum QueueError {
    /// The store could not be reached (connection refused, pool exhausted)
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// The store was reached but the command failed
    #[error("Store error: {0}")]
    Store(String),

    /// Acquiring a store connection took longer than allowed
    #[error("Store operation timed out after {0:?}")]
    Timeout(Duration),

    /// Payload could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unknown time unit: {0}")]
    InvalidTimeUnit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl QueueError {
    /// Whether the error means "no store this tick" rather than a failed command.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_classification() {
        assert!(QueueError::Unavailable("refused".into()).is_unavailable());
        assert!(QueueError::Timeout(Duration::from_secs(1)).is_unavailable());
        assert!(!QueueError::Store("WRONGTYPE".into()).is_unavailable());
        assert!(!QueueError::InvalidTimeUnit("fortnight".into()).is_unavailable());
    }
}
