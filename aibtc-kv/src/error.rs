use std::time::Duration;

use thiserror::Error;

/// Error types for key-value store operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KvError {
    /// The operation did not complete within its deadline
    #[error("Store operation timed out after {0:?}")]
    Timeout(Duration),

    /// The store could not be reached
    #[error("Failed to connect to store: {0}")]
    Connection(String),

    /// The store answered with an error
    #[error("Store operation failed: {0}")]
    Backend(String),
}

impl KvError {
    /// Whether retrying the same call can reasonably succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Connection(_))
    }
}
