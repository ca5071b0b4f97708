//! # Store Errors

use thiserror::Error;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Key-value store errors
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The backing storage refused the write for lack of space.
    /// Callers recover by offering a download fallback; the write
    /// is never silently dropped.
    #[error("Storage quota exceeded")]
    QuotaExceeded,

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Corrupt entry at key '{key}': {reason}")]
    Corrupt { key: String, reason: String },
}

impl StoreError {
    pub fn corrupt(key: impl Into<String>, reason: impl Into<String>) -> Self {
        StoreError::Corrupt {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Whether the caller can recover by redirecting the payload elsewhere
    pub fn is_recoverable(&self) -> bool {
        matches!(self, StoreError::QuotaExceeded)
    }
}
