//! # Reconciliation Errors

use thiserror::Error;

use crate::store::StoreError;

/// Result type for reconciliation
pub type ReconcileResult<T> = Result<T, ReconcileError>;

/// Blob reconciliation errors
#[derive(Debug, Clone, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Fetching or encoding a new blob's bytes failed. Nothing was
    /// written: the write phase only runs after every fetch succeeds.
    #[error("Blob fetch failed for '{blob_id}': {reason}")]
    Fetch { blob_id: String, reason: String },
}

impl ReconcileError {
    pub fn fetch(blob_id: impl Into<String>, reason: impl Into<String>) -> Self {
        ReconcileError::Fetch {
            blob_id: blob_id.into(),
            reason: reason.into(),
        }
    }
}
