//! # Save Errors

use thiserror::Error;

use crate::reconcile::ReconcileError;
use crate::store::StoreError;

/// Result type for save orchestration
pub type SaveResult<T> = Result<T, SaveError>;

/// Save orchestration errors
#[derive(Debug, Clone, Error)]
pub enum SaveError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    /// The payload source could not produce the data to save
    #[error("Payload unavailable: {0}")]
    Payload(String),

    /// The download fallback itself failed
    #[error("Fallback delivery failed: {0}")]
    Fallback(String),

    #[error("No record with graph id '{0}'")]
    UnknownGraph(String),
}

impl SaveError {
    /// Whether this failure is the quota case the fallback recovers
    pub fn is_quota(&self) -> bool {
        matches!(
            self,
            SaveError::Store(StoreError::QuotaExceeded)
                | SaveError::Reconcile(ReconcileError::Store(StoreError::QuotaExceeded))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_detection_through_both_paths() {
        assert!(SaveError::from(StoreError::QuotaExceeded).is_quota());
        assert!(SaveError::from(ReconcileError::from(StoreError::QuotaExceeded)).is_quota());
        assert!(!SaveError::Payload("gone".into()).is_quota());
    }
}
