//! Error types for workflow operations.

use lims_model::{LabNumber, ModelError, RepositoryError, WorkflowStatus};
use thiserror::Error;

/// Errors returned by the workflow engine.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Requested move is not in the allow-list (or names no known status).
    #[error("invalid transition for sample {lab_number}: {from} -> {to}")]
    InvalidTransition {
        lab_number: LabNumber,
        from: WorkflowStatus,
        to: String,
    },

    #[error("sample not found: {0}")]
    SampleNotFound(LabNumber),

    /// Malformed request payload (blank or invalid sample id, empty list).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("operation cancelled before commit")]
    Cancelled,

    #[error("resource lock poisoned")]
    LockPoisoned,

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
}

impl WorkflowError {
    /// True for errors caused by the request rather than the backend.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidTransition { .. }
                | Self::SampleNotFound(_)
                | Self::InvalidRequest(_)
                | Self::Model(_)
        )
    }
}

/// Result type for workflow operations.
pub type Result<T> = std::result::Result<T, WorkflowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_transition_display() {
        let err = WorkflowError::InvalidTransition {
            lab_number: LabNumber::new("25_001").unwrap(),
            from: WorkflowStatus::PcrReady,
            to: "report_sent".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid transition for sample 25_001: pcr_ready -> report_sent"
        );
        assert!(err.is_validation());
    }

    #[test]
    fn test_repository_error_is_not_validation() {
        let err: WorkflowError = RepositoryError::backend("disk full").into();
        assert!(!err.is_validation());
    }
}
