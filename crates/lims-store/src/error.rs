//! Store error types.
//!
//! All store operations return structured errors that provide
//! user-friendly messages and optional remediation hints.

use std::path::PathBuf;

use lims_model::RepositoryError;
use thiserror::Error;

/// Store operation error.
#[derive(Debug, Error)]
pub enum StoreError {
    /// File I/O error.
    #[error("Failed to {operation} file: {path}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A stored file could not be parsed.
    #[error("Invalid store file: {path}")]
    InvalidFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Serialization error.
    #[error("Failed to serialize store data")]
    Serialization {
        #[source]
        source: serde_json::Error,
    },

    /// Atomic write failed (temp file couldn't be renamed).
    #[error("Failed to complete save operation")]
    AtomicWriteFailed {
        temp_path: PathBuf,
        target_path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Intake of a lab number that is already registered.
    #[error("Sample already registered: {lab_number}")]
    DuplicateSample { lab_number: String },

    /// The stored sample changed after the caller read it.
    #[error("Sample {lab_number} changed concurrently: {reason}")]
    Conflict { lab_number: String, reason: String },

    /// Another thread panicked while holding the store lock.
    #[error("Store lock poisoned")]
    LockPoisoned,
}

impl StoreError {
    /// Get a user-friendly message for this error.
    pub fn user_message(&self) -> String {
        match self {
            Self::Io {
                operation, path, ..
            } => format!("Could not {} the file at {}", operation, path.display()),
            Self::InvalidFormat { path, source } => format!(
                "The store file at {} is not valid JSON for this store: {}",
                path.display(),
                source
            ),
            Self::Serialization { .. } => "An error occurred while saving store data.".to_string(),
            Self::AtomicWriteFailed { target_path, .. } => format!(
                "Could not save the file to {}. Please check disk space and permissions.",
                target_path.display()
            ),
            Self::DuplicateSample { lab_number } => {
                format!("Lab number {lab_number} is already registered; samples are never replaced.")
            }
            Self::Conflict { lab_number, reason } => {
                format!("Sample {lab_number} was updated by another process ({reason}).")
            }
            Self::LockPoisoned => {
                "The store is in an inconsistent state after an earlier failure.".to_string()
            }
        }
    }

    /// Get a suggestion for how to resolve this error.
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::Io { operation, .. } => {
                if *operation == "read" {
                    Some("Check that the store directory exists and is readable.".into())
                } else {
                    Some("Check that you have permission to write to the store directory.".into())
                }
            }
            Self::InvalidFormat { .. } => {
                Some("Restore the file from a backup or remove it to start empty.".into())
            }
            Self::Serialization { .. } => None,
            Self::AtomicWriteFailed { .. } => {
                Some("Free up disk space or point --store at a different location.".into())
            }
            Self::DuplicateSample { .. } => {
                Some("Register a rerun as a new lab number linked to the same case.".into())
            }
            Self::Conflict { .. } => {
                Some("Nothing was saved. Check the sample status and run the command again.".into())
            }
            Self::LockPoisoned => Some("Restart the process.".into()),
        }
    }
}

impl From<StoreError> for RepositoryError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateSample { lab_number } => RepositoryError::Duplicate {
                entity: "sample",
                id: lab_number,
            },
            other => RepositoryError::backend_with_source(other.user_message(), other),
        }
    }
}

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
