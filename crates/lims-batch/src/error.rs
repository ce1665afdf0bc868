//! Error types for allocation, layout and batch creation.

use lims_model::{BatchKind, LabNumber, ModelError, RepositoryError, Well};
use lims_workflow::WorkflowError;
use thiserror::Error;

/// Plate layout failures. No partial plate is ever returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    #[error("{requested} samples do not fit on a plate with {capacity} free wells")]
    PlateCapacityExceeded { requested: usize, capacity: usize },

    #[error("invalid control policy: {0}")]
    InvalidControlPolicy(String),

    #[error("control well {well} is reserved twice")]
    DuplicateControlWell { well: Well },

    #[error("sample {0} listed more than once")]
    DuplicateSample(LabNumber),
}

/// Batch creation failures.
#[derive(Debug, Error)]
pub enum BatchError {
    /// Nothing left to place after filtering.
    #[error("no eligible samples for a {kind} batch")]
    EmptySelection { kind: BatchKind },

    /// A selected sample is not eligible for this batch kind.
    #[error("sample {lab_number} is not eligible for a {kind} batch")]
    NotEligible {
        lab_number: LabNumber,
        kind: BatchKind,
    },

    #[error(transparent)]
    Layout(#[from] LayoutError),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("batch creation cancelled before commit")]
    Cancelled,
}

impl BatchError {
    /// True for errors the caller can fix by changing the request.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::EmptySelection { .. } | Self::NotEligible { .. } | Self::Layout(_) => true,
            Self::Workflow(err) => err.is_validation(),
            Self::Model(_) | Self::Repository(_) | Self::Cancelled => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, BatchError>;
