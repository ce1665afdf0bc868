use thiserror::Error;

/// Errors raised while constructing or validating model values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("invalid lab number: '{0}'")]
    InvalidLabNumber(String),
    #[error("invalid case number: '{0}'")]
    InvalidCaseNumber(String),
    #[error("invalid batch number: '{0}'")]
    InvalidBatchNumber(String),
    #[error("invalid well coordinate: '{0}'")]
    InvalidWell(String),
    #[error("unknown workflow status: '{0}'")]
    UnknownStatus(String),
    #[error("unknown batch kind: '{0}'")]
    UnknownBatchKind(String),
    #[error("unknown well type: '{0}'")]
    UnknownWellType(String),
    #[error("invalid plate map: {reason}")]
    InvalidPlate { reason: String },
}

/// Errors surfaced by repository implementations.
///
/// The core never owns storage; whatever backs a repository reports its
/// failures through this type so callers can wrap it in their own error.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("{entity} already exists: {id}")]
    Duplicate { entity: &'static str, id: String },

    #[error("storage backend failed: {message}")]
    Backend {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl RepositoryError {
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
            source: None,
        }
    }

    pub fn backend_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Backend {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

pub type Result<T> = std::result::Result<T, ModelError>;
