//! Error types for paternity comparison.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaternityError {
    /// Child or alleged parent could not be picked from the sample ids.
    ///
    /// Carries every available id so the caller can ask for an explicit
    /// role mapping.
    #[error("could not identify child and alleged parent among: {}", available.join(", "))]
    AmbiguousRoles { available: Vec<String> },

    #[error("no readings for sample '{0}'")]
    UnknownSample(String),

    #[error("sample '{0}' cannot be both child and alleged parent")]
    SameSample(String),
}

pub type Result<T> = std::result::Result<T, PaternityError>;
