//! Error types for allele-table and ABIF ingestion.

use std::path::PathBuf;
use thiserror::Error;

use crate::abif::AbifError;

/// Errors that stop an ingestion call.
///
/// Individual malformed table rows are not errors; they are collected in
/// [`crate::ParseOutcome::skipped`].
#[derive(Debug, Error)]
pub enum IngestError {
    // === File System Errors ===
    /// Input file not found.
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    /// Failed to read file.
    #[error("failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File exceeds the maximum size for loading.
    #[error("file too large: {path} ({size} bytes, max {max_size} bytes)")]
    FileTooLarge {
        path: PathBuf,
        size: u64,
        max_size: u64,
    },

    // === Encoding Errors ===
    /// File uses an encoding other than UTF-8.
    #[error("unsupported encoding in {path}: {encoding} (only UTF-8 is supported)")]
    UnsupportedEncoding {
        path: PathBuf,
        encoding: &'static str,
    },

    /// File is not valid UTF-8 text.
    #[error("file is not valid UTF-8: {path}")]
    InvalidUtf8 { path: PathBuf },

    // === Table Errors ===
    /// Input holds no header line.
    #[error("allele table is empty")]
    EmptyInput,

    /// Low-level tab-delimited reader failure.
    #[error("failed to read allele table: {source}")]
    Table {
        #[source]
        source: csv::Error,
    },

    // === ABIF Errors ===
    /// The file is not a readable ABIF container.
    #[error("invalid ABIF file {path}: {source}")]
    Abif {
        path: PathBuf,
        #[source]
        source: AbifError,
    },
}

/// Result type for ingestion operations.
pub type Result<T> = std::result::Result<T, IngestError>;
