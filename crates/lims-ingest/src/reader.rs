//! File access for allele tables and ABIF files.

use std::path::Path;

use crate::abif::AbifFile;
use crate::error::{IngestError, Result};
use crate::genemapper::{self, ParseOutcome};

/// Maximum allele-table size accepted (50 MB).
pub const MAX_TABLE_FILE_SIZE: u64 = 50 * 1024 * 1024;

/// Maximum ABIF file size accepted (100 MB).
pub const MAX_ABIF_FILE_SIZE: u64 = 100 * 1024 * 1024;

fn io_error(path: &Path, e: std::io::Error) -> IngestError {
    if e.kind() == std::io::ErrorKind::NotFound {
        IngestError::FileNotFound {
            path: path.to_path_buf(),
        }
    } else {
        IngestError::FileRead {
            path: path.to_path_buf(),
            source: e,
        }
    }
}

/// Read a whole file after checking it against `max_size`.
fn read_bytes(path: &Path, max_size: u64) -> Result<Vec<u8>> {
    let metadata = std::fs::metadata(path).map_err(|e| io_error(path, e))?;
    if metadata.len() > max_size {
        return Err(IngestError::FileTooLarge {
            path: path.to_path_buf(),
            size: metadata.len(),
            max_size,
        });
    }
    std::fs::read(path).map_err(|e| io_error(path, e))
}

/// Decode table bytes as UTF-8, rejecting UTF-16 exports up front.
fn decode_text(path: &Path, bytes: Vec<u8>) -> Result<String> {
    if bytes.starts_with(&[0xFF, 0xFE]) {
        return Err(IngestError::UnsupportedEncoding {
            path: path.to_path_buf(),
            encoding: "UTF-16 LE",
        });
    }
    if bytes.starts_with(&[0xFE, 0xFF]) {
        return Err(IngestError::UnsupportedEncoding {
            path: path.to_path_buf(),
            encoding: "UTF-16 BE",
        });
    }
    String::from_utf8(bytes).map_err(|_| IngestError::InvalidUtf8 {
        path: path.to_path_buf(),
    })
}

/// Read and parse a GeneMapper export from disk.
pub fn read_genemapper(path: &Path) -> Result<ParseOutcome> {
    let bytes = read_bytes(path, MAX_TABLE_FILE_SIZE)?;
    let text = decode_text(path, bytes)?;
    let outcome = genemapper::parse(&text)?;
    tracing::info!(
        path = %path.display(),
        readings = outcome.readings.len(),
        skipped = outcome.skipped_count(),
        "loaded allele table"
    );
    Ok(outcome)
}

/// Read and parse an ABIF (.fsa) file from disk.
pub fn read_abif(path: &Path) -> Result<AbifFile> {
    let bytes = read_bytes(path, MAX_ABIF_FILE_SIZE)?;
    AbifFile::parse(&bytes).map_err(|source| IngestError::Abif {
        path: path.to_path_buf(),
        source,
    })
}
