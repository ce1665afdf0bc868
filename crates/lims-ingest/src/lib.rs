//! Ingestion of fragment-analysis output.
//!
//! - [`genemapper`]: tab-delimited allele tables exported by GeneMapper,
//!   parsed best-effort with a per-row skip report.
//! - [`abif`]: directory and metadata access for ABIF (`.fsa`) files.

pub mod abif;
pub mod error;
pub mod genemapper;
pub mod reader;

pub use abif::{AbifError, AbifFile, AbifSummary, DirEntry};
pub use error::{IngestError, Result};
pub use genemapper::{MalformedRow, ParseOutcome, group_by_sample, parse};
pub use reader::{read_abif, read_genemapper};
