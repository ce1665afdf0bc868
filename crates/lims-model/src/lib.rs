//! Data model for the paternity-testing LIMS.
//!
//! Samples, batches, plate wells, allele readings and paternity reports are
//! plain serde records. Identifiers are validated newtypes and every status
//! or type vocabulary is a closed enum.

pub mod audit;
pub mod batch;
pub mod enums;
pub mod error;
pub mod genotype;
pub mod ids;
pub mod plate;
pub mod report;
pub mod repository;
pub mod sample;

pub use audit::AuditEntry;
pub use batch::Batch;
pub use enums::{BatchKind, Conclusion, Priority, Relation, WellType, WorkflowStatus};
pub use error::{ModelError, RepositoryError, Result};
pub use genotype::LocusReading;
pub use ids::{BatchNumber, CaseNumber, LabNumber};
pub use plate::{PLATE_COLUMNS, PLATE_ROWS, PLATE_WELLS, PlateMap, SampleRef, Well, WellAssignment};
pub use report::{MarkerResult, PaternityReport};
pub use repository::{BatchRepository, SampleFilter, SampleRepository};
pub use sample::{BatchRef, Sample};
