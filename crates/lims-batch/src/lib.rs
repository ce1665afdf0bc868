//! Plate building for PCR, electrophoresis and rerun batches.
//!
//! The pure pieces ([`select_eligible`], [`group_by_case`], [`layout`],
//! [`build_batch`]) work on plain model values. [`BatchService`] ties them
//! to the repositories and the workflow engine's routing and locks.

mod allocator;
mod error;
mod layout;
mod service;

pub use allocator::{
    CaseGroup, CaseSelection, DefaultRanking, RelationRanking, build_batch, common_source_batch,
    flatten, group_by_case, group_by_case_with, select_eligible,
};
pub use error::{BatchError, LayoutError, Result};
pub use layout::{ControlPolicies, ControlPolicy, ControlWell, layout};
pub use service::{BatchService, CreateBatchRequest};
