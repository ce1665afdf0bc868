//! Physical batches (plates) and their provenance.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::BatchKind;
use crate::ids::{BatchNumber, LabNumber};
use crate::plate::PlateMap;

/// A PCR, electrophoresis or rerun plate.
///
/// Created together with its well map and never edited afterwards;
/// corrections go through a rerun batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Batch {
    pub batch_number: BatchNumber,
    pub kind: BatchKind,
    pub operator: String,
    pub created_date: DateTime<Utc>,
    pub well_map: PlateMap,
    /// For electrophoresis plates, the PCR (or rerun) plate the products came from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_batch: Option<BatchNumber>,
}

impl Batch {
    pub fn sample_count(&self) -> usize {
        self.well_map.sample_wells().count()
    }

    /// Lab numbers in well order.
    pub fn lab_numbers(&self) -> Vec<LabNumber> {
        self.well_map.lab_numbers()
    }

    pub fn contains(&self, lab_number: &LabNumber) -> bool {
        self.well_map.well_of(lab_number).is_some()
    }
}
