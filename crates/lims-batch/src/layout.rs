//! 96-well plate layout.
//!
//! Control wells are reserved first, then samples fill the remaining wells
//! in row-major order (`A01..A12, B01..`). Every well appears in the
//! result; unused wells are `empty`.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use lims_model::{
    BatchKind, PLATE_COLUMNS, PLATE_ROWS, PLATE_WELLS, PlateMap, Sample, SampleRef, Well,
    WellAssignment, WellType,
};

use crate::error::LayoutError;

/// A well held back for a control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlWell {
    pub well: Well,
    #[serde(rename = "type")]
    pub well_type: WellType,
}

impl ControlWell {
    pub fn new(well: Well, well_type: WellType) -> Self {
        Self { well, well_type }
    }
}

/// Which wells are reserved before samples are placed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlPolicy {
    #[serde(default)]
    pub controls: Vec<ControlWell>,
    /// Reserve one allelic ladder per section of this many columns, in
    /// row H at the section's last column.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ladder_section_columns: Option<u8>,
}

fn last_row_well(column: u8) -> Option<Well> {
    Well::new(PLATE_ROWS - 1, column).ok()
}

impl ControlPolicy {
    /// No reserved wells.
    pub fn none() -> Self {
        Self {
            controls: Vec::new(),
            ladder_section_columns: None,
        }
    }

    /// Positive control in H01, negative control in H02.
    pub fn standard() -> Self {
        let controls = [(0, WellType::PositiveControl), (1, WellType::NegativeControl)]
            .into_iter()
            .filter_map(|(column, well_type)| {
                last_row_well(column).map(|well| ControlWell::new(well, well_type))
            })
            .collect();
        Self {
            controls,
            ladder_section_columns: None,
        }
    }

    /// Standard controls plus an allelic ladder per `section_columns` columns.
    pub fn with_ladders(section_columns: u8) -> Self {
        Self {
            ladder_section_columns: Some(section_columns),
            ..Self::standard()
        }
    }

    /// Every reserved well, validated, in plate order.
    pub fn reserved_wells(&self) -> Result<Vec<ControlWell>, LayoutError> {
        let mut reserved: BTreeMap<Well, WellType> = BTreeMap::new();
        let mut reserve = |control: ControlWell| {
            if control.well_type == WellType::Sample {
                return Err(LayoutError::InvalidControlPolicy(format!(
                    "well {} cannot be reserved as a sample well",
                    control.well
                )));
            }
            if reserved.insert(control.well, control.well_type).is_some() {
                return Err(LayoutError::DuplicateControlWell { well: control.well });
            }
            Ok(())
        };

        for control in &self.controls {
            reserve(*control)?;
        }
        if let Some(section) = self.ladder_section_columns {
            if section == 0 || section > PLATE_COLUMNS {
                return Err(LayoutError::InvalidControlPolicy(format!(
                    "ladder section width must be 1..={PLATE_COLUMNS}, got {section}"
                )));
            }
            for start in (0..PLATE_COLUMNS).step_by(usize::from(section)) {
                let last = (start + section).min(PLATE_COLUMNS) - 1;
                if let Some(well) = last_row_well(last) {
                    reserve(ControlWell::new(well, WellType::AllelicLadder))?;
                }
            }
        }

        Ok(reserved
            .into_iter()
            .map(|(well, well_type)| ControlWell::new(well, well_type))
            .collect())
    }

    /// Wells left for samples.
    pub fn capacity(&self) -> Result<usize, LayoutError> {
        Ok(PLATE_WELLS - self.reserved_wells()?.len())
    }
}

impl Default for ControlPolicy {
    fn default() -> Self {
        Self::standard()
    }
}

/// Control policy per batch kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ControlPolicies {
    pub pcr: ControlPolicy,
    pub electrophoresis: ControlPolicy,
    pub rerun: ControlPolicy,
}

impl ControlPolicies {
    pub fn for_kind(&self, kind: BatchKind) -> &ControlPolicy {
        match kind {
            BatchKind::Pcr => &self.pcr,
            BatchKind::Electrophoresis => &self.electrophoresis,
            BatchKind::Rerun => &self.rerun,
        }
    }
}

impl Default for ControlPolicies {
    fn default() -> Self {
        Self {
            pcr: ControlPolicy::standard(),
            electrophoresis: ControlPolicy::with_ladders(PLATE_COLUMNS),
            rerun: ControlPolicy::standard(),
        }
    }
}

/// Place `ordered` samples on a plate, one per well, in the given order.
///
/// Fails without a partial plate when the samples exceed the wells left
/// after reservation or when a lab number repeats.
pub fn layout(ordered: &[Sample], policy: &ControlPolicy) -> Result<PlateMap, LayoutError> {
    let reserved = policy.reserved_wells()?;
    let capacity = PLATE_WELLS - reserved.len();
    if ordered.len() > capacity {
        return Err(LayoutError::PlateCapacityExceeded {
            requested: ordered.len(),
            capacity,
        });
    }
    let mut seen = HashSet::with_capacity(ordered.len());
    for sample in ordered {
        if !seen.insert(&sample.lab_number) {
            return Err(LayoutError::DuplicateSample(sample.lab_number.clone()));
        }
    }

    let reserved_wells: BTreeSet<Well> = reserved.iter().map(|c| c.well).collect();
    let mut wells: BTreeMap<Well, WellAssignment> = reserved
        .iter()
        .map(|control| (control.well, WellAssignment::reserved(control.well_type)))
        .collect();
    let mut free = Well::all().filter(|well| !reserved_wells.contains(well));
    for sample in ordered {
        // Capacity was checked above, so a free well always exists here.
        let Some(well) = free.next() else { break };
        wells.insert(
            well,
            WellAssignment::sample(SampleRef {
                lab_number: sample.lab_number.clone(),
                name: sample.name.clone().unwrap_or_default(),
            }),
        );
    }
    for well in free {
        wells.insert(well, WellAssignment::empty());
    }

    tracing::debug!(
        samples = ordered.len(),
        controls = reserved.len(),
        "plate laid out"
    );
    Ok(PlateMap::new(wells))
}
