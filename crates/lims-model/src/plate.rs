//! 96-well plate coordinates and well assignments.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ModelError;
use crate::enums::WellType;
use crate::ids::LabNumber;

pub const PLATE_ROWS: u8 = 8;
pub const PLATE_COLUMNS: u8 = 12;
pub const PLATE_WELLS: usize = (PLATE_ROWS as usize) * (PLATE_COLUMNS as usize);

const ROW_LETTERS: &[u8; 8] = b"ABCDEFGH";

/// A well coordinate such as `A01` or `H12`.
///
/// Ordering is row-major (`A01 < A12 < B01`), which is also the fill order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Well {
    row: u8,
    column: u8,
}

impl Well {
    /// Build from zero-based row and column indices.
    pub fn new(row: u8, column: u8) -> Result<Self, ModelError> {
        if row >= PLATE_ROWS || column >= PLATE_COLUMNS {
            return Err(ModelError::InvalidWell(format!("row {row}, column {column}")));
        }
        Ok(Self { row, column })
    }

    /// Build from the row-major position `0..96`.
    pub fn from_index(index: usize) -> Option<Self> {
        if index >= PLATE_WELLS {
            return None;
        }
        let columns = PLATE_COLUMNS as usize;
        Some(Self {
            row: (index / columns) as u8,
            column: (index % columns) as u8,
        })
    }

    pub fn index(&self) -> usize {
        self.row as usize * PLATE_COLUMNS as usize + self.column as usize
    }

    pub fn row(&self) -> u8 {
        self.row
    }

    pub fn column(&self) -> u8 {
        self.column
    }

    pub fn row_letter(&self) -> char {
        ROW_LETTERS[self.row as usize] as char
    }

    /// One-based column number as printed on the plate.
    pub fn column_number(&self) -> u8 {
        self.column + 1
    }

    /// All 96 wells in fill order.
    pub fn all() -> impl Iterator<Item = Well> {
        (0..PLATE_WELLS).filter_map(Well::from_index)
    }
}

impl fmt::Display for Well {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:02}", self.row_letter(), self.column_number())
    }
}

impl FromStr for Well {
    type Err = ModelError;

    /// Accepts `A01` as well as the unpadded `A1`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let invalid = || ModelError::InvalidWell(s.to_string());
        let mut chars = trimmed.chars();
        let letter = chars.next().ok_or_else(invalid)?.to_ascii_uppercase();
        let row = ROW_LETTERS
            .iter()
            .position(|&c| c as char == letter)
            .ok_or_else(invalid)?;
        let digits = chars.as_str();
        if digits.is_empty() || digits.len() > 2 || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        let column: u8 = digits.parse().map_err(|_| invalid())?;
        if column == 0 || column > PLATE_COLUMNS {
            return Err(invalid());
        }
        Well::new(row as u8, column - 1)
    }
}

impl Serialize for Well {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Well {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Sample reference as shown to plate consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleRef {
    pub lab_number: LabNumber,
    #[serde(default)]
    pub name: String,
}

/// Content of a single well.
///
/// A `sample` well carries exactly one sample reference; every other type
/// carries none.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WellAssignment {
    #[serde(rename = "type")]
    well_type: WellType,
    #[serde(default)]
    samples: Vec<SampleRef>,
}

impl WellAssignment {
    pub fn sample(sample: SampleRef) -> Self {
        Self {
            well_type: WellType::Sample,
            samples: vec![sample],
        }
    }

    /// A control or empty well. Passing `WellType::Sample` yields a sample
    /// well without a sample, which `PlateMap::validate` rejects.
    pub fn reserved(well_type: WellType) -> Self {
        Self {
            well_type,
            samples: Vec::new(),
        }
    }

    pub fn empty() -> Self {
        Self::reserved(WellType::Empty)
    }

    pub fn well_type(&self) -> WellType {
        self.well_type
    }

    pub fn sample_ref(&self) -> Option<&SampleRef> {
        self.samples.first()
    }

    pub fn samples(&self) -> &[SampleRef] {
        &self.samples
    }
}

/// Full assignment of a plate, keyed by well in fill order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlateMap(BTreeMap<Well, WellAssignment>);

impl PlateMap {
    pub fn new(wells: BTreeMap<Well, WellAssignment>) -> Self {
        Self(wells)
    }

    pub fn get(&self, well: &Well) -> Option<&WellAssignment> {
        self.0.get(well)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Well, &WellAssignment)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sample wells in fill order.
    pub fn sample_wells(&self) -> impl Iterator<Item = (&Well, &SampleRef)> {
        self.0
            .iter()
            .filter_map(|(well, assignment)| assignment.sample_ref().map(|sample| (well, sample)))
    }

    pub fn lab_numbers(&self) -> Vec<LabNumber> {
        self.sample_wells()
            .map(|(_, sample)| sample.lab_number.clone())
            .collect()
    }

    pub fn well_of(&self, lab_number: &LabNumber) -> Option<Well> {
        self.sample_wells()
            .find(|(_, sample)| &sample.lab_number == lab_number)
            .map(|(well, _)| *well)
    }

    pub fn count_of(&self, well_type: WellType) -> usize {
        self.0
            .values()
            .filter(|assignment| assignment.well_type() == well_type)
            .count()
    }

    /// Check the structural invariants: all 96 wells present, sample wells
    /// hold exactly one sample, other wells hold none, and no sample appears
    /// twice.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.0.len() != PLATE_WELLS {
            return Err(ModelError::InvalidPlate {
                reason: format!("expected {PLATE_WELLS} wells, found {}", self.0.len()),
            });
        }
        let mut seen = BTreeSet::new();
        for (well, assignment) in &self.0 {
            let expected = usize::from(assignment.well_type() == WellType::Sample);
            if assignment.samples().len() != expected {
                return Err(ModelError::InvalidPlate {
                    reason: format!(
                        "well {well} of type {} holds {} samples",
                        assignment.well_type(),
                        assignment.samples().len()
                    ),
                });
            }
            if let Some(sample) = assignment.sample_ref() {
                if !seen.insert(sample.lab_number.clone()) {
                    return Err(ModelError::InvalidPlate {
                        reason: format!("sample {} appears in more than one well", sample.lab_number),
                    });
                }
            }
        }
        Ok(())
    }
}
