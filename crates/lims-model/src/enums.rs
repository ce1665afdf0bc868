//! Closed enumerations for laboratory concepts.
//!
//! Workflow statuses, relations and well types travel as strings in request
//! payloads and stored records. These enums give each a fixed vocabulary so
//! that a typo fails at construction time instead of slipping into storage.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ModelError;

/// Lab-stage status of a sample.
///
/// The main pipeline runs from `SampleCollected` to `ReportSent`; the two
/// rerun states loop back into PCR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    SampleCollected,
    PcrReady,
    PcrBatched,
    PcrCompleted,
    ElectroReady,
    ElectroBatched,
    ElectroCompleted,
    AnalysisReady,
    AnalysisCompleted,
    ReportReady,
    ReportSent,
    RerunRequired,
    RerunBatched,
}

impl WorkflowStatus {
    pub const ALL: [WorkflowStatus; 13] = [
        WorkflowStatus::SampleCollected,
        WorkflowStatus::PcrReady,
        WorkflowStatus::PcrBatched,
        WorkflowStatus::PcrCompleted,
        WorkflowStatus::ElectroReady,
        WorkflowStatus::ElectroBatched,
        WorkflowStatus::ElectroCompleted,
        WorkflowStatus::AnalysisReady,
        WorkflowStatus::AnalysisCompleted,
        WorkflowStatus::ReportReady,
        WorkflowStatus::ReportSent,
        WorkflowStatus::RerunRequired,
        WorkflowStatus::RerunBatched,
    ];

    /// Returns the wire name used in requests and stored records.
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStatus::SampleCollected => "sample_collected",
            WorkflowStatus::PcrReady => "pcr_ready",
            WorkflowStatus::PcrBatched => "pcr_batched",
            WorkflowStatus::PcrCompleted => "pcr_completed",
            WorkflowStatus::ElectroReady => "electro_ready",
            WorkflowStatus::ElectroBatched => "electro_batched",
            WorkflowStatus::ElectroCompleted => "electro_completed",
            WorkflowStatus::AnalysisReady => "analysis_ready",
            WorkflowStatus::AnalysisCompleted => "analysis_completed",
            WorkflowStatus::ReportReady => "report_ready",
            WorkflowStatus::ReportSent => "report_sent",
            WorkflowStatus::RerunRequired => "rerun_required",
            WorkflowStatus::RerunBatched => "rerun_batched",
        }
    }

    /// True for every state at or after `PcrCompleted`, rerun states included.
    pub fn is_post_pcr(&self) -> bool {
        !matches!(
            self,
            WorkflowStatus::SampleCollected | WorkflowStatus::PcrReady | WorkflowStatus::PcrBatched
        )
    }

    /// True for the states in which a sample sits on a physical plate.
    pub fn is_batched(&self) -> bool {
        matches!(
            self,
            WorkflowStatus::PcrBatched | WorkflowStatus::ElectroBatched | WorkflowStatus::RerunBatched
        )
    }

    pub fn is_rerun(&self) -> bool {
        matches!(
            self,
            WorkflowStatus::RerunRequired | WorkflowStatus::RerunBatched
        )
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkflowStatus {
    type Err = ModelError;

    /// Parses the wire name. Matching ignores case and surrounding whitespace
    /// but nothing else: `pcr-ready` is not `pcr_ready`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        WorkflowStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| ModelError::UnknownStatus(s.to_string()))
    }
}

/// Role of a sample's donor within its case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Relation {
    Child,
    AllegedFather,
    Mother,
    /// Any other free-text relation (grandparent, sibling, ...).
    Other(String),
}

impl Relation {
    pub fn as_str(&self) -> &str {
        match self {
            Relation::Child => "child",
            Relation::AllegedFather => "alleged_father",
            Relation::Mother => "mother",
            Relation::Other(value) => value,
        }
    }

    /// Parses free text leniently. Numbered children (`child1`, `Child 2`)
    /// are children; anything unrecognised is kept verbatim as `Other`.
    pub fn parse(value: &str) -> Self {
        let trimmed = value.trim();
        let normalized: String = trimmed
            .to_ascii_lowercase()
            .chars()
            .map(|c| if c == ' ' || c == '-' { '_' } else { c })
            .collect();
        if let Some(rest) = normalized.strip_prefix("child") {
            if rest.trim_start_matches('_').chars().all(|c| c.is_ascii_digit()) {
                return Relation::Child;
            }
        }
        match normalized.as_str() {
            "alleged_father" | "father" | "af" => Relation::AllegedFather,
            "mother" => Relation::Mother,
            _ => Relation::Other(trimmed.to_string()),
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for Relation {
    fn from(value: String) -> Self {
        Relation::parse(&value)
    }
}

impl From<Relation> for String {
    fn from(value: Relation) -> Self {
        value.as_str().to_string()
    }
}

/// Processing priority requested at intake.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    #[default]
    Normal,
    Urgent,
}

/// Kind of physical batch a plate belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchKind {
    Pcr,
    Electrophoresis,
    Rerun,
}

impl BatchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchKind::Pcr => "pcr",
            BatchKind::Electrophoresis => "electrophoresis",
            BatchKind::Rerun => "rerun",
        }
    }

    /// Prefix used when generating batch numbers.
    pub fn prefix(&self) -> &'static str {
        match self {
            BatchKind::Pcr => "PCR",
            BatchKind::Electrophoresis => "EP",
            BatchKind::Rerun => "RR",
        }
    }

    /// Statuses from which a sample may be placed on a batch of this kind.
    pub fn batchable_statuses(&self) -> &'static [WorkflowStatus] {
        match self {
            BatchKind::Pcr => &[WorkflowStatus::SampleCollected, WorkflowStatus::PcrReady],
            BatchKind::Electrophoresis => {
                &[WorkflowStatus::PcrCompleted, WorkflowStatus::ElectroReady]
            }
            BatchKind::Rerun => &[WorkflowStatus::RerunRequired],
        }
    }

    /// Status every sample on a batch of this kind ends up in.
    pub fn batched_status(&self) -> WorkflowStatus {
        match self {
            BatchKind::Pcr => WorkflowStatus::PcrBatched,
            BatchKind::Electrophoresis => WorkflowStatus::ElectroBatched,
            BatchKind::Rerun => WorkflowStatus::RerunBatched,
        }
    }
}

impl fmt::Display for BatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BatchKind {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pcr" => Ok(BatchKind::Pcr),
            "electrophoresis" | "electro" | "ep" => Ok(BatchKind::Electrophoresis),
            "rerun" => Ok(BatchKind::Rerun),
            _ => Err(ModelError::UnknownBatchKind(s.to_string())),
        }
    }
}

/// What occupies a plate well.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WellType {
    Sample,
    AllelicLadder,
    PositiveControl,
    NegativeControl,
    Empty,
}

impl WellType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WellType::Sample => "sample",
            WellType::AllelicLadder => "allelic_ladder",
            WellType::PositiveControl => "positive_control",
            WellType::NegativeControl => "negative_control",
            WellType::Empty => "empty",
        }
    }

    /// Short label for grid renderings.
    pub fn code(&self) -> &'static str {
        match self {
            WellType::Sample => "S",
            WellType::AllelicLadder => "LAD",
            WellType::PositiveControl => "POS",
            WellType::NegativeControl => "NEG",
            WellType::Empty => "-",
        }
    }

    pub fn is_control(&self) -> bool {
        matches!(
            self,
            WellType::AllelicLadder | WellType::PositiveControl | WellType::NegativeControl
        )
    }
}

impl fmt::Display for WellType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WellType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sample" => Ok(WellType::Sample),
            "allelic_ladder" | "ladder" => Ok(WellType::AllelicLadder),
            "positive_control" | "positive" => Ok(WellType::PositiveControl),
            "negative_control" | "negative" => Ok(WellType::NegativeControl),
            "empty" => Ok(WellType::Empty),
            _ => Err(ModelError::UnknownWellType(s.to_string())),
        }
    }
}

/// Outcome of a paternity comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Conclusion {
    NotExcluded,
    Excluded,
    Inconclusive,
}

impl Conclusion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Conclusion::NotExcluded => "not_excluded",
            Conclusion::Excluded => "excluded",
            Conclusion::Inconclusive => "inconclusive",
        }
    }

    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Conclusion::NotExcluded => "Not excluded",
            Conclusion::Excluded => "Excluded",
            Conclusion::Inconclusive => "Inconclusive",
        }
    }
}

impl fmt::Display for Conclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
