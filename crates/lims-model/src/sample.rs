//! Sample records and their batch back-references.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::enums::{BatchKind, Priority, Relation, WorkflowStatus};
use crate::ids::{BatchNumber, CaseNumber, LabNumber};

/// Back-reference from a sample to a batch it was placed on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRef {
    pub kind: BatchKind,
    pub batch_number: BatchNumber,
}

/// A biological sample tracked through the lab pipeline.
///
/// `workflow_status` is only changed by the workflow engine. `batch_id`
/// points at the batch currently holding the sample; `batch_history` keeps
/// every batch the sample has been on, oldest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sample {
    pub lab_number: LabNumber,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub case_number: Option<CaseNumber>,
    /// Donor name as printed on plate sheets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub relation: Relation,
    pub workflow_status: WorkflowStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<BatchNumber>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub batch_history: Vec<BatchRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_date: Option<NaiveDate>,
    #[serde(default)]
    pub priority: Priority,
}

impl Sample {
    /// Create a freshly collected sample.
    pub fn new(lab_number: LabNumber, relation: Relation) -> Self {
        Self {
            lab_number,
            case_number: None,
            name: None,
            relation,
            workflow_status: WorkflowStatus::SampleCollected,
            batch_id: None,
            batch_history: Vec::new(),
            collection_date: None,
            priority: Priority::Normal,
        }
    }

    #[must_use]
    pub fn with_case(mut self, case_number: CaseNumber) -> Self {
        self.case_number = Some(case_number);
        self
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_status(mut self, status: WorkflowStatus) -> Self {
        self.workflow_status = status;
        self
    }

    #[must_use]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub fn with_collection_date(mut self, date: NaiveDate) -> Self {
        self.collection_date = Some(date);
        self
    }

    pub fn is_urgent(&self) -> bool {
        self.priority == Priority::Urgent
    }

    /// Most recent batch of one of the given kinds.
    pub fn last_batch_of(&self, kinds: &[BatchKind]) -> Option<&BatchRef> {
        self.batch_history
            .iter()
            .rev()
            .find(|entry| kinds.contains(&entry.kind))
    }

    /// Record placement on a batch.
    pub fn assign_batch(&mut self, kind: BatchKind, batch_number: BatchNumber) {
        self.batch_history.push(BatchRef {
            kind,
            batch_number: batch_number.clone(),
        });
        self.batch_id = Some(batch_number);
    }
}
