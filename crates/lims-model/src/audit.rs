use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::WorkflowStatus;
use crate::ids::LabNumber;

/// Append-only record of one status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub sample_id: LabNumber,
    pub from: WorkflowStatus,
    pub to: WorkflowStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub actor: String,
}
