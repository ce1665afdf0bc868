//! Workflow engine: validates status moves and commits them with audit entries.
//!
//! The pure helpers (`apply_transition`, `apply_route`, `parse_target`)
//! operate on plain `Sample` values and are reused by batch creation. The
//! `WorkflowEngine` adds locking and persistence on top of them.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span, warn};

use lims_model::{AuditEntry, LabNumber, Sample, SampleRepository, WorkflowStatus};

use crate::cancel::CancelToken;
use crate::error::{Result, WorkflowError};
use crate::locks::{ResourceLocks, sample_key};
use crate::transitions::{can_transition, route};

/// A validated status change, not yet persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub sample: Sample,
    pub audit: AuditEntry,
}

/// Resolve a requested status name against `sample`.
///
/// An unknown name is reported as an invalid transition, the same as a
/// known status outside the allow-list.
pub fn parse_target(sample: &Sample, raw: &str) -> Result<WorkflowStatus> {
    raw.parse::<WorkflowStatus>()
        .map_err(|_| WorkflowError::InvalidTransition {
            lab_number: sample.lab_number.clone(),
            from: sample.workflow_status,
            to: raw.trim().to_string(),
        })
}

/// Validate and apply one move. Leaving a batched status releases the
/// sample's current plate reference.
pub fn apply_transition(
    sample: &Sample,
    target: WorkflowStatus,
    note: Option<&str>,
    actor: &str,
    at: DateTime<Utc>,
) -> Result<Transition> {
    let from = sample.workflow_status;
    if !can_transition(from, target) {
        return Err(WorkflowError::InvalidTransition {
            lab_number: sample.lab_number.clone(),
            from,
            to: target.as_str().to_string(),
        });
    }
    let mut next = sample.clone();
    next.workflow_status = target;
    if from.is_batched() {
        next.batch_id = None;
    }
    let audit = AuditEntry {
        sample_id: sample.lab_number.clone(),
        from,
        to: target,
        note: note.map(str::to_string).filter(|n| !n.trim().is_empty()),
        timestamp: at,
        actor: actor.to_string(),
    };
    Ok(Transition {
        sample: next,
        audit,
    })
}

/// Walk the shortest allowed route to `target`, one audit entry per step.
pub fn apply_route(
    sample: &Sample,
    target: WorkflowStatus,
    note: Option<&str>,
    actor: &str,
    at: DateTime<Utc>,
) -> Result<(Sample, Vec<AuditEntry>)> {
    let steps = route(sample.workflow_status, target)
        .filter(|steps| !steps.is_empty())
        .ok_or_else(|| WorkflowError::InvalidTransition {
            lab_number: sample.lab_number.clone(),
            from: sample.workflow_status,
            to: target.as_str().to_string(),
        })?;
    let mut current = sample.clone();
    let mut audit = Vec::with_capacity(steps.len());
    for step in steps {
        let transition = apply_transition(&current, step, note, actor, at)?;
        current = transition.sample;
        audit.push(transition.audit);
    }
    Ok((current, audit))
}

/// Bulk status update payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkTransitionRequest {
    pub sample_ids: Vec<String>,
    pub workflow_status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Validation failure naming the first offending sample and status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationFailure {
    pub sample_id: String,
    pub workflow_status: String,
    pub message: String,
}

impl ValidationFailure {
    /// Describe a validation error; backend errors yield `None`.
    pub fn from_error(error: &WorkflowError) -> Option<Self> {
        match error {
            WorkflowError::InvalidTransition { lab_number, to, .. } => Some(Self {
                sample_id: lab_number.to_string(),
                workflow_status: to.clone(),
                message: error.to_string(),
            }),
            WorkflowError::SampleNotFound(lab_number) => Some(Self {
                sample_id: lab_number.to_string(),
                workflow_status: String::new(),
                message: error.to_string(),
            }),
            _ => None,
        }
    }
}

/// Response to a bulk status update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BulkTransitionResponse {
    Updated { updated: Vec<Sample> },
    Rejected { error: ValidationFailure },
}

/// Applies status changes through a sample repository.
#[derive(Debug)]
pub struct WorkflowEngine<R> {
    repository: R,
    locks: Arc<ResourceLocks>,
}

impl<R: SampleRepository> WorkflowEngine<R> {
    pub fn new(repository: R) -> Self {
        Self::with_locks(repository, Arc::new(ResourceLocks::new()))
    }

    /// Share a lock registry with other components touching the same samples.
    pub fn with_locks(repository: R, locks: Arc<ResourceLocks>) -> Self {
        Self { repository, locks }
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub fn locks(&self) -> &Arc<ResourceLocks> {
        &self.locks
    }

    /// Move one sample to `target`.
    pub fn transition(
        &self,
        lab_number: &LabNumber,
        target: WorkflowStatus,
        note: Option<&str>,
        actor: &str,
    ) -> Result<Sample> {
        let _guard = self.locks.acquire([sample_key(lab_number)])?;
        let sample = self.load(lab_number)?;
        let transition = apply_transition(&sample, target, note, actor, Utc::now())
            .inspect_err(|err| warn!(%lab_number, error = %err, "transition rejected"))?;
        self.repository
            .save_samples(std::slice::from_ref(&transition.sample), &[transition.audit])?;
        info!(
            %lab_number,
            from = %sample.workflow_status,
            to = %target,
            "sample transitioned"
        );
        Ok(transition.sample)
    }

    /// Move one sample to a status given by name.
    pub fn transition_named(
        &self,
        lab_number: &LabNumber,
        target: &str,
        note: Option<&str>,
        actor: &str,
    ) -> Result<Sample> {
        let sample = self.load(lab_number)?;
        let target = parse_target(&sample, target)?;
        self.transition(lab_number, target, note, actor)
    }

    /// Apply the same target status to every listed sample, or to none.
    ///
    /// Duplicate ids are collapsed. The first failing sample aborts the
    /// whole request before anything is written.
    pub fn bulk_transition(
        &self,
        request: &BulkTransitionRequest,
        actor: &str,
        cancel: &CancelToken,
    ) -> Result<Vec<Sample>> {
        let span = info_span!(
            "bulk_transition",
            target = %request.workflow_status,
            requested = request.sample_ids.len()
        );
        let _span = span.enter();

        if request.sample_ids.is_empty() {
            return Err(WorkflowError::InvalidRequest("no sample ids given".to_string()));
        }
        let mut seen = HashSet::new();
        let mut lab_numbers = Vec::with_capacity(request.sample_ids.len());
        for raw in &request.sample_ids {
            let lab_number = LabNumber::new(raw.as_str())
                .map_err(|_| WorkflowError::InvalidRequest(format!("invalid sample id '{raw}'")))?;
            if seen.insert(lab_number.clone()) {
                lab_numbers.push(lab_number);
            }
        }

        let _guard = self.locks.acquire(lab_numbers.iter().map(sample_key))?;
        let now = Utc::now();
        let mut updated = Vec::with_capacity(lab_numbers.len());
        let mut audit = Vec::with_capacity(lab_numbers.len());
        for lab_number in &lab_numbers {
            let sample = self.load(lab_number)?;
            let transition = parse_target(&sample, &request.workflow_status)
                .and_then(|target| {
                    apply_transition(&sample, target, request.notes.as_deref(), actor, now)
                })
                .inspect_err(|err| warn!(%lab_number, error = %err, "bulk transition rejected"))?;
            updated.push(transition.sample);
            audit.push(transition.audit);
        }

        cancel.check()?;
        self.repository.save_samples(&updated, &audit)?;
        info!(count = updated.len(), "bulk transition committed");
        Ok(updated)
    }

    /// Like `bulk_transition`, but folds validation errors into the response.
    pub fn handle_bulk_request(
        &self,
        request: &BulkTransitionRequest,
        actor: &str,
        cancel: &CancelToken,
    ) -> Result<BulkTransitionResponse> {
        match self.bulk_transition(request, actor, cancel) {
            Ok(updated) => Ok(BulkTransitionResponse::Updated { updated }),
            Err(err) => match ValidationFailure::from_error(&err) {
                Some(error) => Ok(BulkTransitionResponse::Rejected { error }),
                None => Err(err),
            },
        }
    }

    fn load(&self, lab_number: &LabNumber) -> Result<Sample> {
        debug!(%lab_number, "loading sample");
        self.repository
            .find_sample(lab_number)?
            .ok_or_else(|| WorkflowError::SampleNotFound(lab_number.clone()))
    }
}
