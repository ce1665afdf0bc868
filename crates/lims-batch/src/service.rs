//! Batch creation against the repositories.
//!
//! One call finds eligible samples, groups and lays them out, routes every
//! sample to the kind's batched status and commits batch, samples and
//! audit entries together. Samples are locked for the whole call through
//! the same `ResourceLocks` the workflow engine uses.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, info_span, warn};

use lims_model::{
    AuditEntry, Batch, BatchKind, BatchRepository, CaseNumber, LabNumber, Sample, SampleFilter,
    SampleRepository,
};
use lims_workflow::{CancelToken, ResourceLocks, apply_route, sample_key};

use crate::allocator::{
    CaseGroup, CaseSelection, DefaultRanking, RelationRanking, build_batch, common_source_batch,
    flatten, group_by_case_with,
};
use crate::error::{BatchError, Result};
use crate::layout::ControlPolicies;

/// Parameters of one batch creation call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBatchRequest {
    pub kind: BatchKind,
    pub operator: String,
    /// Restrict to these cases (all eligible cases when empty).
    #[serde(default)]
    pub case_numbers: Vec<CaseNumber>,
    /// Pick cases by member; any listed sample brings its whole case.
    #[serde(default)]
    pub lab_numbers: Vec<LabNumber>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl CreateBatchRequest {
    pub fn new(kind: BatchKind, operator: impl Into<String>) -> Self {
        Self {
            kind,
            operator: operator.into(),
            case_numbers: Vec::new(),
            lab_numbers: Vec::new(),
            note: None,
        }
    }

    fn filter(&self) -> SampleFilter {
        SampleFilter::batchable(self.kind).with_cases(self.case_numbers.clone())
    }
}

/// Creates batches and moves their samples into the batched status.
pub struct BatchService<S, B> {
    samples: S,
    batches: B,
    locks: Arc<ResourceLocks>,
    policies: ControlPolicies,
    ranking: Arc<dyn RelationRanking + Send + Sync>,
}

impl<S: SampleRepository, B: BatchRepository> BatchService<S, B> {
    pub fn new(samples: S, batches: B, locks: Arc<ResourceLocks>) -> Self {
        Self {
            samples,
            batches,
            locks,
            policies: ControlPolicies::default(),
            ranking: Arc::new(DefaultRanking),
        }
    }

    #[must_use]
    pub fn with_policies(mut self, policies: ControlPolicies) -> Self {
        self.policies = policies;
        self
    }

    #[must_use]
    pub fn with_ranking(mut self, ranking: Arc<dyn RelationRanking + Send + Sync>) -> Self {
        self.ranking = ranking;
        self
    }

    pub fn policies(&self) -> &ControlPolicies {
        &self.policies
    }

    /// Eligible samples grouped by case, without locking or committing.
    pub fn preview(&self, request: &CreateBatchRequest) -> Result<Vec<CaseGroup>> {
        let candidates = self.samples.find_eligible(&request.filter())?;
        self.choose(request, candidates)
    }

    /// Build, lay out and commit a batch.
    ///
    /// Nothing is persisted when the call fails or `cancel` fires before
    /// the commit. If the sample commit fails after the batch was stored,
    /// the batch is discarded again.
    pub fn create_batch(
        &self,
        request: &CreateBatchRequest,
        cancel: &CancelToken,
    ) -> Result<Batch> {
        let span = info_span!("create_batch", kind = %request.kind, operator = %request.operator);
        let _span = span.enter();

        let candidates = self.preview(request)?;
        let keys: Vec<String> = flatten(&candidates)
            .iter()
            .map(|sample| sample_key(&sample.lab_number))
            .collect();
        let _guard = self.locks.acquire(keys)?;

        let groups = self.refresh(request, &candidates)?;

        let now = Utc::now();
        let mut batch = build_batch(
            &groups,
            request.kind,
            &request.operator,
            self.policies.for_kind(request.kind),
            now,
            |kind| self.batches.next_batch_number(kind),
        )?;

        let placed = flatten(&groups);
        if request.kind == BatchKind::Electrophoresis {
            batch.source_batch = common_source_batch(&placed);
        }

        let target = request.kind.batched_status();
        let mut updated = Vec::with_capacity(placed.len());
        let mut audit: Vec<AuditEntry> = Vec::new();
        for sample in &placed {
            let (mut next, entries) =
                apply_route(sample, target, request.note.as_deref(), &request.operator, now)?;
            next.assign_batch(request.kind, batch.batch_number.clone());
            updated.push(next);
            audit.extend(entries);
        }

        cancel.check().map_err(|_| BatchError::Cancelled)?;
        self.commit(&batch, &updated, &audit)?;

        info!(
            batch_number = %batch.batch_number,
            samples = updated.len(),
            cases = groups.len(),
            source_batch = ?batch.source_batch.as_ref().map(ToString::to_string),
            "batch created"
        );
        Ok(batch)
    }

    fn commit(&self, batch: &Batch, samples: &[Sample], audit: &[AuditEntry]) -> Result<()> {
        self.batches.save_batch(batch)?;
        if let Err(err) = self.samples.save_samples(samples, audit) {
            warn!(
                batch_number = %batch.batch_number,
                error = %err,
                "sample commit failed, discarding batch"
            );
            if let Err(discard) = self.batches.discard_batch(&batch.batch_number) {
                error!(
                    batch_number = %batch.batch_number,
                    error = %discard,
                    "failed to discard batch"
                );
            }
            return Err(err.into());
        }
        Ok(())
    }

    /// Re-read the candidates under the lock.
    ///
    /// A case that lost any member to another call since the preview is
    /// dropped whole, then the member selection is applied again.
    fn refresh(
        &self,
        request: &CreateBatchRequest,
        candidates: &[CaseGroup],
    ) -> Result<Vec<CaseGroup>> {
        let filter = request.filter();
        let mut fresh = Vec::new();
        let mut broken: HashSet<CaseNumber> = HashSet::new();
        for sample in flatten(candidates) {
            match self.samples.find_sample(&sample.lab_number)? {
                Some(current) if filter.matches(&current) => fresh.push(current),
                _ => {
                    debug!(lab_number = %sample.lab_number, "sample taken by a concurrent call");
                    if let Some(case) = sample.case_number {
                        broken.insert(case);
                    }
                }
            }
        }
        if !broken.is_empty() {
            warn!(cases = broken.len(), "dropping cases split by a concurrent batch");
            fresh.retain(|sample| {
                sample
                    .case_number
                    .as_ref()
                    .is_none_or(|case| !broken.contains(case))
            });
        }
        self.choose(request, fresh)
    }

    /// Group candidates and apply the request's explicit member selection.
    fn choose(
        &self,
        request: &CreateBatchRequest,
        candidates: Vec<Sample>,
    ) -> Result<Vec<CaseGroup>> {
        let groups = group_by_case_with(self.ranking.as_ref(), candidates);
        if request.lab_numbers.is_empty() {
            return Ok(groups);
        }
        let mut selection = CaseSelection::new(groups);
        for lab_number in &request.lab_numbers {
            if !selection.select(lab_number) {
                return Err(BatchError::NotEligible {
                    lab_number: lab_number.clone(),
                    kind: request.kind,
                });
            }
        }
        Ok(selection.into_selected())
    }
}
