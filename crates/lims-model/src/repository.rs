//! Read/write contracts the core expects from its storage collaborators.
//!
//! The traits are synchronous and return plain values; async callers wrap
//! them on a blocking pool. Implementations decide how (and whether) writes
//! are transactional, but `save_samples` must apply all of its records or
//! none of them.

use std::sync::Arc;

use crate::audit::AuditEntry;
use crate::batch::Batch;
use crate::enums::{BatchKind, WorkflowStatus};
use crate::error::RepositoryError;
use crate::ids::{BatchNumber, CaseNumber, LabNumber};
use crate::sample::Sample;

/// Criteria for `SampleRepository::find_eligible`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SampleFilter {
    /// Accept only these statuses (all statuses when empty).
    pub statuses: Vec<WorkflowStatus>,
    /// Skip samples currently held by a batch.
    pub unbatched_only: bool,
    /// Restrict to these cases (all cases when empty).
    pub case_numbers: Vec<CaseNumber>,
}

impl SampleFilter {
    /// Filter for samples that may go on a batch of `kind`.
    pub fn batchable(kind: BatchKind) -> Self {
        Self {
            statuses: kind.batchable_statuses().to_vec(),
            unbatched_only: true,
            case_numbers: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_cases(mut self, case_numbers: Vec<CaseNumber>) -> Self {
        self.case_numbers = case_numbers;
        self
    }

    pub fn matches(&self, sample: &Sample) -> bool {
        if !self.statuses.is_empty() && !self.statuses.contains(&sample.workflow_status) {
            return false;
        }
        if self.unbatched_only && sample.batch_id.is_some() {
            return false;
        }
        if !self.case_numbers.is_empty() {
            return sample
                .case_number
                .as_ref()
                .is_some_and(|case| self.case_numbers.contains(case));
        }
        true
    }
}

pub trait SampleRepository: Send + Sync {
    /// Samples matching `filter`, in intake order.
    fn find_eligible(&self, filter: &SampleFilter) -> Result<Vec<Sample>, RepositoryError>;

    fn find_sample(&self, lab_number: &LabNumber) -> Result<Option<Sample>, RepositoryError>;

    fn save_sample(&self, sample: &Sample) -> Result<(), RepositoryError>;

    fn append_audit(&self, entry: &AuditEntry) -> Result<(), RepositoryError>;

    /// Persist several samples and their audit entries as one unit.
    fn save_samples(
        &self,
        samples: &[Sample],
        audit: &[AuditEntry],
    ) -> Result<(), RepositoryError>;
}

pub trait BatchRepository: Send + Sync {
    fn next_batch_number(&self, kind: BatchKind) -> Result<BatchNumber, RepositoryError>;

    fn save_batch(&self, batch: &Batch) -> Result<(), RepositoryError>;

    fn find_batch(&self, batch_number: &BatchNumber) -> Result<Option<Batch>, RepositoryError>;

    /// Remove a batch whose sample updates could not be committed.
    ///
    /// Only used to roll back a batch created in the same call.
    fn discard_batch(&self, batch_number: &BatchNumber) -> Result<(), RepositoryError>;
}

impl<T: SampleRepository + ?Sized> SampleRepository for Arc<T> {
    fn find_eligible(&self, filter: &SampleFilter) -> Result<Vec<Sample>, RepositoryError> {
        (**self).find_eligible(filter)
    }

    fn find_sample(&self, lab_number: &LabNumber) -> Result<Option<Sample>, RepositoryError> {
        (**self).find_sample(lab_number)
    }

    fn save_sample(&self, sample: &Sample) -> Result<(), RepositoryError> {
        (**self).save_sample(sample)
    }

    fn append_audit(&self, entry: &AuditEntry) -> Result<(), RepositoryError> {
        (**self).append_audit(entry)
    }

    fn save_samples(
        &self,
        samples: &[Sample],
        audit: &[AuditEntry],
    ) -> Result<(), RepositoryError> {
        (**self).save_samples(samples, audit)
    }
}

impl<T: BatchRepository + ?Sized> BatchRepository for Arc<T> {
    fn next_batch_number(&self, kind: BatchKind) -> Result<BatchNumber, RepositoryError> {
        (**self).next_batch_number(kind)
    }

    fn save_batch(&self, batch: &Batch) -> Result<(), RepositoryError> {
        (**self).save_batch(batch)
    }

    fn find_batch(&self, batch_number: &BatchNumber) -> Result<Option<Batch>, RepositoryError> {
        (**self).find_batch(batch_number)
    }

    fn discard_batch(&self, batch_number: &BatchNumber) -> Result<(), RepositoryError> {
        (**self).discard_batch(batch_number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enums::Relation;

    fn sample(lab: &str, status: WorkflowStatus) -> Sample {
        Sample::new(LabNumber::new(lab).unwrap(), Relation::Child).with_status(status)
    }

    #[test]
    fn batchable_filter_excludes_batched_samples() {
        let filter = SampleFilter::batchable(BatchKind::Pcr);
        let ready = sample("1", WorkflowStatus::PcrReady);
        let mut held = sample("2", WorkflowStatus::PcrReady);
        held.batch_id = Some(BatchNumber::new("PCR-1").unwrap());
        let done = sample("3", WorkflowStatus::PcrCompleted);

        assert!(filter.matches(&ready));
        assert!(!filter.matches(&held));
        assert!(!filter.matches(&done));
    }

    #[test]
    fn case_filter_drops_caseless_samples() {
        let case = CaseNumber::new("C1").unwrap();
        let filter = SampleFilter::batchable(BatchKind::Pcr).with_cases(vec![case.clone()]);
        let in_case = sample("1", WorkflowStatus::PcrReady).with_case(case);
        let caseless = sample("2", WorkflowStatus::PcrReady);

        assert!(filter.matches(&in_case));
        assert!(!filter.matches(&caseless));
    }
}
