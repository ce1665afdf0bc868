//! In-memory tables shared by both store flavours.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::NaiveDate;

use lims_model::{
    AuditEntry, Batch, BatchKind, BatchNumber, LabNumber, Sample, SampleFilter,
};

use crate::error::{Result, StoreError};

#[derive(Debug, Default, Clone)]
pub(crate) struct StoreState {
    /// Samples in intake order.
    samples: Vec<Sample>,
    index: HashMap<LabNumber, usize>,
    batches: BTreeMap<BatchNumber, Batch>,
    audit: Vec<AuditEntry>,
    /// Last sequence number issued per `PREFIX-YYYYMMDD` stem.
    issued: BTreeMap<String, u32>,
}

impl StoreState {
    pub(crate) fn from_parts(
        samples: Vec<Sample>,
        batches: Vec<Batch>,
        audit: Vec<AuditEntry>,
    ) -> Result<Self> {
        let mut state = Self {
            audit,
            ..Self::default()
        };
        state.insert_new(samples)?;
        state.batches = batches
            .into_iter()
            .map(|batch| (batch.batch_number.clone(), batch))
            .collect();
        Ok(state)
    }

    #[must_use]
    pub(crate) fn with_issued(mut self, issued: BTreeMap<String, u32>) -> Self {
        self.issued = issued;
        self
    }

    pub(crate) fn issued(&self) -> &BTreeMap<String, u32> {
        &self.issued
    }

    pub(crate) fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub(crate) fn batches(&self) -> impl Iterator<Item = &Batch> {
        self.batches.values()
    }

    pub(crate) fn audit(&self) -> &[AuditEntry] {
        &self.audit
    }

    pub(crate) fn find(&self, lab_number: &LabNumber) -> Option<&Sample> {
        self.index.get(lab_number).map(|&i| &self.samples[i])
    }

    pub(crate) fn find_eligible(&self, filter: &SampleFilter) -> Vec<Sample> {
        self.samples
            .iter()
            .filter(|sample| filter.matches(sample))
            .cloned()
            .collect()
    }

    /// Register new samples; rejects the whole set on any duplicate.
    pub(crate) fn insert_new(&mut self, samples: Vec<Sample>) -> Result<usize> {
        let mut incoming = HashSet::new();
        for sample in &samples {
            if self.index.contains_key(&sample.lab_number)
                || !incoming.insert(sample.lab_number.clone())
            {
                return Err(StoreError::DuplicateSample {
                    lab_number: sample.lab_number.to_string(),
                });
            }
        }
        let count = samples.len();
        for sample in samples {
            self.index
                .insert(sample.lab_number.clone(), self.samples.len());
            self.samples.push(sample);
        }
        Ok(count)
    }

    /// Insert or replace by lab number.
    pub(crate) fn upsert(&mut self, sample: &Sample) {
        match self.index.get(&sample.lab_number) {
            Some(&i) => self.samples[i] = sample.clone(),
            None => {
                self.index
                    .insert(sample.lab_number.clone(), self.samples.len());
                self.samples.push(sample.clone());
            }
        }
    }

    /// Reject `incoming` when the stored record moved on after it was read.
    ///
    /// The first audit entry for the sample must start from the stored
    /// status, and the stored batch history must be a prefix of the new one.
    pub(crate) fn check_fresh(&self, incoming: &Sample, audit: &[AuditEntry]) -> Result<()> {
        let Some(stored) = self.find(&incoming.lab_number) else {
            return Ok(());
        };
        let conflict = |reason: String| StoreError::Conflict {
            lab_number: incoming.lab_number.to_string(),
            reason,
        };
        if let Some(entry) = audit.iter().find(|e| e.sample_id == incoming.lab_number)
            && entry.from != stored.workflow_status
        {
            return Err(conflict(format!(
                "expected status {}, stored status is {}",
                entry.from, stored.workflow_status
            )));
        }
        if !incoming.batch_history.starts_with(&stored.batch_history) {
            let held_by = stored
                .batch_history
                .last()
                .map_or_else(String::new, |entry| entry.batch_number.to_string());
            return Err(conflict(format!("already placed on batch {held_by}")));
        }
        Ok(())
    }

    pub(crate) fn push_audit(&mut self, entries: &[AuditEntry]) {
        self.audit.extend_from_slice(entries);
    }

    pub(crate) fn find_batch(&self, batch_number: &BatchNumber) -> Option<&Batch> {
        self.batches.get(batch_number)
    }

    pub(crate) fn insert_batch(&mut self, batch: &Batch) {
        self.batches
            .insert(batch.batch_number.clone(), batch.clone());
    }

    pub(crate) fn remove_batch(&mut self, batch_number: &BatchNumber) -> Option<Batch> {
        self.batches.remove(batch_number)
    }

    /// Issue `PREFIX-YYYYMMDD-NNN`, continuing after any stored batch with
    /// the same stem.
    pub(crate) fn issue_batch_number(
        &mut self,
        kind: BatchKind,
        date: NaiveDate,
    ) -> std::result::Result<BatchNumber, lims_model::ModelError> {
        let stem = format!("{}-{}", kind.prefix(), date.format("%Y%m%d"));
        let stored_max = self
            .batches
            .keys()
            .filter_map(|number| {
                number
                    .as_str()
                    .strip_prefix(&stem)
                    .and_then(|rest| rest.strip_prefix('-'))
                    .and_then(|seq| seq.parse::<u32>().ok())
            })
            .max()
            .unwrap_or(0);
        let last = self.issued.entry(stem.clone()).or_insert(0);
        *last = (*last).max(stored_max) + 1;
        BatchNumber::new(format!("{stem}-{:03}", *last))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use lims_model::{BatchNumber, Relation, WorkflowStatus};

    fn sample(lab: &str) -> Sample {
        Sample::new(LabNumber::new(lab).unwrap(), Relation::Child)
    }

    #[test]
    fn insert_new_is_all_or_nothing() {
        let mut state = StoreState::default();
        state.insert_new(vec![sample("1")]).unwrap();
        let err = state
            .insert_new(vec![sample("2"), sample("1")])
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateSample { .. }));
        assert_eq!(state.samples().len(), 1);
        assert!(state.find(&LabNumber::new("2").unwrap()).is_none());
    }

    #[test]
    fn batch_numbers_increment_per_kind_and_day() {
        let mut state = StoreState::default();
        let day = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
        let first = state.issue_batch_number(BatchKind::Pcr, day).unwrap();
        let second = state.issue_batch_number(BatchKind::Pcr, day).unwrap();
        let electro = state
            .issue_batch_number(BatchKind::Electrophoresis, day)
            .unwrap();
        assert_eq!(first.as_str(), "PCR-20261018-001");
        assert_eq!(second.as_str(), "PCR-20261018-002");
        assert_eq!(electro.as_str(), "EP-20261018-001");
    }

    #[test]
    fn stale_sample_is_rejected() {
        let mut state = StoreState::default();
        let read = sample("1").with_status(WorkflowStatus::PcrReady);
        state.insert_new(vec![read.clone()]).unwrap();

        let mut placed = read.clone();
        placed.assign_batch(BatchKind::Pcr, BatchNumber::new("PCR-20261018-001").unwrap());
        state.check_fresh(&placed, &[]).unwrap();
        state.upsert(&placed);

        let mut rival = read.clone();
        rival.assign_batch(BatchKind::Pcr, BatchNumber::new("PCR-20261018-002").unwrap());
        let err = state.check_fresh(&rival, &[]).unwrap_err();
        assert!(matches!(err, StoreError::Conflict { ref reason, .. } if reason.contains("PCR-20261018-001")));

        let entry = AuditEntry {
            sample_id: read.lab_number.clone(),
            from: WorkflowStatus::SampleCollected,
            to: WorkflowStatus::PcrReady,
            note: None,
            timestamp: Utc::now(),
            actor: "tech".to_string(),
        };
        assert!(matches!(
            state.check_fresh(&placed, &[entry]),
            Err(StoreError::Conflict { .. })
        ));
    }
}
