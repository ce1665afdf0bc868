//! Process-local repository backed by `RwLock`-guarded tables.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;

use lims_model::{
    AuditEntry, Batch, BatchKind, BatchNumber, BatchRepository, LabNumber, RepositoryError,
    Sample, SampleFilter, SampleRepository,
};

use crate::error::StoreError;
use crate::state::StoreState;

/// Repository that keeps everything in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register samples at intake. Fails without changes on a duplicate lab number.
    pub fn insert_samples(&self, samples: Vec<Sample>) -> Result<usize, StoreError> {
        self.write()?.insert_new(samples)
    }

    pub fn samples(&self) -> Result<Vec<Sample>, StoreError> {
        Ok(self.read()?.samples().to_vec())
    }

    pub fn batches(&self) -> Result<Vec<Batch>, StoreError> {
        Ok(self.read()?.batches().cloned().collect())
    }

    pub fn audit_log(&self) -> Result<Vec<AuditEntry>, StoreError> {
        Ok(self.read()?.audit().to_vec())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, StoreState>, StoreError> {
        self.state.read().map_err(|_| StoreError::LockPoisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, StoreState>, StoreError> {
        self.state.write().map_err(|_| StoreError::LockPoisoned)
    }
}

impl SampleRepository for MemoryStore {
    fn find_eligible(&self, filter: &SampleFilter) -> Result<Vec<Sample>, RepositoryError> {
        Ok(self.read()?.find_eligible(filter))
    }

    fn find_sample(&self, lab_number: &LabNumber) -> Result<Option<Sample>, RepositoryError> {
        Ok(self.read()?.find(lab_number).cloned())
    }

    fn save_sample(&self, sample: &Sample) -> Result<(), RepositoryError> {
        let mut state = self.write()?;
        state.check_fresh(sample, &[])?;
        state.upsert(sample);
        Ok(())
    }

    fn append_audit(&self, entry: &AuditEntry) -> Result<(), RepositoryError> {
        self.write()?.push_audit(std::slice::from_ref(entry));
        Ok(())
    }

    fn save_samples(
        &self,
        samples: &[Sample],
        audit: &[AuditEntry],
    ) -> Result<(), RepositoryError> {
        let mut state = self.write()?;
        for sample in samples {
            state.check_fresh(sample, audit)?;
        }
        for sample in samples {
            state.upsert(sample);
        }
        state.push_audit(audit);
        Ok(())
    }
}

impl BatchRepository for MemoryStore {
    fn next_batch_number(&self, kind: BatchKind) -> Result<BatchNumber, RepositoryError> {
        self.write()?
            .issue_batch_number(kind, Utc::now().date_naive())
            .map_err(|err| RepositoryError::backend_with_source("batch number generation", err))
    }

    fn save_batch(&self, batch: &Batch) -> Result<(), RepositoryError> {
        let mut state = self.write()?;
        if state.find_batch(&batch.batch_number).is_some() {
            return Err(RepositoryError::Duplicate {
                entity: "batch",
                id: batch.batch_number.to_string(),
            });
        }
        state.insert_batch(batch);
        Ok(())
    }

    fn find_batch(&self, batch_number: &BatchNumber) -> Result<Option<Batch>, RepositoryError> {
        Ok(self.read()?.find_batch(batch_number).cloned())
    }

    fn discard_batch(&self, batch_number: &BatchNumber) -> Result<(), RepositoryError> {
        self.write()?.remove_batch(batch_number);
        Ok(())
    }
}
