//! Directory-backed repository.
//!
//! Layout:
//! - `samples.json`: every registered sample, intake order
//! - `batches.json`: every committed batch
//! - `audit.jsonl`: one audit entry per line, append-only
//! - `sequences.json`: last batch sequence issued per prefix and day
//! - `.lock`: advisory lock file
//!
//! Nothing is cached between calls. Reads reload the files under a shared
//! lock; mutations take the exclusive lock, reload, validate against what is
//! on disk and rewrite the affected files atomically. Several `JsonStore`
//! handles on one directory, in one process or many, therefore see each
//! other's writes.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, info, warn};

use lims_model::{
    AuditEntry, Batch, BatchKind, BatchNumber, BatchRepository, LabNumber, RepositoryError,
    Sample, SampleFilter, SampleRepository,
};

use crate::error::{Result, StoreError};
use crate::io::{FileLock, append_json_lines, load_json, load_json_lines, lock_file, save_json};
use crate::state::StoreState;

pub const SAMPLES_FILE: &str = "samples.json";
pub const BATCHES_FILE: &str = "batches.json";
pub const AUDIT_FILE: &str = "audit.jsonl";
pub const SEQUENCES_FILE: &str = "sequences.json";
pub const LOCK_FILE: &str = ".lock";

type RepoResult<T> = std::result::Result<T, RepositoryError>;

#[derive(Debug)]
pub struct JsonStore {
    dir: PathBuf,
}

impl JsonStore {
    /// Open (or start) a store in `dir`. Missing files read as empty.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir).map_err(|e| StoreError::Io {
            operation: "create directory",
            path: dir.clone(),
            source: e,
        })?;
        let store = Self { dir };
        let state = store.snapshot()?;
        info!(
            dir = %store.dir.display(),
            samples = state.samples().len(),
            batches = state.batches().count(),
            audit = state.audit().len(),
            "opened store"
        );
        Ok(store)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Register new samples. Any duplicate lab number rejects the whole set.
    pub fn import_samples(&self, samples: Vec<Sample>) -> Result<usize> {
        let _lock = self.lock_exclusive()?;
        let mut state = self.load()?;
        let count = state.insert_new(samples)?;
        save_json(&self.path(SAMPLES_FILE), state.samples())?;
        info!(count, "imported samples");
        Ok(count)
    }

    pub fn samples(&self) -> Result<Vec<Sample>> {
        Ok(self.snapshot()?.samples().to_vec())
    }

    pub fn batches(&self) -> Result<Vec<Batch>> {
        Ok(self.snapshot()?.batches().cloned().collect())
    }

    pub fn audit_log(&self) -> Result<Vec<AuditEntry>> {
        Ok(self.snapshot()?.audit().to_vec())
    }

    fn path(&self, file: &str) -> PathBuf {
        self.dir.join(file)
    }

    fn lock_exclusive(&self) -> Result<FileLock> {
        lock_file(&self.path(LOCK_FILE), true)
    }

    /// Current on-disk state under a shared lock.
    fn snapshot(&self) -> Result<StoreState> {
        let _lock = lock_file(&self.path(LOCK_FILE), false)?;
        self.load()
    }

    /// Read every file. Callers hold the lock.
    fn load(&self) -> Result<StoreState> {
        let samples: Vec<Sample> = load_json(&self.path(SAMPLES_FILE))?;
        let batches: Vec<Batch> = load_json(&self.path(BATCHES_FILE))?;
        let audit: Vec<AuditEntry> = load_json_lines(&self.path(AUDIT_FILE))?;
        let issued: BTreeMap<String, u32> = load_json(&self.path(SEQUENCES_FILE))?;
        Ok(StoreState::from_parts(samples, batches, audit)?.with_issued(issued))
    }

    fn commit_samples(&self, samples: &[Sample], audit: &[AuditEntry]) -> Result<()> {
        let _lock = self.lock_exclusive()?;
        let state = self.load()?;
        let mut next = state.clone();
        for sample in samples {
            state.check_fresh(sample, audit)?;
            next.upsert(sample);
        }
        save_json(&self.path(SAMPLES_FILE), next.samples())?;
        if let Err(err) = append_json_lines(&self.path(AUDIT_FILE), audit) {
            warn!(error = %err, "audit append failed, restoring samples file");
            save_json(&self.path(SAMPLES_FILE), state.samples())?;
            return Err(err);
        }
        debug!(samples = samples.len(), audit = audit.len(), "committed samples");
        Ok(())
    }

    fn store_batches(&self, state: &StoreState) -> Result<()> {
        let batches: Vec<&Batch> = state.batches().collect();
        save_json(&self.path(BATCHES_FILE), &batches)
    }
}

impl SampleRepository for JsonStore {
    fn find_eligible(&self, filter: &SampleFilter) -> RepoResult<Vec<Sample>> {
        Ok(self.snapshot()?.find_eligible(filter))
    }

    fn find_sample(&self, lab_number: &LabNumber) -> RepoResult<Option<Sample>> {
        Ok(self.snapshot()?.find(lab_number).cloned())
    }

    fn save_sample(&self, sample: &Sample) -> RepoResult<()> {
        Ok(self.commit_samples(std::slice::from_ref(sample), &[])?)
    }

    fn append_audit(&self, entry: &AuditEntry) -> RepoResult<()> {
        let _lock = self.lock_exclusive()?;
        append_json_lines(&self.path(AUDIT_FILE), std::slice::from_ref(entry))?;
        Ok(())
    }

    fn save_samples(&self, samples: &[Sample], audit: &[AuditEntry]) -> RepoResult<()> {
        Ok(self.commit_samples(samples, audit)?)
    }
}

impl BatchRepository for JsonStore {
    /// Issue the next number and persist the counter before returning it,
    /// so a number is never handed out twice even if its batch is discarded.
    fn next_batch_number(&self, kind: BatchKind) -> RepoResult<BatchNumber> {
        let _lock = self.lock_exclusive()?;
        let mut state = self.load()?;
        let number = state
            .issue_batch_number(kind, Utc::now().date_naive())
            .map_err(|err| RepositoryError::backend_with_source("batch number generation", err))?;
        save_json(&self.path(SEQUENCES_FILE), state.issued())?;
        Ok(number)
    }

    fn save_batch(&self, batch: &Batch) -> RepoResult<()> {
        let _lock = self.lock_exclusive()?;
        let mut state = self.load()?;
        if state.find_batch(&batch.batch_number).is_some() {
            return Err(RepositoryError::Duplicate {
                entity: "batch",
                id: batch.batch_number.to_string(),
            });
        }
        state.insert_batch(batch);
        self.store_batches(&state)?;
        info!(batch_number = %batch.batch_number, "saved batch");
        Ok(())
    }

    fn find_batch(&self, batch_number: &BatchNumber) -> RepoResult<Option<Batch>> {
        Ok(self.snapshot()?.find_batch(batch_number).cloned())
    }

    fn discard_batch(&self, batch_number: &BatchNumber) -> RepoResult<()> {
        let _lock = self.lock_exclusive()?;
        let mut state = self.load()?;
        if state.remove_batch(batch_number).is_none() {
            return Ok(());
        }
        self.store_batches(&state)?;
        warn!(%batch_number, "discarded batch");
        Ok(())
    }
}
