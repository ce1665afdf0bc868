//! Batch creation end to end against the in-memory and directory stores.

use std::sync::Arc;

use lims_batch::{BatchError, BatchService, CreateBatchRequest, LayoutError};
use lims_model::{
    AuditEntry, Batch, BatchKind, BatchNumber, BatchRepository, CaseNumber, LabNumber, Priority,
    Relation, RepositoryError, Sample, SampleFilter, SampleRepository, WellType, WorkflowStatus,
};
use lims_store::{JsonStore, MemoryStore};
use lims_workflow::{CancelToken, ResourceLocks, WorkflowEngine};

fn lab(id: &str) -> LabNumber {
    LabNumber::new(id).unwrap()
}

fn member(id: &str, case: &str, relation: Relation) -> Sample {
    Sample::new(lab(id), relation)
        .with_case(CaseNumber::new(case).unwrap())
        .with_name(format!("Donor {id}"))
}

fn two_cases() -> Vec<Sample> {
    vec![
        member("25_003", "K1", Relation::Mother),
        member("25_001", "K1", Relation::Child),
        member("25_010", "K2", Relation::AllegedFather).with_status(WorkflowStatus::PcrReady),
        member("25_002", "K1", Relation::AllegedFather),
        member("25_011", "K2", Relation::Child).with_priority(Priority::Urgent),
    ]
}

struct Fixture {
    store: Arc<MemoryStore>,
    locks: Arc<ResourceLocks>,
    service: BatchService<Arc<MemoryStore>, Arc<MemoryStore>>,
}

fn fixture(samples: Vec<Sample>) -> Fixture {
    let store = Arc::new(MemoryStore::new());
    store.insert_samples(samples).unwrap();
    let locks = Arc::new(ResourceLocks::new());
    let service = BatchService::new(Arc::clone(&store), Arc::clone(&store), Arc::clone(&locks));
    Fixture {
        store,
        locks,
        service,
    }
}

fn labs_in_well_order(batch: &Batch) -> Vec<String> {
    batch.lab_numbers().iter().map(ToString::to_string).collect()
}

#[test]
fn pcr_batch_places_cases_contiguously() {
    let f = fixture(two_cases());
    let batch = f
        .service
        .create_batch(&CreateBatchRequest::new(BatchKind::Pcr, "tech"), &CancelToken::new())
        .unwrap();

    assert!(batch.batch_number.as_str().starts_with("PCR-"));
    batch.well_map.validate().unwrap();
    assert_eq!(
        labs_in_well_order(&batch),
        ["25_011", "25_010", "25_001", "25_002", "25_003"]
    );
    let h01 = batch.well_map.get(&"H01".parse().unwrap()).unwrap();
    assert_eq!(h01.well_type(), WellType::PositiveControl);
    let a01 = batch.well_map.get(&"A01".parse().unwrap()).unwrap();
    assert_eq!(a01.sample_ref().unwrap().name, "Donor 25_011");
}

#[test]
fn batched_samples_match_the_well_map() {
    let f = fixture(two_cases());
    let batch = f
        .service
        .create_batch(&CreateBatchRequest::new(BatchKind::Pcr, "tech"), &CancelToken::new())
        .unwrap();

    for sample in f.store.samples().unwrap() {
        assert_eq!(sample.workflow_status, WorkflowStatus::PcrBatched);
        assert_eq!(sample.batch_id.as_ref(), Some(&batch.batch_number));
        assert!(batch.contains(&sample.lab_number));
    }
    assert_eq!(f.store.find_batch(&batch.batch_number).unwrap(), Some(batch));

    // Four collected samples take two steps, the pcr_ready one takes one.
    let audit = f.store.audit_log().unwrap();
    assert_eq!(audit.len(), 9);
    assert!(audit.iter().all(|e| e.actor == "tech"));
}

#[test]
fn batched_samples_are_not_eligible_again() {
    let f = fixture(two_cases());
    let request = CreateBatchRequest::new(BatchKind::Pcr, "tech");
    f.service.create_batch(&request, &CancelToken::new()).unwrap();
    let err = f
        .service
        .create_batch(&request, &CancelToken::new())
        .unwrap_err();
    assert!(matches!(err, BatchError::EmptySelection { kind: BatchKind::Pcr }));
}

#[test]
fn electrophoresis_batch_records_source_plate() {
    let f = fixture(two_cases());
    let pcr = f
        .service
        .create_batch(&CreateBatchRequest::new(BatchKind::Pcr, "tech"), &CancelToken::new())
        .unwrap();

    let engine = WorkflowEngine::with_locks(Arc::clone(&f.store), Arc::clone(&f.locks));
    for id in pcr.lab_numbers() {
        engine
            .transition(&id, WorkflowStatus::PcrCompleted, None, "tech")
            .unwrap();
    }
    let completed = f.store.find_sample(&lab("25_001")).unwrap().unwrap();
    assert!(completed.batch_id.is_none());

    let ep = f
        .service
        .create_batch(
            &CreateBatchRequest::new(BatchKind::Electrophoresis, "analyst"),
            &CancelToken::new(),
        )
        .unwrap();
    assert!(ep.batch_number.as_str().starts_with("EP-"));
    assert_eq!(ep.source_batch.as_ref(), Some(&pcr.batch_number));
    assert_eq!(ep.well_map.count_of(WellType::AllelicLadder), 1);

    let sample = f.store.find_sample(&lab("25_001")).unwrap().unwrap();
    assert_eq!(sample.workflow_status, WorkflowStatus::ElectroBatched);
    assert_eq!(sample.batch_history.len(), 2);
}

#[test]
fn member_selection_takes_whole_case() {
    let f = fixture(two_cases());
    let mut request = CreateBatchRequest::new(BatchKind::Pcr, "tech");
    request.lab_numbers = vec![lab("25_002")];
    let batch = f
        .service
        .create_batch(&request, &CancelToken::new())
        .unwrap();
    assert_eq!(labs_in_well_order(&batch), ["25_001", "25_002", "25_003"]);

    let untouched = f.store.find_sample(&lab("25_010")).unwrap().unwrap();
    assert_eq!(untouched.workflow_status, WorkflowStatus::PcrReady);
}

#[test]
fn unknown_member_is_not_eligible() {
    let f = fixture(two_cases());
    let mut request = CreateBatchRequest::new(BatchKind::Pcr, "tech");
    request.lab_numbers = vec![lab("99_999")];
    let err = f
        .service
        .create_batch(&request, &CancelToken::new())
        .unwrap_err();
    assert!(matches!(err, BatchError::NotEligible { .. }));
    assert!(err.is_recoverable());
}

#[test]
fn case_filter_limits_selection() {
    let f = fixture(two_cases());
    let mut request = CreateBatchRequest::new(BatchKind::Pcr, "tech");
    request.case_numbers = vec![CaseNumber::new("K2").unwrap()];
    let batch = f
        .service
        .create_batch(&request, &CancelToken::new())
        .unwrap();
    assert_eq!(labs_in_well_order(&batch), ["25_011", "25_010"]);
}

#[test]
fn cancelled_call_persists_nothing() {
    let f = fixture(two_cases());
    let cancel = CancelToken::new();
    cancel.cancel();
    let err = f
        .service
        .create_batch(&CreateBatchRequest::new(BatchKind::Pcr, "tech"), &cancel)
        .unwrap_err();
    assert!(matches!(err, BatchError::Cancelled));
    assert!(f.store.batches().unwrap().is_empty());
    assert!(f.store.audit_log().unwrap().is_empty());
    assert!(f.store.samples().unwrap().iter().all(|s| s.batch_id.is_none()));
}

#[test]
fn overfull_plate_persists_nothing() {
    let samples = (0..95)
        .map(|i| Sample::new(lab(&format!("25_{i:03}")), Relation::Child))
        .collect();
    let f = fixture(samples);
    let err = f
        .service
        .create_batch(&CreateBatchRequest::new(BatchKind::Pcr, "tech"), &CancelToken::new())
        .unwrap_err();
    assert!(matches!(
        err,
        BatchError::Layout(LayoutError::PlateCapacityExceeded {
            requested: 95,
            capacity: 94
        })
    ));
    assert!(f.store.batches().unwrap().is_empty());
    assert!(f.store.audit_log().unwrap().is_empty());
}

/// Sample repository whose bulk save always fails.
struct FailingSamples(Arc<MemoryStore>);

impl SampleRepository for FailingSamples {
    fn find_eligible(&self, filter: &SampleFilter) -> Result<Vec<Sample>, RepositoryError> {
        self.0.find_eligible(filter)
    }

    fn find_sample(&self, lab_number: &LabNumber) -> Result<Option<Sample>, RepositoryError> {
        self.0.find_sample(lab_number)
    }

    fn save_sample(&self, sample: &Sample) -> Result<(), RepositoryError> {
        self.0.save_sample(sample)
    }

    fn append_audit(&self, entry: &AuditEntry) -> Result<(), RepositoryError> {
        self.0.append_audit(entry)
    }

    fn save_samples(&self, _: &[Sample], _: &[AuditEntry]) -> Result<(), RepositoryError> {
        Err(RepositoryError::backend("disk full"))
    }
}

#[test]
fn failed_sample_commit_discards_batch() {
    let store = Arc::new(MemoryStore::new());
    store.insert_samples(two_cases()).unwrap();
    let service = BatchService::new(
        FailingSamples(Arc::clone(&store)),
        Arc::clone(&store),
        Arc::new(ResourceLocks::new()),
    );
    let err = service
        .create_batch(&CreateBatchRequest::new(BatchKind::Pcr, "tech"), &CancelToken::new())
        .unwrap_err();
    assert!(matches!(err, BatchError::Repository(_)));
    assert!(!err.is_recoverable());
    assert!(store.batches().unwrap().is_empty());
    assert!(
        store
            .samples()
            .unwrap()
            .iter()
            .all(|s| s.workflow_status != WorkflowStatus::PcrBatched)
    );
}

#[test]
fn concurrent_batches_never_share_a_sample() {
    let samples = (0..40)
        .map(|i| Sample::new(lab(&format!("25_{i:03}")), Relation::Child))
        .collect();
    let f = Arc::new(fixture(samples));
    let handles: Vec<_> = (0..3)
        .map(|_| {
            let f = Arc::clone(&f);
            std::thread::spawn(move || {
                f.service
                    .create_batch(&CreateBatchRequest::new(BatchKind::Pcr, "tech"), &CancelToken::new())
                    .ok()
            })
        })
        .collect();
    let batches: Vec<_> = handles
        .into_iter()
        .filter_map(|h| h.join().unwrap())
        .collect();

    let mut placed: Vec<String> = batches.iter().flat_map(labs_in_well_order).collect();
    let total = placed.len();
    placed.sort();
    placed.dedup();
    assert_eq!(placed.len(), total);
    assert_eq!(total, 40);
}

/// Serves an eligible list read before another call moved some samples.
struct StalePreview {
    store: Arc<MemoryStore>,
    preview: Vec<Sample>,
}

impl SampleRepository for StalePreview {
    fn find_eligible(&self, filter: &SampleFilter) -> Result<Vec<Sample>, RepositoryError> {
        Ok(self
            .preview
            .iter()
            .filter(|sample| filter.matches(sample))
            .cloned()
            .collect())
    }

    fn find_sample(&self, lab_number: &LabNumber) -> Result<Option<Sample>, RepositoryError> {
        self.store.find_sample(lab_number)
    }

    fn save_sample(&self, sample: &Sample) -> Result<(), RepositoryError> {
        self.store.save_sample(sample)
    }

    fn append_audit(&self, entry: &AuditEntry) -> Result<(), RepositoryError> {
        self.store.append_audit(entry)
    }

    fn save_samples(&self, samples: &[Sample], audit: &[AuditEntry]) -> Result<(), RepositoryError> {
        self.store.save_samples(samples, audit)
    }
}

#[test]
fn case_split_after_preview_is_left_off_the_plate() {
    let store = Arc::new(MemoryStore::new());
    store.insert_samples(two_cases()).unwrap();
    let preview = store.samples().unwrap();

    let mut taken = store.find_sample(&lab("25_002")).unwrap().unwrap();
    taken.assign_batch(BatchKind::Pcr, BatchNumber::new("PCR-20261018-099").unwrap());
    store.save_sample(&taken).unwrap();

    let service = BatchService::new(
        StalePreview {
            store: Arc::clone(&store),
            preview,
        },
        Arc::clone(&store),
        Arc::new(ResourceLocks::new()),
    );
    let batch = service
        .create_batch(&CreateBatchRequest::new(BatchKind::Pcr, "tech"), &CancelToken::new())
        .unwrap();
    assert_eq!(labs_in_well_order(&batch), ["25_011", "25_010"]);
    let rest = store.find_sample(&lab("25_001")).unwrap().unwrap();
    assert_eq!(rest.workflow_status, WorkflowStatus::SampleCollected);
    assert!(rest.batch_id.is_none());

    let mut request = CreateBatchRequest::new(BatchKind::Pcr, "tech");
    request.lab_numbers = vec![lab("25_001")];
    let err = service
        .create_batch(&request, &CancelToken::new())
        .unwrap_err();
    assert!(matches!(err, BatchError::NotEligible { .. }));
}

fn directory_service(store: &Arc<JsonStore>) -> BatchService<Arc<JsonStore>, Arc<JsonStore>> {
    BatchService::new(
        Arc::clone(store),
        Arc::clone(store),
        Arc::new(ResourceLocks::new()),
    )
}

#[test]
fn stale_directory_handle_finds_nothing_left() {
    let dir = tempfile::tempdir().unwrap();
    let first = Arc::new(JsonStore::open(dir.path()).unwrap());
    let second = Arc::new(JsonStore::open(dir.path()).unwrap());
    first.import_samples(two_cases()).unwrap();

    let request = CreateBatchRequest::new(BatchKind::Pcr, "tech");
    let batch = directory_service(&first)
        .create_batch(&request, &CancelToken::new())
        .unwrap();
    let err = directory_service(&second)
        .create_batch(&request, &CancelToken::new())
        .unwrap_err();
    assert!(matches!(err, BatchError::EmptySelection { kind: BatchKind::Pcr }));

    let reopened = JsonStore::open(dir.path()).unwrap();
    let numbers: Vec<BatchNumber> = reopened
        .batches()
        .unwrap()
        .into_iter()
        .map(|b| b.batch_number)
        .collect();
    assert_eq!(numbers, [batch.batch_number]);
    assert_eq!(reopened.audit_log().unwrap().len(), 9);
}

#[test]
fn directory_handles_in_parallel_commit_one_batch() {
    let dir = tempfile::tempdir().unwrap();
    JsonStore::open(dir.path())
        .unwrap()
        .import_samples(two_cases())
        .unwrap();

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let path = dir.path().to_path_buf();
            std::thread::spawn(move || {
                let store = Arc::new(JsonStore::open(&path).unwrap());
                let request = CreateBatchRequest::new(BatchKind::Pcr, "tech");
                directory_service(&store)
                    .create_batch(&request, &CancelToken::new())
                    .ok()
            })
        })
        .collect();
    let created: Vec<Batch> = handles
        .into_iter()
        .filter_map(|h| h.join().unwrap())
        .collect();
    assert_eq!(created.len(), 1);

    let store = JsonStore::open(dir.path()).unwrap();
    let stored = store.batches().unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].batch_number, created[0].batch_number);
    assert_eq!(store.audit_log().unwrap().len(), 9);
    assert!(
        store
            .samples()
            .unwrap()
            .iter()
            .all(|s| s.batch_id.as_ref() == Some(&created[0].batch_number))
    );
}
