//! Persistence behaviour of the directory store.

use chrono::Utc;
use tempfile::tempdir;

use lims_model::{
    AuditEntry, Batch, BatchKind, BatchNumber, BatchRepository, LabNumber, PlateMap, Relation,
    RepositoryError, Sample, SampleFilter, SampleRepository, WorkflowStatus,
};
use lims_store::{AUDIT_FILE, JsonStore, SAMPLES_FILE, SEQUENCES_FILE, StoreError};

fn sample(lab: &str) -> Sample {
    Sample::new(LabNumber::new(lab).unwrap(), Relation::Child)
}

#[test]
fn test_samples_survive_reopen() {
    let dir = tempdir().unwrap();
    {
        let store = JsonStore::open(dir.path()).unwrap();
        assert_eq!(store.import_samples(vec![sample("25_001"), sample("25_002")]).unwrap(), 2);
    }
    assert!(dir.path().join(SAMPLES_FILE).exists());

    let store = JsonStore::open(dir.path()).unwrap();
    let labs: Vec<String> = store
        .samples()
        .unwrap()
        .into_iter()
        .map(|s| s.lab_number.to_string())
        .collect();
    assert_eq!(labs, vec!["25_001", "25_002"]);
}

#[test]
fn test_duplicate_import_changes_nothing() {
    let dir = tempdir().unwrap();
    let store = JsonStore::open(dir.path()).unwrap();
    store.import_samples(vec![sample("25_001")]).unwrap();

    let err = store
        .import_samples(vec![sample("25_003"), sample("25_001")])
        .unwrap_err();
    assert!(matches!(err, StoreError::DuplicateSample { ref lab_number } if lab_number == "25_001"));

    let reopened = JsonStore::open(dir.path()).unwrap();
    assert_eq!(reopened.samples().unwrap().len(), 1);
}

#[test]
fn test_save_samples_writes_audit_lines() {
    let dir = tempdir().unwrap();
    let store = JsonStore::open(dir.path()).unwrap();
    let original = sample("25_001");
    store.import_samples(vec![original.clone()]).unwrap();

    let moved = original.clone().with_status(WorkflowStatus::PcrReady);
    let entry = AuditEntry {
        sample_id: original.lab_number.clone(),
        from: WorkflowStatus::SampleCollected,
        to: WorkflowStatus::PcrReady,
        note: Some("received".to_string()),
        timestamp: Utc::now(),
        actor: "tech".to_string(),
    };
    store.save_samples(&[moved], &[entry]).unwrap();

    let audit_text = std::fs::read_to_string(dir.path().join(AUDIT_FILE)).unwrap();
    assert_eq!(audit_text.lines().count(), 1);

    let reopened = JsonStore::open(dir.path()).unwrap();
    let stored = reopened.find_sample(&original.lab_number).unwrap().unwrap();
    assert_eq!(stored.workflow_status, WorkflowStatus::PcrReady);
    assert_eq!(reopened.audit_log().unwrap()[0].note.as_deref(), Some("received"));
    assert!(
        reopened
            .find_eligible(&SampleFilter::batchable(BatchKind::Pcr))
            .unwrap()
            .iter()
            .any(|s| s.lab_number == original.lab_number)
    );
}

#[test]
fn test_batch_numbers_continue_after_reopen() {
    let dir = tempdir().unwrap();
    let first = {
        let store = JsonStore::open(dir.path()).unwrap();
        let number = store.next_batch_number(BatchKind::Pcr).unwrap();
        store
            .save_batch(&Batch {
                batch_number: number.clone(),
                kind: BatchKind::Pcr,
                operator: "tech".to_string(),
                created_date: Utc::now(),
                well_map: PlateMap::default(),
                source_batch: None,
            })
            .unwrap();
        number
    };

    let store = JsonStore::open(dir.path()).unwrap();
    assert!(store.find_batch(&first).unwrap().is_some());
    let second = store.next_batch_number(BatchKind::Pcr).unwrap();
    assert_ne!(first, second);
    assert!(second.as_str().ends_with("-002"));

    store.discard_batch(&first).unwrap();
    assert!(store.find_batch(&first).unwrap().is_none());
    assert!(JsonStore::open(dir.path()).unwrap().batches().unwrap().is_empty());
}

#[test]
fn test_corrupt_file_is_reported() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join(SAMPLES_FILE), "[{").unwrap();
    let err = JsonStore::open(dir.path()).unwrap_err();
    assert!(matches!(err, StoreError::InvalidFormat { .. }));
    assert!(err.suggestion().is_some());
}

#[test]
fn test_handles_on_one_directory_see_each_other() {
    let dir = tempdir().unwrap();
    let first = JsonStore::open(dir.path()).unwrap();
    let second = JsonStore::open(dir.path()).unwrap();

    first.import_samples(vec![sample("25_001")]).unwrap();
    assert!(second.find_sample(&LabNumber::new("25_001").unwrap()).unwrap().is_some());
    assert!(matches!(
        second.import_samples(vec![sample("25_001")]),
        Err(StoreError::DuplicateSample { .. })
    ));
}

#[test]
fn test_batch_numbers_are_unique_across_handles() {
    let dir = tempdir().unwrap();
    let first = JsonStore::open(dir.path()).unwrap();
    let second = JsonStore::open(dir.path()).unwrap();

    let a = first.next_batch_number(BatchKind::Pcr).unwrap();
    let b = second.next_batch_number(BatchKind::Pcr).unwrap();
    assert_ne!(a, b);
    assert!(dir.path().join(SEQUENCES_FILE).exists());

    // Issued numbers survive reopening even without a saved batch.
    let c = JsonStore::open(dir.path())
        .unwrap()
        .next_batch_number(BatchKind::Pcr)
        .unwrap();
    assert!(c.as_str().ends_with("-003"));
}

#[test]
fn test_stale_placement_is_refused() {
    let dir = tempdir().unwrap();
    let first = JsonStore::open(dir.path()).unwrap();
    let second = JsonStore::open(dir.path()).unwrap();
    let ready = sample("25_001").with_status(WorkflowStatus::PcrReady);
    first.import_samples(vec![ready.clone()]).unwrap();

    // Both handles read the sample before either commits.
    let seen_by_first = first.find_sample(&ready.lab_number).unwrap().unwrap();
    let seen_by_second = second.find_sample(&ready.lab_number).unwrap().unwrap();

    let place = |mut sample: Sample, number: &str| {
        let entry = AuditEntry {
            sample_id: sample.lab_number.clone(),
            from: sample.workflow_status,
            to: WorkflowStatus::PcrBatched,
            note: None,
            timestamp: Utc::now(),
            actor: "tech".to_string(),
        };
        sample.workflow_status = WorkflowStatus::PcrBatched;
        sample.assign_batch(BatchKind::Pcr, BatchNumber::new(number).unwrap());
        (sample, entry)
    };

    let (placed, entry) = place(seen_by_first, "PCR-20261018-001");
    first.save_samples(&[placed], &[entry]).unwrap();

    let (rival, entry) = place(seen_by_second, "PCR-20261018-002");
    let err = second.save_samples(&[rival], &[entry]).unwrap_err();
    assert!(matches!(err, RepositoryError::Backend { .. }));

    let stored = first.find_sample(&ready.lab_number).unwrap().unwrap();
    assert_eq!(stored.batch_id.as_ref().map(BatchNumber::as_str), Some("PCR-20261018-001"));
    assert_eq!(first.audit_log().unwrap().len(), 1);
}

#[test]
fn test_duplicate_batch_from_second_handle_is_refused() {
    let dir = tempdir().unwrap();
    let first = JsonStore::open(dir.path()).unwrap();
    let second = JsonStore::open(dir.path()).unwrap();
    let batch = Batch {
        batch_number: first.next_batch_number(BatchKind::Pcr).unwrap(),
        kind: BatchKind::Pcr,
        operator: "tech".to_string(),
        created_date: Utc::now(),
        well_map: PlateMap::default(),
        source_batch: None,
    };
    first.save_batch(&batch).unwrap();
    assert!(matches!(
        second.save_batch(&batch),
        Err(RepositoryError::Duplicate { entity: "batch", .. })
    ));
    assert_eq!(first.batches().unwrap().len(), 1);
}
