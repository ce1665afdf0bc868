//! Engine behaviour against the in-memory store.

use std::sync::Arc;

use proptest::prelude::*;

use lims_model::{LabNumber, Relation, Sample, SampleRepository, WorkflowStatus};
use lims_store::MemoryStore;
use lims_workflow::{
    BulkTransitionRequest, BulkTransitionResponse, CancelToken, WorkflowEngine, WorkflowError,
    allowed_targets,
};

fn lab(id: &str) -> LabNumber {
    LabNumber::new(id).unwrap()
}

fn engine_with(samples: Vec<Sample>) -> WorkflowEngine<Arc<MemoryStore>> {
    let store = Arc::new(MemoryStore::new());
    store.insert_samples(samples).unwrap();
    WorkflowEngine::new(store)
}

fn sample(id: &str, status: WorkflowStatus) -> Sample {
    Sample::new(lab(id), Relation::Child).with_status(status)
}

fn request(ids: &[&str], status: &str) -> BulkTransitionRequest {
    BulkTransitionRequest {
        sample_ids: ids.iter().map(|id| (*id).to_string()).collect(),
        workflow_status: status.to_string(),
        notes: None,
    }
}

#[test]
fn single_transition_persists_and_audits() {
    let engine = engine_with(vec![sample("25_001", WorkflowStatus::SampleCollected)]);
    let updated = engine
        .transition(&lab("25_001"), WorkflowStatus::PcrReady, Some("checked in"), "tech")
        .unwrap();
    assert_eq!(updated.workflow_status, WorkflowStatus::PcrReady);

    let store = engine.repository();
    let stored = store.find_sample(&lab("25_001")).unwrap().unwrap();
    assert_eq!(stored.workflow_status, WorkflowStatus::PcrReady);
    let audit = store.audit_log().unwrap();
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0].from, WorkflowStatus::SampleCollected);
    assert_eq!(audit[0].note.as_deref(), Some("checked in"));
}

#[test]
fn rejected_transition_writes_nothing() {
    let engine = engine_with(vec![sample("25_001", WorkflowStatus::SampleCollected)]);
    let err = engine
        .transition(&lab("25_001"), WorkflowStatus::ReportSent, None, "tech")
        .unwrap_err();
    assert!(err.is_validation());
    assert!(engine.repository().audit_log().unwrap().is_empty());
}

#[test]
fn missing_sample_is_reported() {
    let engine = engine_with(Vec::new());
    let err = engine
        .transition(&lab("nope"), WorkflowStatus::PcrReady, None, "tech")
        .unwrap_err();
    assert!(matches!(err, WorkflowError::SampleNotFound(_)));
}

#[test]
fn bulk_update_is_all_or_nothing() {
    let engine = engine_with(vec![
        sample("s1", WorkflowStatus::SampleCollected),
        sample("s2", WorkflowStatus::ReportSent),
    ]);
    let response = engine
        .handle_bulk_request(&request(&["s1", "s2"], "pcr_ready"), "tech", &CancelToken::new())
        .unwrap();

    match response {
        BulkTransitionResponse::Rejected { error } => {
            assert_eq!(error.sample_id, "s2");
            assert_eq!(error.workflow_status, "pcr_ready");
        }
        BulkTransitionResponse::Updated { .. } => panic!("bulk update should be rejected"),
    }

    let store = engine.repository();
    assert_eq!(
        store.find_sample(&lab("s1")).unwrap().unwrap().workflow_status,
        WorkflowStatus::SampleCollected
    );
    assert_eq!(
        store.find_sample(&lab("s2")).unwrap().unwrap().workflow_status,
        WorkflowStatus::ReportSent
    );
    assert!(store.audit_log().unwrap().is_empty());
}

#[test]
fn bulk_update_commits_every_sample_once() {
    let engine = engine_with(vec![
        sample("s1", WorkflowStatus::SampleCollected),
        sample("s2", WorkflowStatus::SampleCollected),
    ]);
    let mut req = request(&["s1", "s2", "s1"], "pcr_ready");
    req.notes = Some("intake complete".to_string());
    let updated = engine
        .bulk_transition(&req, "tech", &CancelToken::new())
        .unwrap();
    assert_eq!(updated.len(), 2);

    let audit = engine.repository().audit_log().unwrap();
    assert_eq!(audit.len(), 2);
    assert!(audit.iter().all(|e| e.note.as_deref() == Some("intake complete")));
}

#[test]
fn bulk_update_rejects_unknown_status_name() {
    let engine = engine_with(vec![sample("s1", WorkflowStatus::SampleCollected)]);
    let err = engine
        .bulk_transition(&request(&["s1"], "pcr_redy"), "tech", &CancelToken::new())
        .unwrap_err();
    assert!(matches!(err, WorkflowError::InvalidTransition { ref to, .. } if to == "pcr_redy"));
}

#[test]
fn empty_bulk_request_is_invalid() {
    let engine = engine_with(Vec::new());
    let err = engine
        .bulk_transition(&request(&[], "pcr_ready"), "tech", &CancelToken::new())
        .unwrap_err();
    assert!(matches!(err, WorkflowError::InvalidRequest(_)));
}

#[test]
fn cancelled_bulk_update_persists_nothing() {
    let engine = engine_with(vec![sample("s1", WorkflowStatus::SampleCollected)]);
    let cancel = CancelToken::new();
    cancel.cancel();
    let err = engine
        .bulk_transition(&request(&["s1"], "pcr_ready"), "tech", &cancel)
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Cancelled));
    assert_eq!(
        engine
            .repository()
            .find_sample(&lab("s1"))
            .unwrap()
            .unwrap()
            .workflow_status,
        WorkflowStatus::SampleCollected
    );
}

#[test]
fn concurrent_updates_to_one_sample_serialize() {
    let engine = Arc::new(engine_with(vec![sample("s1", WorkflowStatus::SampleCollected)]));
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let engine = Arc::clone(&engine);
            std::thread::spawn(move || {
                engine
                    .transition(&lab("s1"), WorkflowStatus::PcrReady, None, "tech")
                    .is_ok()
            })
        })
        .collect();
    let successes = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|ok| *ok)
        .count();
    assert_eq!(successes, 1);
    assert_eq!(engine.repository().audit_log().unwrap().len(), 1);
}

proptest! {
    #[test]
    fn transition_succeeds_iff_target_allowed(
        from in prop::sample::select(WorkflowStatus::ALL.to_vec()),
        to in prop::sample::select(WorkflowStatus::ALL.to_vec()),
    ) {
        let engine = engine_with(vec![sample("p1", from)]);
        let result = engine.transition(&lab("p1"), to, None, "prop");
        prop_assert_eq!(result.is_ok(), allowed_targets(from).contains(&to));
        let audit = engine.repository().audit_log().unwrap();
        prop_assert_eq!(audit.len(), usize::from(result.is_ok()));
    }
}
