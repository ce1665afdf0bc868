//! Transition table for the sample lifecycle.
//!
//! Each status lists its direct successors. On top of the table, every
//! status at or after `pcr_completed` may drop into the rerun loop
//! (`rerun_required` or `rerun_batched`). Self-transitions are never allowed.

use std::collections::{BTreeMap, VecDeque};

use lims_model::WorkflowStatus;

/// Direct pipeline successors of `status`.
pub fn successors(status: WorkflowStatus) -> &'static [WorkflowStatus] {
    use WorkflowStatus as S;
    match status {
        S::SampleCollected => &[S::PcrReady],
        S::PcrReady => &[S::PcrBatched],
        S::PcrBatched => &[S::PcrCompleted],
        S::PcrCompleted => &[S::ElectroReady],
        S::ElectroReady => &[S::ElectroBatched],
        S::ElectroBatched => &[S::ElectroCompleted],
        S::ElectroCompleted => &[S::AnalysisReady],
        S::AnalysisReady => &[S::AnalysisCompleted],
        S::AnalysisCompleted => &[S::ReportReady],
        S::ReportReady => &[S::ReportSent],
        S::ReportSent => &[],
        S::RerunRequired => &[S::RerunBatched],
        S::RerunBatched => &[S::PcrCompleted],
    }
}

/// Every status `status` may move to, in table order.
pub fn allowed_targets(status: WorkflowStatus) -> Vec<WorkflowStatus> {
    let mut targets = successors(status).to_vec();
    if status.is_post_pcr() {
        for rerun in [WorkflowStatus::RerunRequired, WorkflowStatus::RerunBatched] {
            if rerun != status && !targets.contains(&rerun) {
                targets.push(rerun);
            }
        }
    }
    targets
}

pub fn can_transition(from: WorkflowStatus, to: WorkflowStatus) -> bool {
    allowed_targets(from).contains(&to)
}

/// Shortest chain of allowed moves from `from` to `to`, excluding `from`.
///
/// Returns an empty route when the statuses are equal and `None` when `to`
/// is unreachable.
pub fn route(from: WorkflowStatus, to: WorkflowStatus) -> Option<Vec<WorkflowStatus>> {
    if from == to {
        return Some(Vec::new());
    }
    let mut previous: BTreeMap<WorkflowStatus, WorkflowStatus> = BTreeMap::new();
    let mut queue = VecDeque::from([from]);
    while let Some(current) = queue.pop_front() {
        for next in allowed_targets(current) {
            if next == from || previous.contains_key(&next) {
                continue;
            }
            previous.insert(next, current);
            if next == to {
                let mut path = vec![to];
                let mut cursor = to;
                while let Some(&step) = previous.get(&cursor) {
                    if step == from {
                        break;
                    }
                    path.push(step);
                    cursor = step;
                }
                path.reverse();
                return Some(path);
            }
            queue.push_back(next);
        }
    }
    None
}
