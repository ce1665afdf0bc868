//! Sample selection and case grouping for plate building.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use lims_model::{
    Batch, BatchKind, BatchNumber, CaseNumber, LabNumber, Relation, RepositoryError, Sample,
    SampleFilter,
};

use crate::error::{BatchError, Result};
use crate::layout::{ControlPolicy, layout};

/// Orders samples inside a case group. Lower ranks come first.
pub trait RelationRanking {
    fn rank(&self, sample: &Sample) -> u8;
}

/// `child*`, then `alleged_father`, then `mother`, then everything else.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultRanking;

impl RelationRanking for DefaultRanking {
    fn rank(&self, sample: &Sample) -> u8 {
        match sample.relation {
            Relation::Child => 0,
            Relation::AllegedFather => 1,
            Relation::Mother => 2,
            Relation::Other(_) => 3,
        }
    }
}

/// Samples of one case, in relation order.
///
/// Samples without a case number form single-member groups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseGroup {
    pub case_number: Option<CaseNumber>,
    pub samples: Vec<Sample>,
}

impl CaseGroup {
    pub fn is_urgent(&self) -> bool {
        self.samples.iter().any(Sample::is_urgent)
    }

    pub fn contains(&self, lab_number: &LabNumber) -> bool {
        self.samples.iter().any(|s| &s.lab_number == lab_number)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Samples that may go on a batch of `kind`: batchable status and not
/// currently held by another batch.
pub fn select_eligible(samples: &[Sample], kind: BatchKind) -> Vec<Sample> {
    let filter = SampleFilter::batchable(kind);
    samples
        .iter()
        .filter(|sample| filter.matches(sample))
        .cloned()
        .collect()
}

/// Partition by case with the default relation ranking.
pub fn group_by_case(samples: Vec<Sample>) -> Vec<CaseGroup> {
    group_by_case_with(&DefaultRanking, samples)
}

/// Partition by case number.
///
/// Groups appear in order of their first member, with groups holding an
/// urgent sample moved ahead. Within a group samples are stably sorted by
/// `ranking`, so equal ranks keep their input order.
pub fn group_by_case_with<R: RelationRanking + ?Sized>(
    ranking: &R,
    samples: Vec<Sample>,
) -> Vec<CaseGroup> {
    let mut groups: Vec<CaseGroup> = Vec::new();
    let mut by_case: HashMap<CaseNumber, usize> = HashMap::new();
    for sample in samples {
        match sample.case_number.clone() {
            Some(case) => match by_case.get(&case) {
                Some(&index) => groups[index].samples.push(sample),
                None => {
                    by_case.insert(case.clone(), groups.len());
                    groups.push(CaseGroup {
                        case_number: Some(case),
                        samples: vec![sample],
                    });
                }
            },
            None => groups.push(CaseGroup {
                case_number: None,
                samples: vec![sample],
            }),
        }
    }
    for group in &mut groups {
        group.samples.sort_by_key(|sample| ranking.rank(sample));
    }
    groups.sort_by_key(|group| !group.is_urgent());
    groups
}

/// Case-unit selection over grouped samples.
///
/// Selecting or deselecting any member applies to its whole case.
#[derive(Debug, Clone)]
pub struct CaseSelection {
    groups: Vec<CaseGroup>,
    selected: Vec<bool>,
}

impl CaseSelection {
    /// Start with nothing selected.
    pub fn new(groups: Vec<CaseGroup>) -> Self {
        let selected = vec![false; groups.len()];
        Self { groups, selected }
    }

    /// Start with every group selected.
    pub fn all(groups: Vec<CaseGroup>) -> Self {
        let selected = vec![true; groups.len()];
        Self { groups, selected }
    }

    fn position(&self, lab_number: &LabNumber) -> Option<usize> {
        self.groups.iter().position(|g| g.contains(lab_number))
    }

    /// Returns false when the lab number is in no group.
    pub fn select(&mut self, lab_number: &LabNumber) -> bool {
        self.set(lab_number, true)
    }

    pub fn deselect(&mut self, lab_number: &LabNumber) -> bool {
        self.set(lab_number, false)
    }

    /// Flip the case holding `lab_number`; returns its new state.
    pub fn toggle(&mut self, lab_number: &LabNumber) -> Option<bool> {
        let index = self.position(lab_number)?;
        self.selected[index] = !self.selected[index];
        Some(self.selected[index])
    }

    pub fn is_selected(&self, lab_number: &LabNumber) -> bool {
        self.position(lab_number)
            .is_some_and(|index| self.selected[index])
    }

    fn set(&mut self, lab_number: &LabNumber, value: bool) -> bool {
        match self.position(lab_number) {
            Some(index) => {
                self.selected[index] = value;
                true
            }
            None => false,
        }
    }

    pub fn groups(&self) -> &[CaseGroup] {
        &self.groups
    }

    /// Selected groups in group order.
    pub fn selected_groups(&self) -> Vec<&CaseGroup> {
        self.groups
            .iter()
            .zip(&self.selected)
            .filter_map(|(group, &on)| on.then_some(group))
            .collect()
    }

    pub fn selected_count(&self) -> usize {
        self.selected_groups().iter().map(|g| g.len()).sum()
    }

    pub fn into_selected(self) -> Vec<CaseGroup> {
        self.groups
            .into_iter()
            .zip(self.selected)
            .filter_map(|(group, on)| on.then_some(group))
            .collect()
    }
}

/// Flatten groups, keeping group order and in-group order.
pub fn flatten(groups: &[CaseGroup]) -> Vec<Sample> {
    groups
        .iter()
        .flat_map(|group| group.samples.iter().cloned())
        .collect()
}

/// Lay out the grouped samples and stamp a new batch.
///
/// The batch number is requested only after the layout succeeds.
pub fn build_batch<F>(
    groups: &[CaseGroup],
    kind: BatchKind,
    operator: &str,
    policy: &ControlPolicy,
    created: DateTime<Utc>,
    next_number: F,
) -> Result<Batch>
where
    F: FnOnce(BatchKind) -> std::result::Result<BatchNumber, RepositoryError>,
{
    let ordered = flatten(groups);
    if ordered.is_empty() {
        return Err(BatchError::EmptySelection { kind });
    }
    let well_map = layout(&ordered, policy)?;
    let batch_number = next_number(kind)?;
    Ok(Batch {
        batch_number,
        kind,
        operator: operator.to_string(),
        created_date: created,
        well_map,
        source_batch: None,
    })
}

/// The PCR or rerun plate every sample last went through, if they share one.
pub fn common_source_batch(samples: &[Sample]) -> Option<BatchNumber> {
    let sources: HashSet<Option<&BatchNumber>> = samples
        .iter()
        .map(|sample| {
            sample
                .last_batch_of(&[BatchKind::Pcr, BatchKind::Rerun])
                .map(|entry| &entry.batch_number)
        })
        .collect();
    match sources.into_iter().collect::<Vec<_>>().as_slice() {
        [Some(number)] => Some((*number).clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lims_model::{Priority, WorkflowStatus};

    fn sample(lab: &str, case: Option<&str>, relation: Relation) -> Sample {
        let mut s = Sample::new(LabNumber::new(lab).unwrap(), relation);
        if let Some(case) = case {
            s = s.with_case(CaseNumber::new(case).unwrap());
        }
        s
    }

    fn labs(group: &CaseGroup) -> Vec<&str> {
        group.samples.iter().map(|s| s.lab_number.as_str()).collect()
    }

    #[test]
    fn groups_sorted_by_relation() {
        let groups = group_by_case(vec![
            sample("3", Some("K1"), Relation::Mother),
            sample("2", Some("K1"), Relation::AllegedFather),
            sample("9", None, Relation::Child),
            sample("1", Some("K1"), Relation::Child),
            sample("4", Some("K1"), Relation::Other("uncle".into())),
        ]);
        assert_eq!(groups.len(), 2);
        assert_eq!(labs(&groups[0]), ["1", "2", "3", "4"]);
        assert_eq!(labs(&groups[1]), ["9"]);
        assert!(groups[1].case_number.is_none());
    }

    #[test]
    fn urgent_groups_move_ahead_stably() {
        let groups = group_by_case(vec![
            sample("1", Some("A"), Relation::Child),
            sample("2", Some("B"), Relation::Child),
            sample("3", Some("C"), Relation::Child).with_priority(Priority::Urgent),
            sample("4", Some("D"), Relation::Child).with_priority(Priority::Urgent),
        ]);
        let order: Vec<&str> = groups.iter().map(|g| labs(g)[0]).collect();
        assert_eq!(order, ["3", "4", "1", "2"]);
    }

    #[test]
    fn duplicate_roles_keep_input_order() {
        let groups = group_by_case(vec![
            sample("c2", Some("K"), Relation::Child),
            sample("af", Some("K"), Relation::AllegedFather),
            sample("c1", Some("K"), Relation::Child),
        ]);
        assert_eq!(labs(&groups[0]), ["c2", "c1", "af"]);
    }

    #[test]
    fn eligible_skips_batched_and_wrong_status() {
        let mut batched = sample("1", None, Relation::Child).with_status(WorkflowStatus::PcrReady);
        batched.assign_batch(BatchKind::Pcr, BatchNumber::new("PCR-1").unwrap());
        let samples = vec![
            batched,
            sample("2", None, Relation::Child),
            sample("3", None, Relation::Child).with_status(WorkflowStatus::PcrCompleted),
        ];
        let pcr: Vec<String> = select_eligible(&samples, BatchKind::Pcr)
            .into_iter()
            .map(|s| s.lab_number.to_string())
            .collect();
        assert_eq!(pcr, ["2"]);
        assert_eq!(select_eligible(&samples, BatchKind::Electrophoresis).len(), 1);
    }

    #[test]
    fn selection_applies_to_whole_case() {
        let groups = group_by_case(vec![
            sample("1", Some("K1"), Relation::Child),
            sample("2", Some("K1"), Relation::AllegedFather),
            sample("3", Some("K2"), Relation::Child),
        ]);
        let mut selection = CaseSelection::new(groups);
        assert!(selection.select(&LabNumber::new("2").unwrap()));
        assert!(selection.is_selected(&LabNumber::new("1").unwrap()));
        assert_eq!(selection.selected_count(), 2);
        assert_eq!(selection.toggle(&LabNumber::new("1").unwrap()), Some(false));
        assert_eq!(selection.selected_count(), 0);
        assert!(!selection.deselect(&LabNumber::new("nope").unwrap()));
    }

    #[test]
    fn empty_groups_are_empty_selection() {
        let err = build_batch(
            &[],
            BatchKind::Pcr,
            "tech",
            &ControlPolicy::standard(),
            Utc::now(),
            |_| Ok(BatchNumber::new("PCR-1").unwrap()),
        )
        .unwrap_err();
        assert!(matches!(err, BatchError::EmptySelection { kind: BatchKind::Pcr }));
    }

    #[test]
    fn source_batch_requires_agreement() {
        let mut a = sample("1", None, Relation::Child);
        a.assign_batch(BatchKind::Pcr, BatchNumber::new("PCR-1").unwrap());
        let mut b = sample("2", None, Relation::Child);
        b.assign_batch(BatchKind::Pcr, BatchNumber::new("PCR-1").unwrap());
        assert_eq!(
            common_source_batch(&[a.clone(), b.clone()]).map(|n| n.to_string()),
            Some("PCR-1".to_string())
        );
        b.assign_batch(BatchKind::Rerun, BatchNumber::new("RR-1").unwrap());
        assert_eq!(common_source_batch(&[a, b]), None);
    }
}
