//! Locus-by-locus comparison and combined paternity index.

use std::collections::{BTreeMap, BTreeSet};

use lims_model::{Conclusion, LocusReading, MarkerResult, PaternityReport};

use crate::error::{PaternityError, Result};
use crate::roles::RoleAssignment;

/// Probability (percent) at or above which paternity is not excluded.
pub const NOT_EXCLUDED_THRESHOLD: f64 = 99.9;

/// Probability (percent) below which paternity is excluded.
pub const EXCLUDED_THRESHOLD: f64 = 0.1;

/// Per-locus paternity index.
pub trait LocusIndexStrategy {
    fn locus_index(
        &self,
        marker: &str,
        child: &BTreeSet<String>,
        parent: &BTreeSet<String>,
        shared: &BTreeSet<String>,
    ) -> f64;
}

/// Fixed two-valued index: a shared allele scores 2.0, none scores 0.01.
///
/// Not derived from allele frequencies.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderIndex;

impl PlaceholderIndex {
    pub const COMPATIBLE: f64 = 2.0;
    pub const INCOMPATIBLE: f64 = 0.01;
}

impl LocusIndexStrategy for PlaceholderIndex {
    fn locus_index(
        &self,
        _marker: &str,
        _child: &BTreeSet<String>,
        _parent: &BTreeSet<String>,
        shared: &BTreeSet<String>,
    ) -> f64 {
        if shared.is_empty() {
            Self::INCOMPATIBLE
        } else {
            Self::COMPATIBLE
        }
    }
}

/// Map a probability of relationship to a conclusion.
pub fn conclude(probability: f64) -> Conclusion {
    if probability >= NOT_EXCLUDED_THRESHOLD {
        Conclusion::NotExcluded
    } else if probability < EXCLUDED_THRESHOLD {
        Conclusion::Excluded
    } else {
        Conclusion::Inconclusive
    }
}

/// Compares a child against an alleged parent.
#[derive(Debug, Clone, Default)]
pub struct PaternityCalculator<S = PlaceholderIndex> {
    strategy: S,
}

impl PaternityCalculator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<S: LocusIndexStrategy> PaternityCalculator<S> {
    pub fn with_strategy(strategy: S) -> Self {
        Self { strategy }
    }

    /// Compare over the markers typed in both samples.
    ///
    /// Markers are visited in sorted order, so the product is reproducible.
    /// With no common marker the combined index is 1.0 (50 %).
    pub fn compare(&self, child: &[LocusReading], parent: &[LocusReading]) -> PaternityReport {
        let child_loci = allele_sets(child);
        let parent_loci = allele_sets(parent);

        let mut marker_results = Vec::new();
        let mut combined_pi = 1.0;
        for (marker, child_alleles) in &child_loci {
            let Some(parent_alleles) = parent_loci.get(marker) else {
                continue;
            };
            let shared: BTreeSet<String> = child_alleles
                .intersection(parent_alleles)
                .cloned()
                .collect();
            let paternity_index =
                self.strategy
                    .locus_index(marker, child_alleles, parent_alleles, &shared);
            combined_pi *= paternity_index;
            marker_results.push(MarkerResult {
                marker: marker.clone(),
                child_alleles: child_alleles.iter().cloned().collect(),
                parent_alleles: parent_alleles.iter().cloned().collect(),
                compatible: !shared.is_empty(),
                shared_alleles: shared.into_iter().collect(),
                paternity_index,
            });
        }

        let probability = combined_pi / (combined_pi + 1.0) * 100.0;
        let report = PaternityReport {
            child_sample_id: sample_id(child),
            alleged_parent_sample_id: sample_id(parent),
            marker_results,
            combined_pi,
            probability_of_relationship: probability,
            conclusion: conclude(probability),
        };
        tracing::info!(
            loci = report.compared_loci(),
            incompatible = report.incompatible_loci(),
            combined_pi,
            probability,
            conclusion = %report.conclusion,
            "paternity comparison"
        );
        report
    }

    /// Compare two samples out of grouped readings.
    pub fn compare_groups(
        &self,
        groups: &BTreeMap<String, Vec<LocusReading>>,
        roles: &RoleAssignment,
    ) -> Result<PaternityReport> {
        let lookup = |id: &str| {
            groups
                .get(id)
                .ok_or_else(|| PaternityError::UnknownSample(id.to_string()))
        };
        let child = lookup(&roles.child)?;
        let parent = lookup(&roles.alleged_parent)?;
        let mut report = self.compare(child, parent);
        report.child_sample_id.clone_from(&roles.child);
        report.alleged_parent_sample_id.clone_from(&roles.alleged_parent);
        Ok(report)
    }
}

/// Compare with the placeholder index.
pub fn compare(child: &[LocusReading], parent: &[LocusReading]) -> PaternityReport {
    PaternityCalculator::new().compare(child, parent)
}

/// Called alleles per marker; repeated rows for a marker are merged.
fn allele_sets(readings: &[LocusReading]) -> BTreeMap<String, BTreeSet<String>> {
    let mut loci: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for reading in readings {
        loci.entry(reading.marker.clone())
            .or_default()
            .extend(reading.alleles().map(str::to_string));
    }
    loci
}

fn sample_id(readings: &[LocusReading]) -> String {
    readings
        .first()
        .map(|reading| reading.sample_id.clone())
        .unwrap_or_default()
}
