//! Paternity comparison results.

use serde::{Deserialize, Serialize};

use crate::enums::Conclusion;

/// Comparison of child and alleged parent at one marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerResult {
    pub marker: String,
    pub child_alleles: Vec<String>,
    pub parent_alleles: Vec<String>,
    pub shared_alleles: Vec<String>,
    pub compatible: bool,
    pub paternity_index: f64,
}

/// Derived report; recomputed rather than edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaternityReport {
    pub child_sample_id: String,
    pub alleged_parent_sample_id: String,
    pub marker_results: Vec<MarkerResult>,
    #[serde(rename = "combinedPI")]
    pub combined_pi: f64,
    pub probability_of_relationship: f64,
    pub conclusion: Conclusion,
}

impl PaternityReport {
    pub fn compared_loci(&self) -> usize {
        self.marker_results.len()
    }

    pub fn incompatible_loci(&self) -> usize {
        self.marker_results.iter().filter(|r| !r.compatible).count()
    }
}
