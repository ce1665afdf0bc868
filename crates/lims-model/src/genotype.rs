//! Per-locus allele calls produced by fragment analysis.

use serde::{Deserialize, Serialize};

/// One allele call row for a sample at a single STR marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocusReading {
    pub sample_id: String,
    pub marker: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dye: Option<String>,
    pub allele1: Option<String>,
    pub allele2: Option<String>,
    pub height1: Option<f64>,
    pub height2: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area1: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area2: Option<f64>,
}

impl LocusReading {
    /// Called alleles, skipping absent ones.
    pub fn alleles(&self) -> impl Iterator<Item = &str> {
        [self.allele1.as_deref(), self.allele2.as_deref()]
            .into_iter()
            .flatten()
    }

    /// True when both alleles are called and identical.
    pub fn is_homozygous(&self) -> bool {
        matches!((&self.allele1, &self.allele2), (Some(a), Some(b)) if a == b)
    }
}
